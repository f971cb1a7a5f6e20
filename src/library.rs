//! Library source: the track model and the directory scanner.
//!
//! The scanner walks a directory for playable files, reads tag metadata on a
//! best-effort basis and produces an ordered `Track` list. Everything past
//! this point treats tracks as immutable values.

mod model;
mod scan;

pub use model::*;
pub use scan::scan;
