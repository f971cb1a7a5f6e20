//! Playback engine: the resource-lifecycle seam between the controller and
//! the native audio output.
//!
//! `Engine`/`EngineHandle` define the contract (acquire on selection,
//! guaranteed release before reassignment or shutdown); `RodioEngine` is the
//! production implementation on top of rodio.

mod rodio;
mod types;

pub use rodio::{RodioEngine, RodioHandle};
pub use types::{Engine, EngineError, EngineHandle};
