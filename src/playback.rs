//! The transport state machine and the serialized control path that drives
//! it. One track plays at a time; every state change goes through the
//! control thread, which owns the engine, the queue and the presenters.

mod controller;
mod queue;
mod service;
mod thread;
mod types;

pub use controller::Controller;
pub use queue::Queue;
pub use service::Player;
pub use types::{
    LoadRequest, PlaybackState, Snapshot, SnapshotHandle, TransportCmd, TransportError,
};

#[cfg(test)]
mod tests;
