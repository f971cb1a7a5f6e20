//! Playback-related small types shared across the controller, the control
//! loop and the presentation surfaces.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;

use crate::engine::EngineError;
use crate::library::Track;

/// Logical playback state. `Playing`/`Paused` imply a current track;
/// `Idle` implies no engine handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
}

/// Normalized transport operation. Every command source (in-process callers,
/// the MPRIS surface, notification actions, the startup queue) is mapped
/// onto this before it reaches the controller; the controller never learns
/// the origin.
#[derive(Debug)]
pub enum TransportCmd {
    /// Replace the queue with the given tracks. Always resets the cursor.
    LoadQueue(Vec<Track>),
    /// Start playback of the track at the given queue index.
    SelectAndPlay(usize),
    /// Resume a paused track, or start the cursor track when idle.
    Play,
    /// Pause the running track in place.
    Pause,
    /// Pause when playing, otherwise play.
    TogglePause,
    /// Skip forward, wrapping at the end of the queue.
    Next,
    /// Skip backward, wrapping at the start of the queue.
    Previous,
    /// Release the engine, deactivate the surfaces and stop the control
    /// thread. Terminal.
    Shutdown,
}

/// Errors surfaced by transport operations. All recoverable: the controller
/// keeps its prior committed state.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("track index {index} out of range (queue holds {len})")]
    OutOfRange { index: usize, len: usize },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// State snapshot pushed to the presenters after every committed transition
/// and shared with in-process readers. Presenters only ever see these
/// values, never the live queue or engine handle.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub track: Option<Track>,
    pub state: PlaybackState,
    pub position: Duration,
}

impl Snapshot {
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }
}

pub type SnapshotHandle = Arc<Mutex<Snapshot>>;

/// A pending resource acquisition. Handed to a loader thread; the prepared
/// source comes back through the control channel tagged with the same
/// generation, and is discarded if a later transition superseded it.
#[derive(Debug)]
pub struct LoadRequest {
    pub generation: u64,
    pub track: Track,
}
