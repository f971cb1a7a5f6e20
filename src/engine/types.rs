//! Engine contract: how the controller acquires and drives the native
//! playback resource.
//!
//! Acquisition is split in two: `prepare` is the blocking, I/O-bound half
//! (run on a loader thread so a slow open never stalls the control path) and
//! `attach` is the cheap half that binds the prepared source to a fresh
//! handle. A handle is bound to exactly one track and is never repointed;
//! track changes always release the old handle and attach a new one.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::library::Track;

/// Errors from acquiring the native playback resource.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no audio output device available: {0}")]
    Output(#[from] rodio::StreamError),
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: rodio::decoder::DecoderError,
    },
}

/// Factory for engine handles.
pub trait Engine {
    /// A decoded-but-unattached source. Dropping one releases it.
    type Prepared: Send + 'static;
    type Handle: EngineHandle;

    /// Open and decode the track's source. Blocking; may be superseded, in
    /// which case the result is dropped unused.
    fn prepare(track: &Track) -> Result<Self::Prepared, EngineError>;

    /// Bind a prepared source to a fresh handle, initially paused.
    fn attach(&mut self, track: &Track, prepared: Self::Prepared) -> Self::Handle;
}

/// Exclusive wrapper around one bound playback resource.
pub trait EngineHandle {
    /// Start playback, or resume it after `pause`.
    fn start(&mut self);
    fn pause(&mut self);
    /// Track id this handle was attached for.
    fn bound_track(&self) -> u64;
    /// Engine-reported position, monotonic while playing.
    fn position(&self) -> Duration;
    /// True once the source has played to its end.
    fn is_finished(&self) -> bool;
    /// Release the underlying resource. Idempotent; safe on a handle that
    /// was never started.
    fn release(&mut self);
}
