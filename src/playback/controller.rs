//! The playback state machine.
//!
//! The controller exclusively owns the queue and the engine handle. Every
//! navigation operation funnels through `select_and_play`, which is the
//! single resource-replacement path: the old handle is always released
//! before a new one starts. Acquisition is asynchronous: `select_and_play`
//! hands back a generation-tagged `LoadRequest`, and the transition commits
//! in `complete_load` once the prepared source arrives. Any transition
//! requested in between bumps the generation, so a stale load is discarded
//! on arrival instead of clobbering newer state.
//!
//! After every committed transition the controller publishes a snapshot to
//! the shared handle and fans it out to the presenters, in order. This is
//! the only place presenters are invoked, which is what keeps the external
//! surfaces from drifting apart.

use tracing::{debug, warn};

use crate::engine::{Engine, EngineHandle};
use crate::library::Track;
use crate::present::Presenter;

use super::queue::Queue;
use super::types::{LoadRequest, PlaybackState, Snapshot, SnapshotHandle, TransportError};

struct PendingLoad {
    generation: u64,
    index: usize,
}

pub struct Controller<E: Engine> {
    engine: E,
    queue: Queue,
    handle: Option<E::Handle>,
    state: PlaybackState,
    generation: u64,
    pending: Option<PendingLoad>,
    presenters: Vec<Box<dyn Presenter>>,
    snapshot: SnapshotHandle,
    shut_down: bool,
}

impl<E: Engine> Controller<E> {
    pub fn new(engine: E, snapshot: SnapshotHandle) -> Self {
        Self {
            engine,
            queue: Queue::new(),
            handle: None,
            state: PlaybackState::Idle,
            generation: 0,
            pending: None,
            presenters: Vec::new(),
            snapshot,
            shut_down: false,
        }
    }

    pub fn add_presenter(&mut self, presenter: Box<dyn Presenter>) {
        self.presenters.push(presenter);
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.queue.current()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.queue.cursor()
    }

    pub fn has_pending_load(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Replace the queue. Cancels any in-flight load, releases the engine
    /// handle and resets to idle: track identity is not stable across
    /// reloads, so playback never survives a replacement.
    pub fn load_queue(&mut self, tracks: Vec<Track>) {
        if self.shut_down {
            return;
        }
        self.cancel_pending();
        self.release_handle();
        self.queue.replace(tracks);
        self.state = PlaybackState::Idle;
        self.fan_out();
    }

    /// Begin the transition to the track at `index`. The prior committed
    /// state stays in place until `complete_load` lands the prepared source.
    pub fn select_and_play(
        &mut self,
        index: usize,
    ) -> Result<Option<LoadRequest>, TransportError> {
        if self.shut_down {
            return Ok(None);
        }
        let Some(track) = self.queue.get(index) else {
            return Err(TransportError::OutOfRange {
                index,
                len: self.queue.len(),
            });
        };
        let track = track.clone();

        self.generation = self.generation.wrapping_add(1);
        if self.pending.is_some() {
            debug!(index, "superseding in-flight load");
        }
        self.pending = Some(PendingLoad {
            generation: self.generation,
            index,
        });
        Ok(Some(LoadRequest {
            generation: self.generation,
            track,
        }))
    }

    /// Commit point for a prepared source. Returns `Ok(true)` when a
    /// transition committed, `Ok(false)` when the load was superseded and
    /// dropped. On an engine error the prior committed state is retained.
    pub fn complete_load(
        &mut self,
        generation: u64,
        outcome: Result<E::Prepared, crate::engine::EngineError>,
    ) -> Result<bool, TransportError> {
        if self.shut_down {
            return Ok(false);
        }
        let Some(pending) = self.pending.take_if(|p| p.generation == generation) else {
            // Dropping a superseded source is its release.
            debug!(generation, "discarding superseded load");
            return Ok(false);
        };

        let prepared = match outcome {
            Ok(prepared) => prepared,
            Err(err) => {
                warn!(index = pending.index, error = %err, "load failed; keeping prior state");
                // If the load was replacing a handle that already ran out
                // (auto-advance), nothing is audibly playing any more: fall
                // back to idle rather than re-polling the finished handle.
                if self.handle.as_ref().is_some_and(|h| h.is_finished()) {
                    self.release_handle();
                    self.state = PlaybackState::Idle;
                    self.fan_out();
                }
                return Err(err.into());
            }
        };

        let Some(track) = self.queue.get(pending.index).cloned() else {
            // Queue changes bump the generation, so this should be
            // unreachable; refuse to commit rather than guess.
            warn!(index = pending.index, "load landed for a vanished index");
            return Ok(false);
        };

        self.release_handle();
        let mut handle = self.engine.attach(&track, prepared);
        handle.start();
        debug!(track = handle.bound_track(), title = %track.display, "engine handle started");
        self.handle = Some(handle);
        self.queue.set_cursor(pending.index);
        self.state = PlaybackState::Playing;
        self.fan_out();
        Ok(true)
    }

    /// Resume a paused handle in place, or start the cursor track when idle.
    pub fn play(&mut self) -> Result<Option<LoadRequest>, TransportError> {
        if self.shut_down {
            return Ok(None);
        }
        match self.state {
            PlaybackState::Paused => {
                if let Some(handle) = self.handle.as_mut() {
                    handle.start();
                }
                self.state = PlaybackState::Playing;
                self.fan_out();
                Ok(None)
            }
            PlaybackState::Idle => match self.cursor() {
                Some(index) => self.select_and_play(index),
                None => Ok(None),
            },
            PlaybackState::Playing => Ok(None),
        }
    }

    /// Pause the running handle in place. No-op in any other state.
    pub fn pause(&mut self) {
        if self.shut_down || self.state != PlaybackState::Playing {
            return;
        }
        if let Some(handle) = self.handle.as_mut() {
            handle.pause();
        }
        self.state = PlaybackState::Paused;
        self.fan_out();
    }

    pub fn toggle(&mut self) -> Result<Option<LoadRequest>, TransportError> {
        if self.state == PlaybackState::Playing {
            self.pause();
            Ok(None)
        } else {
            self.play()
        }
    }

    /// Skip forward with wrap-around. No-op on an empty queue.
    pub fn next(&mut self) -> Result<Option<LoadRequest>, TransportError> {
        match self.queue.next_index() {
            Some(index) => self.select_and_play(index),
            None => Ok(None),
        }
    }

    /// Skip backward with wrap-around. No-op on an empty queue.
    pub fn previous(&mut self) -> Result<Option<LoadRequest>, TransportError> {
        match self.queue.prev_index() {
            Some(index) => self.select_and_play(index),
            None => Ok(None),
        }
    }

    /// Completion check, driven by the control loop. A handle that played to
    /// its end is handled exactly like an external `next()`.
    pub fn poll_finished(&mut self) -> Result<Option<LoadRequest>, TransportError> {
        if self.shut_down || self.pending.is_some() || self.state != PlaybackState::Playing {
            return Ok(None);
        }
        let finished = self.handle.as_ref().is_some_and(|h| h.is_finished());
        if !finished {
            return Ok(None);
        }
        debug!("track finished; advancing");
        self.next()
    }

    /// Refresh the engine-reported position in the shared snapshot. Not a
    /// fan-out; presenters are untouched.
    pub fn refresh_position(&self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        if let (Some(handle), Ok(mut snapshot)) = (self.handle.as_ref(), self.snapshot.lock()) {
            snapshot.position = handle.position();
        }
    }

    /// Terminal: cancel any in-flight load, release the engine and mark the
    /// presentation surfaces inactive. Every later operation is a no-op.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.cancel_pending();
        self.release_handle();
        self.state = PlaybackState::Idle;
        self.fan_out();
        for presenter in &self.presenters {
            presenter.deactivate();
        }
        self.shut_down = true;
    }

    fn cancel_pending(&mut self) {
        // Bumping the generation orphans any in-flight load.
        self.generation = self.generation.wrapping_add(1);
        self.pending = None;
    }

    fn release_handle(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            debug!(track = handle.bound_track(), "releasing engine handle");
            handle.release();
        }
    }

    /// The single fan-out point: publish the committed snapshot, then invoke
    /// every presenter with it, in order.
    fn fan_out(&mut self) {
        let snapshot = Snapshot {
            track: self.current_track().cloned(),
            state: self.state,
            position: self
                .handle
                .as_ref()
                .map(|h| h.position())
                .unwrap_or_default(),
        };
        if let Ok(mut shared) = self.snapshot.lock() {
            *shared = snapshot.clone();
        }
        for presenter in &self.presenters {
            presenter.present(&snapshot);
        }
    }
}
