use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::error;

use crate::engine::RodioEngine;
use crate::library::Track;
use crate::present::Presenter;

use super::controller::Controller;
use super::thread::{run_control_loop, PlayerMsg};
use super::types::{SnapshotHandle, TransportCmd};

/// In-process handle to the playback controller. Commands are funneled onto
/// the single control thread; reads come from the published snapshot.
pub struct Player {
    tx: Sender<PlayerMsg<RodioEngine>>,
    snapshot: SnapshotHandle,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl Player {
    /// Spawns the control thread publishing into `snapshot` (shared with
    /// any pull-side readers, like the session's position property). The
    /// output stream is opened inside the thread (the stream does not move
    /// between threads); if no audio device is available the thread logs
    /// the failure and exits, and every command quietly becomes a no-op.
    pub fn new(presenters: Vec<Box<dyn Presenter>>, snapshot: SnapshotHandle) -> Self {
        let (tx, rx) = mpsc::channel::<PlayerMsg<RodioEngine>>();

        let loop_tx = tx.clone();
        let loop_snapshot = Arc::clone(&snapshot);
        let join = std::thread::spawn(move || {
            let engine = match RodioEngine::open() {
                Ok(engine) => engine,
                Err(err) => {
                    error!(error = %err, "cannot open audio output; playback disabled");
                    for presenter in &presenters {
                        presenter.deactivate();
                    }
                    return;
                }
            };
            let mut controller = Controller::new(engine, loop_snapshot);
            for presenter in presenters {
                controller.add_presenter(presenter);
            }
            run_control_loop(controller, rx, loop_tx);
        });

        Self {
            tx,
            snapshot,
            join: Mutex::new(Some(join)),
        }
    }

    /// Queues a transport command. A disconnected control thread swallows
    /// the command; the caller has nothing useful to do about it.
    pub fn send(&self, cmd: TransportCmd) {
        let _ = self.tx.send(PlayerMsg::Cmd(cmd));
    }

    pub fn load_queue(&self, tracks: Vec<Track>) {
        self.send(TransportCmd::LoadQueue(tracks));
    }

    pub fn select_and_play(&self, index: usize) {
        self.send(TransportCmd::SelectAndPlay(index));
    }

    pub fn play(&self) {
        self.send(TransportCmd::Play);
    }

    pub fn pause(&self) {
        self.send(TransportCmd::Pause);
    }

    pub fn toggle_pause(&self) {
        self.send(TransportCmd::TogglePause);
    }

    pub fn next(&self) {
        self.send(TransportCmd::Next);
    }

    pub fn previous(&self) {
        self.send(TransportCmd::Previous);
    }

    pub fn current_track(&self) -> Option<Track> {
        self.snapshot.lock().ok().and_then(|s| s.track.clone())
    }

    pub fn is_playing(&self) -> bool {
        self.snapshot.lock().map(|s| s.is_playing()).unwrap_or(false)
    }

    /// Stops playback, releases the engine handle and joins the control
    /// thread. Safe to call more than once.
    pub fn shutdown(&self) {
        self.send(TransportCmd::Shutdown);
        if let Ok(mut join) = self.join.lock() {
            if let Some(handle) = join.take() {
                let _ = handle.join();
            }
        }
    }
}
