use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use tracing::{debug, warn};

use crate::engine::{Engine, EngineError};

use super::controller::Controller;
use super::types::{LoadRequest, TransportCmd};

/// Everything that arrives on the control channel: transport commands from
/// the outside, and loader results coming back from their threads.
pub(super) enum PlayerMsg<E: Engine> {
    Cmd(TransportCmd),
    Loaded {
        generation: u64,
        outcome: Result<E::Prepared, EngineError>,
    },
}

/// Poll interval for completion detection and position updates.
const TICK: Duration = Duration::from_millis(200);

/// The serialized control path. Runs until `Shutdown` arrives; on the
/// timeout branch it refreshes the published position and advances past
/// tracks that have run out. The loop keeps its own sender for loader
/// completions, so the channel cannot disconnect while it runs.
pub(super) fn run_control_loop<E: Engine + 'static>(
    mut controller: Controller<E>,
    rx: Receiver<PlayerMsg<E>>,
    tx: Sender<PlayerMsg<E>>,
) {
    let mut deferred: VecDeque<TransportCmd> = VecDeque::new();

    loop {
        match rx.recv_timeout(TICK) {
            Ok(PlayerMsg::Cmd(TransportCmd::Shutdown)) => {
                controller.shutdown();
                break;
            }
            Ok(PlayerMsg::Cmd(cmd)) => {
                if controller.has_pending_load() && defers_while_loading(&cmd) {
                    // The in-flight transition commits first; these apply
                    // afterwards, in the order they arrived.
                    deferred.push_back(cmd);
                    continue;
                }
                dispatch(&mut controller, &tx, cmd);
                replay_deferred(&mut controller, &tx, &mut deferred);
            }
            Ok(PlayerMsg::Loaded { generation, outcome }) => {
                match controller.complete_load(generation, outcome) {
                    Ok(true) => debug!("transition committed"),
                    Ok(false) => {}
                    Err(err) => warn!(error = %err, "transition abandoned"),
                }
                replay_deferred(&mut controller, &tx, &mut deferred);
            }
            Err(RecvTimeoutError::Timeout) => {
                controller.refresh_position();
                match controller.poll_finished() {
                    Ok(Some(request)) => spawn_loader(&tx, request),
                    Ok(None) => {}
                    Err(err) => warn!(error = %err, "auto-advance rejected"),
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                controller.shutdown();
                break;
            }
        }
    }
}

/// Commands that act on the *current* handle make no sense while a new one
/// is being prepared; they wait for the load to resolve.
fn defers_while_loading(cmd: &TransportCmd) -> bool {
    matches!(
        cmd,
        TransportCmd::Play | TransportCmd::Pause | TransportCmd::TogglePause
    )
}

fn dispatch<E: Engine + 'static>(
    controller: &mut Controller<E>,
    tx: &Sender<PlayerMsg<E>>,
    cmd: TransportCmd,
) {
    let result = match cmd {
        TransportCmd::LoadQueue(tracks) => {
            controller.load_queue(tracks);
            Ok(None)
        }
        TransportCmd::SelectAndPlay(index) => controller.select_and_play(index),
        TransportCmd::Play => controller.play(),
        TransportCmd::Pause => {
            controller.pause();
            Ok(None)
        }
        TransportCmd::TogglePause => controller.toggle(),
        TransportCmd::Next => controller.next(),
        TransportCmd::Previous => controller.previous(),
        // Handled by the loop before dispatch.
        TransportCmd::Shutdown => Ok(None),
    };
    match result {
        Ok(Some(request)) => spawn_loader(tx, request),
        Ok(None) => {}
        Err(err) => warn!(state = ?controller.state(), error = %err, "transport command rejected"),
    }
}

fn replay_deferred<E: Engine + 'static>(
    controller: &mut Controller<E>,
    tx: &Sender<PlayerMsg<E>>,
    deferred: &mut VecDeque<TransportCmd>,
) {
    while !controller.has_pending_load() && !controller.is_shut_down() {
        let Some(cmd) = deferred.pop_front() else {
            break;
        };
        dispatch(controller, tx, cmd);
    }
}

/// Decode happens off the control thread; the result comes back through the
/// same channel, tagged with the generation that requested it.
fn spawn_loader<E: Engine + 'static>(tx: &Sender<PlayerMsg<E>>, request: LoadRequest) {
    let tx = tx.clone();
    std::thread::spawn(move || {
        let outcome = E::prepare(&request.track);
        let _ = tx.send(PlayerMsg::Loaded {
            generation: request.generation,
            outcome,
        });
    });
}
