use std::sync::mpsc::Receiver;

use tracing::debug;

use crate::playback::Player;
use crate::present::ControlCmd;

/// Blocks on surface commands until `Quit`. Each command maps onto one
/// transport operation; `Stop` pauses in place so playback stays resumable.
pub fn run(player: &Player, control_rx: &Receiver<ControlCmd>) {
    while let Ok(cmd) = control_rx.recv() {
        debug!(?cmd, "surface command");
        match cmd {
            ControlCmd::Play => player.play(),
            ControlCmd::Pause => player.pause(),
            ControlCmd::PlayPause => player.toggle_pause(),
            ControlCmd::Stop => player.pause(),
            ControlCmd::Next => player.next(),
            ControlCmd::Prev => player.previous(),
            ControlCmd::Quit => break,
        }
    }
}
