use std::collections::HashMap;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};

use tracing::warn;
use zvariant::Value;

use crate::playback::Snapshot;

use super::{ControlCmd, Presenter};

/// What the notifier thread needs to redraw the status notification.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum NotifyUpdate {
    Show {
        summary: String,
        body: String,
        icon: String,
        playing: bool,
    },
    Close,
}

impl NotifyUpdate {
    pub(super) fn from_snapshot(snapshot: &Snapshot) -> Self {
        match &snapshot.track {
            Some(track) => NotifyUpdate::Show {
                summary: track.title.clone(),
                body: match (track.artist.is_empty(), track.album.is_empty()) {
                    (false, false) => format!("{} \u{2014} {}", track.artist, track.album),
                    (false, true) => track.artist.clone(),
                    (true, false) => track.album.clone(),
                    (true, true) => String::new(),
                },
                icon: track
                    .artwork
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "audio-x-generic".to_string()),
                playing: snapshot.is_playing(),
            },
            None => NotifyUpdate::Close,
        }
    }
}

#[zbus::proxy(
    interface = "org.freedesktop.Notifications",
    default_service = "org.freedesktop.Notifications",
    default_path = "/org/freedesktop/Notifications",
    gen_async = false,
    blocking_name = "NotificationsProxyBlocking"
)]
trait Notifications {
    #[allow(clippy::too_many_arguments)]
    fn notify(
        &self,
        app_name: &str,
        replaces_id: u32,
        app_icon: &str,
        summary: &str,
        body: &str,
        actions: &[&str],
        hints: HashMap<&str, &Value<'_>>,
        expire_timeout: i32,
    ) -> zbus::Result<u32>;

    fn close_notification(&self, id: u32) -> zbus::Result<()>;

    #[zbus(signal)]
    fn action_invoked(&self, id: u32, action_key: String) -> zbus::Result<()>;
}

/// Mirrors playback state into a freedesktop status notification with
/// previous / play-pause / next actions.
pub struct NotifyPresenter {
    updates: Sender<NotifyUpdate>,
}

impl Presenter for NotifyPresenter {
    fn present(&self, snapshot: &Snapshot) {
        let _ = self.updates.send(NotifyUpdate::from_snapshot(snapshot));
    }

    fn deactivate(&self) {
        let _ = self.updates.send(NotifyUpdate::Close);
    }
}

fn action_command(key: &str) -> Option<ControlCmd> {
    match key {
        "previous" => Some(ControlCmd::Prev),
        "play-pause" => Some(ControlCmd::PlayPause),
        "next" => Some(ControlCmd::Next),
        _ => None,
    }
}

/// Spawns the notifier thread (redraws the notification on every update)
/// and the listener thread (turns invoked actions into [`ControlCmd`]s).
/// A missing notification service is logged and leaves the presenter inert.
pub fn spawn_notifier(cmd_tx: Sender<ControlCmd>) -> NotifyPresenter {
    let (update_tx, update_rx) = mpsc::channel::<NotifyUpdate>();
    let shown_id = Arc::new(Mutex::new(0u32));

    let notifier_id = Arc::clone(&shown_id);
    std::thread::spawn(move || {
        let connection = match zbus::blocking::Connection::session() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "notification: cannot connect to session bus");
                return;
            }
        };
        let proxy = match NotificationsProxyBlocking::new(&connection) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "notification: cannot create proxy");
                return;
            }
        };

        while let Ok(update) = update_rx.recv() {
            let current_id = notifier_id.lock().map(|id| *id).unwrap_or(0);
            match update {
                NotifyUpdate::Show {
                    summary,
                    body,
                    icon,
                    playing,
                } => {
                    let toggle_label = if playing { "Pause" } else { "Play" };
                    let actions = [
                        "previous",
                        "Previous",
                        "play-pause",
                        toggle_label,
                        "next",
                        "Next",
                    ];
                    let resident = Value::from(playing);
                    let urgency = Value::from(0u8);
                    let mut hints: HashMap<&str, &Value<'_>> = HashMap::new();
                    hints.insert("resident", &resident);
                    hints.insert("urgency", &urgency);
                    match proxy.notify(
                        "dacapo",
                        current_id,
                        &icon,
                        &summary,
                        &body,
                        &actions,
                        hints,
                        0,
                    ) {
                        Ok(id) => {
                            if let Ok(mut shown) = notifier_id.lock() {
                                *shown = id;
                            }
                        }
                        Err(e) => warn!(error = %e, "notification: cannot post"),
                    }
                }
                NotifyUpdate::Close => {
                    if current_id != 0 {
                        if let Err(e) = proxy.close_notification(current_id) {
                            warn!(error = %e, "notification: cannot close");
                        }
                        if let Ok(mut shown) = notifier_id.lock() {
                            *shown = 0;
                        }
                    }
                }
            }
        }
    });

    std::thread::spawn(move || {
        let connection = match zbus::blocking::Connection::session() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "notification: cannot connect for actions");
                return;
            }
        };
        let proxy = match NotificationsProxyBlocking::new(&connection) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "notification: cannot create action proxy");
                return;
            }
        };
        let signals = match proxy.receive_action_invoked() {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "notification: cannot subscribe to actions");
                return;
            }
        };
        for signal in signals {
            let Ok(args) = signal.args() else {
                continue;
            };
            // The signal is broadcast; only react to our own notification.
            let ours = shown_id
                .lock()
                .map(|shown| *shown != 0 && *shown == *args.id())
                .unwrap_or(false);
            if !ours {
                continue;
            }
            if let Some(cmd) = action_command(args.action_key()) {
                if cmd_tx.send(cmd).is_err() {
                    break;
                }
            }
        }
    });

    NotifyPresenter { updates: update_tx }
}
