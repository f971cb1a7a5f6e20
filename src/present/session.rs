use std::collections::HashMap;
use std::sync::{Arc, Mutex, mpsc::Sender};

use async_io::{Timer, block_on};
use tracing::warn;
use zbus::{Connection, interface};
use zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};

use crate::library::Track;
use crate::playback::{PlaybackState, Snapshot, SnapshotHandle};

use super::{ControlCmd, Presenter};

const BUS_NAME: &str = "org.mpris.MediaPlayer2.dacapo";
const OBJECT_PATH: &str = "/org/mpris/MediaPlayer2";

#[derive(Debug, Default)]
pub(super) struct SharedState {
    pub(super) playback: PlaybackState,
    pub(super) title: Option<String>,
    pub(super) artist: Vec<String>,
    pub(super) album: Option<String>,
    pub(super) url: Option<String>,
    pub(super) length_micros: Option<i64>,
    pub(super) track_id: Option<OwnedObjectPath>,
}

impl SharedState {
    fn set_track(&mut self, track: Option<&Track>) {
        match track {
            Some(track) => {
                self.title = Some(track.title.clone());
                self.artist = if track.artist.is_empty() {
                    Vec::new()
                } else {
                    vec![track.artist.clone()]
                };
                self.album = if track.album.is_empty() {
                    None
                } else {
                    Some(track.album.clone())
                };
                self.url = Some(format!("file://{}", track.path.display()));
                self.length_micros = track.duration.map(|d| d.as_micros() as i64);
                self.track_id = ObjectPath::try_from(format!(
                    "/org/mpris/MediaPlayer2/track/{}",
                    track.id
                ))
                .ok()
                .map(Into::into);
            }
            None => {
                self.title = None;
                self.artist = Vec::new();
                self.album = None;
                self.url = None;
                self.length_micros = None;
                self.track_id = None;
            }
        }
    }
}

/// Mirrors playback state onto the session bus as an
/// `org.mpris.MediaPlayer2` service.
pub struct SessionPresenter {
    pub(super) state: Arc<Mutex<SharedState>>,
}

impl Presenter for SessionPresenter {
    fn present(&self, snapshot: &Snapshot) {
        if let Ok(mut s) = self.state.lock() {
            s.playback = snapshot.state;
            s.set_track(snapshot.track.as_ref());
        }
    }

    fn deactivate(&self) {
        if let Ok(mut s) = self.state.lock() {
            *s = SharedState::default();
        }
    }
}

struct RootIface {
    tx: Sender<ControlCmd>,
}

#[interface(name = "org.mpris.MediaPlayer2")]
impl RootIface {
    fn raise(&self) {
        // Headless; nothing to raise.
    }

    fn quit(&self) {
        let _ = self.tx.send(ControlCmd::Quit);
    }

    #[zbus(property)]
    fn can_quit(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_raise(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn has_track_list(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn identity(&self) -> &str {
        "dacapo"
    }

    #[zbus(property)]
    fn supported_uri_schemes(&self) -> Vec<String> {
        vec![]
    }

    #[zbus(property)]
    fn supported_mime_types(&self) -> Vec<String> {
        vec![]
    }
}

pub(super) struct PlayerIface {
    pub(super) tx: Sender<ControlCmd>,
    pub(super) state: Arc<Mutex<SharedState>>,
    pub(super) snapshot: SnapshotHandle,
}

#[interface(name = "org.mpris.MediaPlayer2.Player")]
impl PlayerIface {
    fn next(&self) {
        let _ = self.tx.send(ControlCmd::Next);
    }

    fn previous(&self) {
        let _ = self.tx.send(ControlCmd::Prev);
    }

    fn play(&self) {
        let _ = self.tx.send(ControlCmd::Play);
    }

    fn pause(&self) {
        let _ = self.tx.send(ControlCmd::Pause);
    }

    fn play_pause(&self) {
        let _ = self.tx.send(ControlCmd::PlayPause);
    }

    fn stop(&self) {
        let _ = self.tx.send(ControlCmd::Stop);
    }

    #[zbus(property)]
    pub(super) fn playback_status(&self) -> &str {
        let Ok(s) = self.state.lock() else {
            return "Stopped";
        };
        match s.playback {
            PlaybackState::Idle => "Stopped",
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
        }
    }

    // Read live from the published snapshot rather than the fan-out
    // mirror; the controller refreshes it on every tick while playing.
    #[zbus(property)]
    pub(super) fn position(&self) -> i64 {
        self.snapshot
            .lock()
            .map(|s| s.position.as_micros().min(i64::MAX as u128) as i64)
            .unwrap_or(0)
    }

    #[zbus(property)]
    fn can_control(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_play(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_pause(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_seek(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn can_go_next(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_previous(&self) -> bool {
        true
    }

    #[zbus(property)]
    pub(super) fn metadata(&self) -> HashMap<String, OwnedValue> {
        let mut map = HashMap::new();
        let Ok(s) = self.state.lock() else {
            return map;
        };
        if let Some(track_id) = &s.track_id {
            insert(
                &mut map,
                "mpris:trackid",
                Value::from(track_id.clone().into_inner()),
            );
        }
        if let Some(title) = &s.title {
            insert(&mut map, "xesam:title", Value::from(title.clone()));
        }
        if !s.artist.is_empty() {
            insert(&mut map, "xesam:artist", Value::from(s.artist.clone()));
        }
        if let Some(album) = &s.album {
            insert(&mut map, "xesam:album", Value::from(album.clone()));
        }
        if let Some(url) = &s.url {
            insert(&mut map, "xesam:url", Value::from(url.clone()));
        }
        if let Some(length) = s.length_micros {
            insert(&mut map, "mpris:length", Value::from(length));
        }
        map
    }
}

fn insert(map: &mut HashMap<String, OwnedValue>, key: &str, value: Value<'_>) {
    if let Ok(value) = OwnedValue::try_from(value) {
        map.insert(key.to_string(), value);
    }
}

/// Registers the MPRIS service on the session bus from a dedicated
/// thread and returns the presenter that feeds it. Bus failures are
/// logged and leave the presenter inert.
pub fn spawn_session(tx: Sender<ControlCmd>, snapshot: SnapshotHandle) -> SessionPresenter {
    let state = Arc::new(Mutex::new(SharedState::default()));

    let state_for_thread = state.clone();
    std::thread::spawn(move || {
        block_on(async move {
            let connection = match Connection::session().await {
                Ok(c) => c,
                Err(e) => {
                    warn!(error = %e, "media session: cannot connect to session bus");
                    return;
                }
            };

            if let Err(e) = connection.request_name(BUS_NAME).await {
                warn!(error = %e, "media session: cannot acquire bus name");
                return;
            }

            let object_server = connection.object_server();

            if let Err(e) = object_server
                .at(OBJECT_PATH, RootIface { tx: tx.clone() })
                .await
            {
                warn!(error = %e, "media session: cannot register root interface");
                return;
            }

            if let Err(e) = object_server
                .at(
                    OBJECT_PATH,
                    PlayerIface {
                        tx,
                        state: state_for_thread,
                        snapshot,
                    },
                )
                .await
            {
                warn!(error = %e, "media session: cannot register player interface");
                return;
            }

            // Keep the service alive.
            loop {
                Timer::after(std::time::Duration::from_secs(3600)).await;
            }
        });
    });

    SessionPresenter { state }
}
