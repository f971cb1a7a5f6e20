use std::env;
use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::library::scan;
use crate::playback::{Player, Snapshot, SnapshotHandle};
use crate::present::{ControlCmd, Presenter, spawn_notifier, spawn_session};

mod event_loop;
mod settings;
mod startup;

/// Process wiring: settings, library scan, presenters, the player and the
/// command loop that feeds it. Blocks until `Quit` arrives from one of the
/// surfaces.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let settings = settings::load_settings();

    let dir = env::args().nth(1).unwrap_or_else(|| {
        std::env::current_dir()
            .ok()
            .and_then(|p| p.to_str().map(|s| s.to_string()))
            .unwrap_or_else(|| "Music".to_string())
    });

    let tracks = scan(Path::new(&dir), &settings.library);
    info!(dir = %dir, count = tracks.len(), "library scanned");

    let (control_tx, control_rx) = mpsc::channel::<ControlCmd>();
    let snapshot: SnapshotHandle = Arc::new(Mutex::new(Snapshot::default()));

    let mut presenters: Vec<Box<dyn Presenter>> = Vec::new();
    if settings.session.enabled {
        presenters.push(Box::new(spawn_session(
            control_tx.clone(),
            Arc::clone(&snapshot),
        )));
    }
    if settings.notification.enabled {
        presenters.push(Box::new(spawn_notifier(control_tx.clone())));
    }

    let player = Player::new(presenters, snapshot);
    let track_count = tracks.len();
    player.load_queue(tracks);

    startup::apply_playback_defaults(&player, &settings, track_count);

    event_loop::run(&player, &control_rx);

    info!(
        playing = player.is_playing(),
        track = ?player.current_track().map(|t| t.display),
        "shutting down"
    );
    player.shutdown();
    Ok(())
}
