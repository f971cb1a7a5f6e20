use crate::config;
use crate::playback::Player;

/// Apply configured playback defaults once the queue is loaded. With
/// autoplay on, the first track starts immediately.
pub fn apply_playback_defaults(player: &Player, settings: &config::Settings, track_count: usize) {
    if settings.playback.autoplay && track_count > 0 {
        player.select_and_play(0);
    }
}
