use std::path::PathBuf;
use std::time::Duration;

/// Immutable description of one playable item.
///
/// `id` is stable and unique within one queue load; it is not preserved
/// across rescans. Empty `artist`/`album` strings mean the tag was missing.
#[derive(Clone, Debug)]
pub struct Track {
    pub id: u64,
    pub path: PathBuf,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration: Option<Duration>,
    pub artwork: Option<PathBuf>,
    pub display: String,
}

/// Build the "Artist - Title" label used for notifications and logs,
/// falling back to the bare title when the artist tag is missing.
pub fn make_display(title: &str, artist: &str) -> String {
    let artist = artist.trim();
    if artist.is_empty() {
        title.to_string()
    } else {
        format!("{artist} - {title}")
    }
}
