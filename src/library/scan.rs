use std::path::{Path, PathBuf};
use std::time::Duration;

use lofty::file::{AudioFile, TaggedFileExt};
use lofty::tag::ItemKey;
use walkdir::WalkDir;

use crate::config::LibrarySettings;

use super::model::{Track, make_display};

fn is_audio_file(path: &Path, settings: &LibrarySettings) -> bool {
    let exts: Vec<String> = settings
        .extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect();

    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            exts.iter().any(|e| e == &ext)
        })
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

const COVER_NAMES: [&str; 3] = ["cover", "folder", "front"];
const COVER_EXTS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Look for a conventional cover-art file next to the track.
fn find_artwork(path: &Path) -> Option<PathBuf> {
    let dir = path.parent()?;
    for name in COVER_NAMES {
        for ext in COVER_EXTS {
            let candidate = dir.join(format!("{name}.{ext}"));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

/// Scan `dir` for playable files and return them as an ordered track list.
///
/// Tag metadata is best-effort: a missing or unreadable tag falls back to the
/// file stem for the title and empty artist/album strings. The result is
/// sorted by title and ids are assigned after sorting, so they are unique and
/// stable for this load only. An unreadable directory yields an empty list.
pub fn scan(dir: &Path, settings: &LibrarySettings) -> Vec<Track> {
    let mut tracks: Vec<Track> = Vec::new();

    let mut walker = WalkDir::new(dir).follow_links(settings.follow_links);

    // Non-recursive = only the root directory.
    let depth_cap = if settings.recursive {
        settings.max_depth
    } else {
        Some(1)
    };
    if let Some(d) = depth_cap {
        walker = walker.max_depth(d);
    }

    for entry in walker
        .into_iter()
        .filter_entry(|e| settings.include_hidden || e.depth() == 0 || !is_hidden(e.path()))
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if path.is_file()
            && (settings.include_hidden || !is_hidden(path))
            && is_audio_file(path, settings)
        {
            let default_title = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Unknown")
                .to_string();

            let mut title = default_title;
            let mut artist = String::new();
            let mut album = String::new();
            let mut duration: Option<Duration> = None;

            if let Ok(tagged) = lofty::read_from_path(path) {
                duration = Some(tagged.properties().duration());

                if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
                    if let Some(v) = tag.get_string(&ItemKey::TrackTitle) {
                        if !v.trim().is_empty() {
                            title = v.to_string();
                        }
                    }
                    if let Some(v) = tag.get_string(&ItemKey::TrackArtist) {
                        artist = v.trim().to_string();
                    }
                    if let Some(v) = tag.get_string(&ItemKey::AlbumTitle) {
                        album = v.trim().to_string();
                    }
                }
            }

            let display = make_display(&title, &artist);

            tracks.push(Track {
                id: 0,
                path: path.to_path_buf(),
                title,
                artist,
                album,
                duration,
                artwork: find_artwork(path),
                display,
            });
        }
    }

    tracks.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
    for (i, track) in tracks.iter_mut().enumerate() {
        track.id = i as u64;
    }
    tracks
}
