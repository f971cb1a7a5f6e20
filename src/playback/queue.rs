//! Ordered track sequence with a cursor marking the current track.
//!
//! Pure data structure, no I/O. Play order is caller-supplied and preserved;
//! only the controller mutates the queue.

use crate::library::Track;

/// `cursor == None` means no current track.
#[derive(Default)]
pub struct Queue {
    items: Vec<Track>,
    cursor: Option<usize>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole queue. Track identity is not guaranteed stable
    /// across reloads, so the cursor always resets.
    pub fn replace(&mut self, tracks: Vec<Track>) {
        self.items = tracks;
        self.cursor = None;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn index_valid(&self, index: usize) -> bool {
        index < self.items.len()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.items.get(index)
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&Track> {
        self.cursor.and_then(|c| self.items.get(c))
    }

    /// Move the cursor. The caller must have validated `index`.
    pub fn set_cursor(&mut self, index: usize) {
        debug_assert!(self.index_valid(index));
        self.cursor = Some(index);
    }

    /// Index `next()` plays: one past the cursor, wrapping to the first.
    /// With no cursor yet, the first track.
    pub fn next_index(&self) -> Option<usize> {
        if self.items.is_empty() {
            return None;
        }
        Some(match self.cursor {
            Some(c) => (c + 1) % self.items.len(),
            None => 0,
        })
    }

    /// Index `previous()` plays: one before the cursor, wrapping to the last.
    /// With no cursor yet, the last track.
    pub fn prev_index(&self) -> Option<usize> {
        if self.items.is_empty() {
            return None;
        }
        let len = self.items.len();
        Some(match self.cursor {
            Some(c) => (c + len - 1) % len,
            None => len - 1,
        })
    }
}
