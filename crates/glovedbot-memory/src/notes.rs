//! Rolling notes log produced by the summarizer.

use std::collections::VecDeque;

/// Default number of notes kept before the oldest is dropped.
pub const DEFAULT_NOTES_CAPACITY: usize = 32;

/// Ordered notes history with a fixed capacity.
///
/// Lives for the lifetime of the process; nothing is persisted.
#[derive(Debug, Clone)]
pub struct NotesHistory {
    capacity: usize,
    entries: VecDeque<String>,
}

impl Default for NotesHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_NOTES_CAPACITY)
    }
}

impl NotesHistory {
    /// Create an empty history keeping at most `capacity` notes.
    ///
    /// A capacity below 2 is raised to 2 so the context note stays reachable.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a note, evicting the oldest entry when full.
    pub fn push(&mut self, note: impl Into<String>) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(note.into());
    }

    /// Most recent note.
    pub fn latest(&self) -> Option<&str> {
        self.entries.back().map(String::as_str)
    }

    /// Second most recent note, used as conversational context.
    ///
    /// Returns `None` while fewer than two notes exist.
    pub fn context_note(&self) -> Option<&str> {
        let len = self.entries.len();
        if len < 2 {
            return None;
        }
        self.entries.get(len - 2).map(String::as_str)
    }

    /// Number of notes currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no notes were recorded yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of retained notes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate notes from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}
