//! Fixed-capacity store of the most recent entries.

use std::collections::VecDeque;

use crate::entry::LogEntry;

/// Insertion-ordered buffer holding at most `capacity` entries.
///
/// Pushing into a full buffer evicts the oldest entry. A capacity of zero is
/// allowed and retains nothing.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl RingBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            // Preallocation is capped; large capacities grow on demand.
            entries: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    /// Appends an entry, returning the evicted entry if the buffer was full.
    pub fn push(&mut self, entry: LogEntry) -> Option<LogEntry> {
        if self.capacity == 0 {
            return Some(entry);
        }
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    /// Returns up to `limit` of the newest entries, oldest first.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of buffered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries retained.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
