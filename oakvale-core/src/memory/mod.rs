//! Bounded history stores
//!
//! Each character owns a [`MemoryLog`]; the world owns one shared
//! [`WorldTimeline`]. Both evict their oldest entry once full and are only
//! appended to by the engine.

mod timeline;

pub use timeline::{EventKind, WorldEvent, WorldTimeline};

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One remembered event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub turn: u64,
    pub summary: String,
    /// 1 (trivial) to 3 (unforgettable)
    pub importance: u8,
}

impl MemoryEntry {
    pub fn new(turn: u64, summary: impl Into<String>, importance: u8) -> Self {
        Self {
            turn,
            summary: summary.into(),
            importance: importance.clamp(1, 3),
        }
    }
}

/// Per-character memory, oldest evicted first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryLog {
    capacity: usize,
    entries: VecDeque<MemoryEntry>,
}

impl MemoryLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, entry: MemoryEntry) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Last `n` entries, oldest first
    pub fn recent(&self, n: usize) -> Vec<MemoryEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Entries at or above an importance level, oldest first
    pub fn important(&self, min_importance: u8) -> Vec<&MemoryEntry> {
        self.entries
            .iter()
            .filter(|e| e.importance >= min_importance)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
