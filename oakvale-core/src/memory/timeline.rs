//! Shared world-event timeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::character::CharacterId;

/// Kind of world event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Move,
    Attack,
    Dialog,
    Trade,
    ItemUse,
    Wait,
    Defeat,
    Revival,
    Death,
    Arrival,
}

/// Immutable record of something that happened in the world
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldEvent {
    pub turn: u64,
    pub kind: EventKind,
    pub actor: CharacterId,
    pub target: Option<CharacterId>,
    pub summary: String,
    /// Wall-clock time the event was recorded; log use only
    #[serde(skip, default = "Utc::now")]
    pub recorded_at: DateTime<Utc>,
}

// Wall-clock stamps differ between otherwise identical runs.
impl PartialEq for WorldEvent {
    fn eq(&self, other: &Self) -> bool {
        self.turn == other.turn
            && self.kind == other.kind
            && self.actor == other.actor
            && self.target == other.target
            && self.summary == other.summary
    }
}

impl WorldEvent {
    pub fn new(turn: u64, kind: EventKind, actor: CharacterId, summary: impl Into<String>) -> Self {
        Self {
            turn,
            kind,
            actor,
            target: None,
            summary: summary.into(),
            recorded_at: Utc::now(),
        }
    }

    pub fn with_target(mut self, target: CharacterId) -> Self {
        self.target = Some(target);
        self
    }

    /// Whether `id` is the actor or the target
    pub fn involves(&self, id: &CharacterId) -> bool {
        &self.actor == id || self.target.as_ref() == Some(id)
    }
}

/// Bounded, append-only event timeline with monotonic turn stamps
#[derive(Debug, Clone)]
pub struct WorldTimeline {
    capacity: usize,
    events: VecDeque<Arc<WorldEvent>>,
}

impl WorldTimeline {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity),
        }
    }

    /// Append an event.
    ///
    /// Turn stamps never go backwards: an event stamped earlier than the
    /// newest one is restamped with the newest turn.
    pub fn record(&mut self, mut event: WorldEvent) -> Arc<WorldEvent> {
        if let Some(last) = self.events.back() {
            event.turn = event.turn.max(last.turn);
        }
        while self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        let event = Arc::new(event);
        self.events.push_back(Arc::clone(&event));
        event
    }

    /// Last `n` events, oldest first
    pub fn recent(&self, n: usize) -> Vec<Arc<WorldEvent>> {
        let skip = self.events.len().saturating_sub(n);
        self.events.iter().skip(skip).cloned().collect()
    }

    /// Last `n` events in which `id` took part, oldest first
    pub fn involving(&self, id: &CharacterId, n: usize) -> Vec<Arc<WorldEvent>> {
        let mut found: Vec<_> = self
            .events
            .iter()
            .rev()
            .filter(|e| e.involves(id))
            .take(n)
            .cloned()
            .collect();
        found.reverse();
        found
    }

    /// Events stamped at or after `turn`
    pub fn since(&self, turn: u64) -> Vec<Arc<WorldEvent>> {
        self.events
            .iter()
            .filter(|e| e.turn >= turn)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
