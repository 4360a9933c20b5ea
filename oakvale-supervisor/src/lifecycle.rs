//! Activation policy: which NPCs deserve a running worker right now

use oakvale_core::character::{CharacterId, LifeStatus};
use oakvale_core::config::SchedulerConfig;
use oakvale_core::engine::Roster;
use serde::{Deserialize, Serialize};

/// What a reconciliation pass changed
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Workers spawned (first time or after a crash)
    pub started: Vec<CharacterId>,
    /// Suspended workers woken up
    pub resumed: Vec<CharacterId>,
    /// Workers paused because their NPC left the radius
    pub suspended: Vec<CharacterId>,
    /// Workers shut down because their NPC is dead
    pub terminated: Vec<CharacterId>,
}

impl ReconciliationReport {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty()
            && self.resumed.is_empty()
            && self.suspended.is_empty()
            && self.terminated.is_empty()
    }
}

/// Distance-based activation with a hard cap
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationPolicy {
    pub radius: f64,
    pub max_active: usize,
}

impl ActivationPolicy {
    pub fn new(radius: f64, max_active: usize) -> Self {
        Self { radius, max_active }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.activation_radius, config.max_active_workers)
    }

    /// NPCs that should be active, nearest first (ties by id), capped.
    ///
    /// Nobody is active without a player on the map.
    pub fn desired(&self, roster: &Roster) -> Vec<CharacterId> {
        let Some(player) = roster.player else {
            return Vec::new();
        };

        let mut candidates: Vec<(f64, &CharacterId)> = roster
            .npcs
            .iter()
            .filter(|npc| npc.status == LifeStatus::Alive)
            .map(|npc| (npc.position.distance(&player), &npc.id))
            .filter(|(distance, _)| *distance <= self.radius)
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));

        candidates
            .into_iter()
            .take(self.max_active)
            .map(|(_, id)| id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oakvale_core::engine::RosterEntry;
    use oakvale_core::world::Position;

    fn entry(id: &str, x: i32, y: i32, status: LifeStatus) -> RosterEntry {
        RosterEntry {
            id: id.into(),
            position: Position::new(x, y),
            status,
        }
    }

    #[test]
    fn test_desired_ranks_by_distance_then_id() {
        let roster = Roster {
            player: Some(Position::new(0, 0)),
            npcs: vec![
                entry("c", 3, 0, LifeStatus::Alive),
                entry("b", 0, 3, LifeStatus::Alive),
                entry("a", 5, 0, LifeStatus::Alive),
                entry("near_but_down", 1, 0, LifeStatus::Defeated),
                entry("far", 20, 0, LifeStatus::Alive),
            ],
        };

        let policy = ActivationPolicy::new(10.0, 8);
        let ids: Vec<String> = policy.desired(&roster).iter().map(|id| id.to_string()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);

        let capped = ActivationPolicy::new(10.0, 2);
        assert_eq!(capped.desired(&roster).len(), 2);
    }

    #[test]
    fn test_no_player_no_workers() {
        let roster = Roster {
            player: None,
            npcs: vec![entry("a", 0, 0, LifeStatus::Alive)],
        };
        assert!(ActivationPolicy::new(10.0, 8).desired(&roster).is_empty());
    }
}
