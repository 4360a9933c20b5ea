//! Perception snapshots built by the engine for each NPC
//!
//! A snapshot is a bounded, self-contained copy of what one character can
//! see and remember at the end of a turn. It crosses task and process
//! boundaries, so it owns all of its data and is serde-serializable.

use serde::{Deserialize, Serialize};

use crate::character::{CharacterClass, CharacterId, CharacterRace, CharacterSheet, LifeStatus};
use crate::config::PerceptionConfig;
use crate::error::Result;
use crate::memory::{MemoryEntry, WorldEvent};
use crate::world::{Direction, Position, TimeOfDay, World};

/// Another character in sight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibleEntity {
    pub id: CharacterId,
    pub name: String,
    pub class: CharacterClass,
    pub race: CharacterRace,
    pub status: LifeStatus,
    pub position: Position,
    pub distance: f64,
    pub direction: Option<Direction>,
    pub hp: u32,
    pub max_hp: u32,
}

/// An item on the ground in sight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibleItem {
    pub name: String,
    pub position: Position,
    pub distance: f64,
    pub direction: Option<Direction>,
}

/// How the perceiving character feels about someone in sight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipNote {
    pub id: CharacterId,
    pub name: String,
    pub score: i32,
    pub description: String,
}

/// Something said to a character
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub turn: u64,
    pub from: CharacterId,
    pub speaker: String,
    pub text: String,
}

/// Bounded view of the world for one character
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceptionSnapshot {
    pub turn: u64,
    pub time: String,
    pub time_of_day: TimeOfDay,
    pub location: String,
    pub sheet: CharacterSheet,
    pub player_position: Option<Position>,
    pub visible_entities: Vec<VisibleEntity>,
    pub terrain: Vec<String>,
    pub visible_items: Vec<VisibleItem>,
    pub recent_events: Vec<WorldEvent>,
    pub memories: Vec<MemoryEntry>,
    pub relationships: Vec<RelationshipNote>,
    pub addressed: Vec<Utterance>,
}

impl PerceptionSnapshot {
    pub fn character_id(&self) -> &CharacterId {
        &self.sheet.id
    }
}

/// Builds snapshots from the authoritative world
#[derive(Debug, Clone)]
pub struct PerceptionBuilder {
    config: PerceptionConfig,
}

impl PerceptionBuilder {
    pub fn new(config: PerceptionConfig) -> Self {
        Self { config }
    }

    /// Snapshot of what `id` perceives right now.
    ///
    /// `addressed` carries utterances aimed at this character since its
    /// previous snapshot.
    pub fn build(
        &self,
        world: &World,
        id: &CharacterId,
        addressed: Vec<Utterance>,
    ) -> Result<PerceptionSnapshot> {
        let me = world.require(id)?;
        let origin = me.position;
        let range = f64::from(self.config.visibility_range);

        let mut visible_entities: Vec<VisibleEntity> = world
            .characters()
            .filter(|c| c.id != *id && c.is_alive())
            .filter_map(|c| {
                let distance = origin.distance(&c.position);
                (distance <= range).then(|| VisibleEntity {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    class: c.class,
                    race: c.race,
                    status: c.status(),
                    position: c.position,
                    distance,
                    direction: origin.direction_to(&c.position),
                    hp: c.hp(),
                    max_hp: c.max_hp(),
                })
            })
            .collect();
        visible_entities.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.id.cmp(&b.id))
        });
        visible_entities.truncate(self.config.max_visible_entities);

        let visible_items: Vec<VisibleItem> = world
            .ground_items()
            .filter_map(|(pos, item)| {
                let distance = origin.distance(pos);
                (distance <= range).then(|| VisibleItem {
                    name: item.name.clone(),
                    position: *pos,
                    distance,
                    direction: origin.direction_to(pos),
                })
            })
            .collect();

        let relationships = visible_entities
            .iter()
            .map(|e| {
                let score = me.relationship(&e.id);
                RelationshipNote {
                    id: e.id.clone(),
                    name: e.name.clone(),
                    score,
                    description: crate::character::describe_affinity(score).to_string(),
                }
            })
            .collect();

        let recent_events = world
            .timeline
            .recent(self.config.recent_events)
            .into_iter()
            .map(|e| (*e).clone())
            .collect();

        Ok(PerceptionSnapshot {
            turn: world.turn(),
            time: world.formatted_time(),
            time_of_day: world.time_of_day(),
            location: world.location_name(&origin),
            sheet: me.sheet(),
            player_position: world.player().map(|p| p.position),
            visible_entities,
            terrain: world.map.view(&origin, self.config.visibility_range),
            visible_items,
            recent_events,
            memories: me.memory.recent(self.config.recent_memories),
            relationships,
            addressed,
        })
    }
}
