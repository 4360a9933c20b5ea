//! World state: map, locations, characters, ground items, clock and timeline
//!
//! The engine is the only writer. Everything else sees the world through
//! perception snapshots or the read-only [`crate::engine::WorldSnapshot`].

pub mod demo;
mod item;
mod map;

pub use item::{Item, ItemKind};
pub use map::{Direction, Location, Position, Terrain, WorldMap};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::character::{Character, CharacterId};
use crate::config::OakvaleConfig;
use crate::error::{OakvaleError, Result};
use crate::memory::{WorldEvent, WorldTimeline};

/// Coarse time-of-day bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    pub fn from_minute(minute: u64) -> Self {
        match (minute / 60) % 24 {
            6..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            17..=20 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Evening => "evening",
            TimeOfDay::Night => "night",
        }
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authoritative world state
#[derive(Debug, Clone)]
pub struct World {
    pub map: WorldMap,
    pub locations: Vec<Location>,
    characters: BTreeMap<CharacterId, Character>,
    ground: BTreeMap<Position, Vec<Item>>,
    pub timeline: WorldTimeline,
    turn: u64,
    minute: u64,
    minutes_per_turn: u64,
}

impl World {
    pub fn new(map: WorldMap, config: &OakvaleConfig) -> Self {
        Self {
            map,
            locations: Vec::new(),
            characters: BTreeMap::new(),
            ground: BTreeMap::new(),
            timeline: WorldTimeline::new(config.memory.max_world_events),
            turn: 0,
            minute: config.world.start_minute,
            minutes_per_turn: config.world.minutes_per_turn,
        }
    }

    pub fn add_location(&mut self, location: Location) {
        debug!("Added location: {}", location.name);
        self.locations.push(location);
    }

    /// Insert a character. Its tile must be passable and free.
    pub fn add_character(&mut self, character: Character) -> Result<()> {
        if self.characters.contains_key(&character.id) {
            return Err(OakvaleError::Other(format!(
                "Duplicate character id: {}",
                character.id
            )));
        }
        if !self.is_free(&character.position) {
            return Err(OakvaleError::invalid(format!(
                "Cannot place {} at {}",
                character.name, character.position
            )));
        }
        debug!("Placed {} at {}", character.name, character.position);
        self.characters.insert(character.id.clone(), character);
        Ok(())
    }

    pub fn character(&self, id: &CharacterId) -> Option<&Character> {
        self.characters.get(id)
    }

    pub fn character_mut(&mut self, id: &CharacterId) -> Option<&mut Character> {
        self.characters.get_mut(id)
    }

    /// Like [`World::character`] but fails with `UnknownCharacter`
    pub fn require(&self, id: &CharacterId) -> Result<&Character> {
        self.characters
            .get(id)
            .ok_or_else(|| OakvaleError::UnknownCharacter(id.clone()))
    }

    pub fn require_mut(&mut self, id: &CharacterId) -> Result<&mut Character> {
        self.characters
            .get_mut(id)
            .ok_or_else(|| OakvaleError::UnknownCharacter(id.clone()))
    }

    /// Two distinct characters borrowed mutably at once
    pub fn pair_mut(
        &mut self,
        a: &CharacterId,
        b: &CharacterId,
    ) -> Result<(&mut Character, &mut Character)> {
        if a == b {
            return Err(OakvaleError::invalid(format!("{} cannot target itself", a)));
        }
        let mut first = None;
        let mut second = None;
        for (id, character) in self.characters.iter_mut() {
            if id == a {
                first = Some(character);
            } else if id == b {
                second = Some(character);
            }
        }
        match (first, second) {
            (Some(x), Some(y)) => Ok((x, y)),
            (None, _) => Err(OakvaleError::UnknownCharacter(a.clone())),
            (_, None) => Err(OakvaleError::UnknownCharacter(b.clone())),
        }
    }

    /// All characters in id order
    pub fn characters(&self) -> impl Iterator<Item = &Character> {
        self.characters.values()
    }

    /// Non-player character ids in ascending order
    pub fn npc_ids(&self) -> Vec<CharacterId> {
        self.characters
            .keys()
            .filter(|id| !id.is_player())
            .cloned()
            .collect()
    }

    pub fn player(&self) -> Option<&Character> {
        self.characters.get(&CharacterId::player())
    }

    /// Case-insensitive lookup by display name
    pub fn find_by_name(&self, name: &str) -> Option<&Character> {
        let name = name.trim();
        self.characters
            .values()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Resolve free text that names a character by id or name
    pub fn resolve_target(&self, text: &str) -> Option<CharacterId> {
        let text = text.trim();
        let id = CharacterId::from(text);
        if self.characters.contains_key(&id) {
            return Some(id);
        }
        self.find_by_name(text).map(|c| c.id.clone())
    }

    /// Alive character standing on a tile; defeated characters leave the map
    pub fn occupant(&self, pos: &Position) -> Option<&Character> {
        self.characters
            .values()
            .find(|c| c.is_alive() && c.position == *pos)
    }

    /// Passable and not occupied
    pub fn is_free(&self, pos: &Position) -> bool {
        self.map.is_passable(pos) && self.occupant(pos).is_none()
    }

    /// Nearest free tile to `pos`, searching outwards ring by ring
    pub fn nearest_free(&self, pos: &Position) -> Option<Position> {
        if self.is_free(pos) {
            return Some(*pos);
        }
        let max_ring = self.map.width().max(self.map.height());
        for ring in 1..=max_ring {
            let mut candidates: Vec<Position> = Vec::new();
            for dy in -ring..=ring {
                for dx in -ring..=ring {
                    if dx.abs() == ring || dy.abs() == ring {
                        candidates.push(pos.offset(dx, dy));
                    }
                }
            }
            candidates.sort_by(|a, b| {
                a.distance(pos)
                    .total_cmp(&b.distance(pos))
                    .then_with(|| a.cmp(b))
            });
            if let Some(found) = candidates.into_iter().find(|p| self.is_free(p)) {
                return Some(found);
            }
        }
        None
    }

    pub fn location_at(&self, pos: &Position) -> Option<&Location> {
        // Smaller areas (buildings) win over the regions that contain them.
        self.locations
            .iter()
            .filter(|l| l.contains(pos))
            .min_by_key(|l| l.width * l.height)
    }

    pub fn location_name(&self, pos: &Position) -> String {
        self.location_at(pos)
            .map(|l| l.name.clone())
            .unwrap_or_else(|| "wilderness".to_string())
    }

    /// Location whose name appears in free text
    pub fn find_location(&self, text: &str) -> Option<&Location> {
        let text = text.to_lowercase();
        self.locations
            .iter()
            .find(|l| text.contains(&l.name.to_lowercase()))
    }

    pub fn shrines(&self) -> impl Iterator<Item = &Location> {
        self.locations.iter().filter(|l| l.shrine)
    }

    pub fn items_at(&self, pos: &Position) -> &[Item] {
        self.ground.get(pos).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn drop_item(&mut self, pos: Position, item: Item) {
        debug!("Item {} dropped at {}", item.name, pos);
        self.ground.entry(pos).or_default().push(item);
    }

    /// Pick an item off a tile by name (case-insensitive)
    pub fn take_item(&mut self, pos: &Position, name: &str) -> Option<Item> {
        let items = self.ground.get_mut(pos)?;
        let index = items
            .iter()
            .position(|i| i.name.eq_ignore_ascii_case(name.trim()))?;
        let item = items.remove(index);
        if items.is_empty() {
            self.ground.remove(pos);
        }
        Some(item)
    }

    /// Every item on the ground with its tile, in position order
    pub fn ground_items(&self) -> impl Iterator<Item = (&Position, &Item)> {
        self.ground
            .iter()
            .flat_map(|(pos, items)| items.iter().map(move |item| (pos, item)))
    }

    pub(crate) fn ground_items_mut(&mut self) -> impl Iterator<Item = (&Position, &mut Item)> {
        self.ground
            .iter_mut()
            .flat_map(|(pos, items)| items.iter_mut().map(move |item| (&*pos, item)))
    }

    pub(crate) fn characters_mut(&mut self) -> impl Iterator<Item = &mut Character> {
        self.characters.values_mut()
    }

    /// Remove the first item matching `predicate` from the ground or any inventory
    pub(crate) fn remove_item_where(&mut self, predicate: impl Fn(&Item) -> bool) -> Option<Item> {
        let mut found_tile = None;
        for (pos, items) in self.ground.iter_mut() {
            if let Some(index) = items.iter().position(&predicate) {
                found_tile = Some((*pos, items.remove(index)));
                break;
            }
        }
        if let Some((pos, item)) = found_tile {
            if self.ground.get(&pos).is_some_and(Vec::is_empty) {
                self.ground.remove(&pos);
            }
            return Some(item);
        }
        for character in self.characters.values_mut() {
            if let Some(index) = character.inventory.iter().position(&predicate) {
                return Some(character.inventory.remove(index));
            }
        }
        None
    }

    /// Stamp an event with the current turn and append it to the timeline
    pub fn record(&mut self, mut event: WorldEvent) -> Arc<WorldEvent> {
        event.turn = self.turn;
        debug!("[turn {}] {}", self.turn, event.summary);
        self.timeline.record(event)
    }

    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn minute(&self) -> u64 {
        self.minute
    }

    pub fn time_of_day(&self) -> TimeOfDay {
        TimeOfDay::from_minute(self.minute)
    }

    /// `Day N, HH:MM (bucket)`
    pub fn formatted_time(&self) -> String {
        let day = self.minute / (24 * 60) + 1;
        let hours = (self.minute / 60) % 24;
        let minutes = self.minute % 60;
        format!(
            "Day {}, {:02}:{:02} ({})",
            day,
            hours,
            minutes,
            self.time_of_day()
        )
    }

    /// Advance the turn counter and the clock
    pub(crate) fn advance_clock(&mut self) {
        self.turn += 1;
        self.minute += self.minutes_per_turn;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{CharacterClass, CharacterRace};

    fn world() -> World {
        let mut map = WorldMap::new(10, 10);
        map.fill(Terrain::Water, 0, 5, 10, 1);
        World::new(map, &OakvaleConfig::default())
    }

    fn villager(id: &str, x: i32, y: i32) -> Character {
        Character::new(id, id, CharacterClass::Villager, CharacterRace::Human, 1)
            .with_position(Position::new(x, y))
    }

    #[test]
    fn test_time_of_day_buckets() {
        assert_eq!(TimeOfDay::from_minute(8 * 60), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_minute(12 * 60), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_minute(20 * 60 + 59), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_minute(23 * 60), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_minute(24 * 60 + 7 * 60), TimeOfDay::Morning);
    }

    #[test]
    fn test_clock_formatting() {
        let mut w = world();
        assert_eq!(w.formatted_time(), "Day 1, 08:00 (morning)");
        w.advance_clock();
        assert_eq!(w.turn(), 1);
        assert_eq!(w.formatted_time(), "Day 1, 08:01 (morning)");
    }

    #[test]
    fn test_placement_rejects_blocked_tiles() {
        let mut w = world();
        w.add_character(villager("a", 1, 1)).unwrap();
        assert!(w.add_character(villager("b", 1, 1)).is_err());
        assert!(w.add_character(villager("c", 1, 5)).is_err());
        assert!(w.add_character(villager("a", 2, 2)).is_err());
    }

    #[test]
    fn test_nearest_free_skips_occupied() {
        let mut w = world();
        w.add_character(villager("a", 1, 1)).unwrap();
        let free = w.nearest_free(&Position::new(1, 1)).unwrap();
        assert_ne!(free, Position::new(1, 1));
        assert!(free.distance(&Position::new(1, 1)) <= 1.0);
    }

    #[test]
    fn test_ground_items() {
        let mut w = world();
        let pos = Position::new(2, 2);
        w.drop_item(pos, Item::trinket("Ring", 5));
        assert_eq!(w.items_at(&pos).len(), 1);
        assert!(w.take_item(&pos, "ring").is_some());
        assert!(w.items_at(&pos).is_empty());
        assert!(w.take_item(&pos, "ring").is_none());
    }

    #[test]
    fn test_pair_mut_and_resolve() {
        let mut w = world();
        w.add_character(villager("a", 1, 1)).unwrap();
        w.add_character(villager("b", 2, 1)).unwrap();
        let (a, b) = w.pair_mut(&"a".into(), &"b".into()).unwrap();
        a.gold = 1;
        b.gold = 2;
        assert!(w.pair_mut(&"a".into(), &"a".into()).is_err());
        assert_eq!(w.resolve_target("B"), Some(CharacterId::from("b")));
    }
}
