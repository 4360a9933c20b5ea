//! Character model shared by the player and NPCs
//!
//! Identity (`id`) never changes; everything else is mutable state owned by
//! the engine. HP is kept in `[0, max_hp]` and life status follows
//! `Alive -> Defeated -> (Dead | Alive)`, with revival allowed once.

mod types;

pub use types::{CharacterClass, CharacterRace};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{OakvaleError, Result};
use crate::memory::{MemoryEntry, MemoryLog};
use crate::world::{Item, ItemKind, Position};

/// Default memory log length for characters built without a config
pub const DEFAULT_MEMORY_CAPACITY: usize = 50;

/// Goals a character keeps in mind at once
pub const MAX_GOALS: usize = 8;

/// Stable character identifier. Ordering defines NPC apply order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(String);

impl CharacterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id of the human player
    pub fn player() -> Self {
        Self("player".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_player(&self) -> bool {
        self.0 == "player"
    }
}

impl std::fmt::Display for CharacterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CharacterId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CharacterId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Six-attribute stat block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub strength: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub charisma: i32,
}

impl Stats {
    pub fn new(
        strength: i32,
        dexterity: i32,
        constitution: i32,
        intelligence: i32,
        wisdom: i32,
        charisma: i32,
    ) -> Self {
        Self {
            strength,
            dexterity,
            constitution,
            intelligence,
            wisdom,
            charisma,
        }
    }

    /// All attributes at 10
    pub fn average() -> Self {
        Self::new(10, 10, 10, 10, 10, 10)
    }

    /// Component-wise sum
    pub fn plus(&self, other: &Stats) -> Stats {
        Stats::new(
            self.strength + other.strength,
            self.dexterity + other.dexterity,
            self.constitution + other.constitution,
            self.intelligence + other.intelligence,
            self.wisdom + other.wisdom,
            self.charisma + other.charisma,
        )
    }

    /// d20-style modifier: `floor((value - 10) / 2)`
    pub fn modifier(value: i32) -> i32 {
        (value - 10).div_euclid(2)
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::average()
    }
}

/// Life status of a character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifeStatus {
    Alive,
    Defeated,
    Dead,
}

impl LifeStatus {
    /// Whether the life-cycle rules allow `self -> to`
    pub fn can_transition(&self, to: LifeStatus) -> bool {
        matches!(
            (self, to),
            (LifeStatus::Alive, LifeStatus::Defeated)
                | (LifeStatus::Defeated, LifeStatus::Dead)
                | (LifeStatus::Defeated, LifeStatus::Alive)
        )
    }
}

/// Personality traits and current mood
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Personality {
    pub traits: Vec<String>,
    pub likes: Vec<String>,
    pub dislikes: Vec<String>,
    pub emotion: Option<String>,
}

/// A player or NPC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub class: CharacterClass,
    pub race: CharacterRace,
    pub level: u32,
    pub stats: Stats,
    hp: u32,
    max_hp: u32,
    status: LifeStatus,
    pub position: Position,
    pub inventory: Vec<Item>,
    pub gold: u32,
    pub description: String,
    pub personality: Personality,
    pub relationships: BTreeMap<CharacterId, i32>,
    pub goals: Vec<String>,
    pub memory: MemoryLog,
    revived: bool,
    defeated_at: Option<u64>,
}

impl Character {
    /// Create a character with stats derived from its class and race.
    ///
    /// Max HP follows `constitution + 4 * level`.
    pub fn new(
        id: impl Into<CharacterId>,
        name: impl Into<String>,
        class: CharacterClass,
        race: CharacterRace,
        level: u32,
    ) -> Self {
        let stats = Stats::average()
            .plus(&class.stat_bonus())
            .plus(&race.stat_bonus());
        let max_hp = (stats.constitution.max(1) as u32) + 4 * level.max(1);

        Self {
            id: id.into(),
            name: name.into(),
            class,
            race,
            level: level.max(1),
            stats,
            hp: max_hp,
            max_hp,
            status: LifeStatus::Alive,
            position: Position::new(0, 0),
            inventory: Vec::new(),
            gold: 0,
            description: String::new(),
            personality: Personality::default(),
            relationships: BTreeMap::new(),
            goals: Vec::new(),
            memory: MemoryLog::new(DEFAULT_MEMORY_CAPACITY),
            revived: false,
            defeated_at: None,
        }
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn with_stats(mut self, stats: Stats) -> Self {
        self.stats = stats;
        self
    }

    /// Override max HP; current HP is reset to full
    pub fn with_max_hp(mut self, max_hp: u32) -> Self {
        self.max_hp = max_hp.max(1);
        self.hp = self.max_hp;
        self
    }

    pub fn with_item(mut self, item: Item) -> Self {
        self.inventory.push(item);
        self
    }

    pub fn with_gold(mut self, gold: u32) -> Self {
        self.gold = gold;
        self
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.add_goal(goal);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_personality(mut self, personality: Personality) -> Self {
        self.personality = personality;
        self
    }

    pub fn with_memory_capacity(mut self, capacity: usize) -> Self {
        self.memory = MemoryLog::new(capacity);
        self
    }

    pub fn hp(&self) -> u32 {
        self.hp
    }

    pub fn max_hp(&self) -> u32 {
        self.max_hp
    }

    pub fn status(&self) -> LifeStatus {
        self.status
    }

    pub fn is_alive(&self) -> bool {
        self.status == LifeStatus::Alive
    }

    /// Whether this character has already used its one revival
    pub fn has_been_revived(&self) -> bool {
        self.revived
    }

    /// Turn on which the character was last defeated
    pub fn defeated_at(&self) -> Option<u64> {
        self.defeated_at
    }

    /// Apply damage, flooring HP at zero. Returns remaining HP.
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        self.hp = self.hp.saturating_sub(amount);
        debug!(
            "{} took {} damage (now: {}/{})",
            self.name, amount, self.hp, self.max_hp
        );
        self.hp
    }

    /// Restore HP, capped at max HP. Returns new HP.
    pub fn heal(&mut self, amount: u32) -> u32 {
        self.hp = self.hp.saturating_add(amount).min(self.max_hp);
        debug!(
            "{} healed {} HP (now: {}/{})",
            self.name, amount, self.hp, self.max_hp
        );
        self.hp
    }

    fn transition(&mut self, to: LifeStatus) -> Result<()> {
        if !self.status.can_transition(to) {
            return Err(OakvaleError::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Alive -> Defeated. HP is forced to zero.
    pub fn defeat(&mut self, turn: u64) -> Result<()> {
        self.transition(LifeStatus::Defeated)?;
        self.hp = 0;
        self.defeated_at = Some(turn);
        Ok(())
    }

    /// Defeated -> Dead. Terminal.
    pub fn die(&mut self) -> Result<()> {
        self.transition(LifeStatus::Dead)
    }

    /// Defeated -> Alive with the given HP (clamped to `[1, max_hp]`).
    ///
    /// Only one revival per character is allowed.
    pub fn revive(&mut self, hp: u32) -> Result<()> {
        if self.revived {
            return Err(OakvaleError::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to: LifeStatus::Alive,
            });
        }
        self.transition(LifeStatus::Alive)?;
        self.hp = hp.clamp(1, self.max_hp);
        self.revived = true;
        self.defeated_at = None;
        Ok(())
    }

    /// Append to the bounded memory log
    pub fn add_memory(&mut self, turn: u64, summary: impl Into<String>, importance: u8) {
        let entry = MemoryEntry::new(turn, summary, importance);
        debug!("Added memory to {}: {}", self.name, entry.summary);
        self.memory.push(entry);
    }

    /// Shift affinity towards another character, clamped to [-100, 100]
    pub fn modify_relationship(&mut self, other: &CharacterId, change: i32) {
        let current = self.relationships.get(other).copied().unwrap_or(0);
        let updated = (current + change).clamp(-100, 100);
        self.relationships.insert(other.clone(), updated);
        debug!(
            "Modified relationship: {} -> {} by {} (now: {})",
            self.name, other, change, updated
        );
    }

    pub fn relationship(&self, other: &CharacterId) -> i32 {
        self.relationships.get(other).copied().unwrap_or(0)
    }

    /// Human-readable band for an affinity score
    pub fn relationship_description(&self, other: &CharacterId) -> &'static str {
        describe_affinity(self.relationship(other))
    }

    pub fn add_item(&mut self, item: Item) {
        debug!("{} added item to inventory: {}", self.name, item.name);
        self.inventory.push(item);
    }

    /// Remove the first item with this name (case-insensitive)
    pub fn remove_item(&mut self, name: &str) -> Option<Item> {
        let index = self.find_item(name)?;
        Some(self.inventory.remove(index))
    }

    pub fn has_item(&self, name: &str) -> bool {
        self.find_item(name).is_some()
    }

    pub fn item(&self, name: &str) -> Option<&Item> {
        self.find_item(name).map(|i| &self.inventory[i])
    }

    fn find_item(&self, name: &str) -> Option<usize> {
        let wanted = name.trim();
        self.inventory
            .iter()
            .position(|item| item.name.eq_ignore_ascii_case(wanted))
    }

    /// Bonus of the best weapon carried
    pub fn weapon_bonus(&self) -> i32 {
        self.inventory
            .iter()
            .filter_map(|item| match item.kind {
                ItemKind::Weapon { bonus } => Some(bonus),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Sum of all armor carried
    pub fn armor(&self) -> i32 {
        self.inventory
            .iter()
            .filter_map(|item| match item.kind {
                ItemKind::Armor { defense } => Some(defense),
                _ => None,
            })
            .sum()
    }

    /// Append a goal, evicting the oldest ones beyond [`MAX_GOALS`]
    pub fn add_goal(&mut self, goal: impl Into<String>) {
        let goal = goal.into();
        if self.goals.contains(&goal) {
            return;
        }
        debug!("{} added goal: {}", self.name, goal);
        self.goals.push(goal);
        if self.goals.len() > MAX_GOALS {
            let dropped: Vec<String> = self.goals.drain(..self.goals.len() - MAX_GOALS).collect();
            debug!("{} gave up on {:?}", self.name, dropped);
        }
    }

    /// Replace an existing goal mentioned in `update`, or append it as new.
    pub fn apply_goal_update(&mut self, update: &str) {
        let update = update.trim();
        if update.is_empty() || update.eq_ignore_ascii_case("none") {
            return;
        }

        if let Some(slot) = self
            .goals
            .iter_mut()
            .find(|goal| !goal.is_empty() && update.contains(goal.as_str()))
        {
            *slot = update.to_string();
        } else {
            self.add_goal(update);
        }
    }

    /// Serializable summary used in perception snapshots
    pub fn sheet(&self) -> CharacterSheet {
        CharacterSheet {
            id: self.id.clone(),
            name: self.name.clone(),
            class: self.class,
            race: self.race,
            level: self.level,
            stats: self.stats,
            hp: self.hp,
            max_hp: self.max_hp,
            status: self.status,
            position: self.position,
            inventory: self.inventory.iter().map(|i| i.name.clone()).collect(),
            gold: self.gold,
            description: self.description.clone(),
            personality: self.personality.clone(),
            goals: self.goals.clone(),
        }
    }
}

impl std::fmt::Display for Character {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (Level {} {} {})",
            self.name, self.level, self.race, self.class
        )
    }
}

/// Affinity bands: close friend, friend, acquaintance, neutral, dislikes, enemy, sworn enemy
pub fn describe_affinity(value: i32) -> &'static str {
    match value {
        v if v >= 80 => "close friend",
        v if v >= 60 => "friend",
        v if v >= 30 => "acquaintance",
        v if v >= 0 => "neutral",
        v if v >= -30 => "dislikes",
        v if v >= -60 => "enemy",
        _ => "sworn enemy",
    }
}

/// Read-only character summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterSheet {
    pub id: CharacterId,
    pub name: String,
    pub class: CharacterClass,
    pub race: CharacterRace,
    pub level: u32,
    pub stats: Stats,
    pub hp: u32,
    pub max_hp: u32,
    pub status: LifeStatus,
    pub position: Position,
    pub inventory: Vec<String>,
    pub gold: u32,
    pub description: String,
    pub personality: Personality,
    pub goals: Vec<String>,
}
