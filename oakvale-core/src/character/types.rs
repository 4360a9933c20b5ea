//! Closed tag sets for character classes and races
//!
//! New classes or races are added by extending the enum and its attribute
//! table, never by subclassing.

use serde::{Deserialize, Serialize};

use super::Stats;

/// Character class tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharacterClass {
    Warrior,
    Wizard,
    Rogue,
    Cleric,
    Bard,
    Merchant,
    Villager,
    Guard,
    Monster,
    Ranger,
    Paladin,
}

impl CharacterClass {
    /// Attribute bonuses granted by the class
    pub fn stat_bonus(&self) -> Stats {
        let (str_, dex, con, int, wis, cha) = match self {
            CharacterClass::Warrior => (4, 0, 2, 0, 0, 0),
            CharacterClass::Wizard => (0, 0, 0, 4, 2, 0),
            CharacterClass::Rogue => (0, 4, 0, 0, 0, 2),
            CharacterClass::Cleric => (0, 0, 0, 0, 4, 2),
            CharacterClass::Bard => (0, 2, 0, 0, 0, 4),
            CharacterClass::Merchant => (0, 0, 0, 2, 0, 4),
            CharacterClass::Villager => (1, 0, 1, 0, 0, 0),
            CharacterClass::Guard => (2, 0, 2, 0, 0, 0),
            CharacterClass::Monster => (3, 1, 3, -2, 0, -2),
            CharacterClass::Ranger => (0, 3, 1, 0, 2, 0),
            CharacterClass::Paladin => (3, 0, 1, 0, 0, 2),
        };
        Stats::new(str_, dex, con, int, wis, cha)
    }

    /// Map glyph used by the terminal UI
    pub fn symbol(&self) -> char {
        match self {
            CharacterClass::Warrior => 'W',
            CharacterClass::Wizard => 'M',
            CharacterClass::Rogue => 'R',
            CharacterClass::Cleric => 'C',
            CharacterClass::Bard => 'B',
            CharacterClass::Merchant => 'T',
            CharacterClass::Villager => 'V',
            CharacterClass::Guard => 'G',
            CharacterClass::Monster => 'X',
            CharacterClass::Ranger => 'A',
            CharacterClass::Paladin => 'P',
        }
    }

    /// Lowercase tag
    pub fn as_str(&self) -> &'static str {
        match self {
            CharacterClass::Warrior => "warrior",
            CharacterClass::Wizard => "wizard",
            CharacterClass::Rogue => "rogue",
            CharacterClass::Cleric => "cleric",
            CharacterClass::Bard => "bard",
            CharacterClass::Merchant => "merchant",
            CharacterClass::Villager => "villager",
            CharacterClass::Guard => "guard",
            CharacterClass::Monster => "monster",
            CharacterClass::Ranger => "ranger",
            CharacterClass::Paladin => "paladin",
        }
    }
}

impl std::fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Character race tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharacterRace {
    Human,
    Elf,
    Dwarf,
    Halfling,
    Orc,
    Goblin,
    Gnome,
}

impl CharacterRace {
    /// Attribute bonuses granted by the race
    pub fn stat_bonus(&self) -> Stats {
        let (str_, dex, con, int, wis, cha) = match self {
            CharacterRace::Human => (0, 0, 0, 0, 0, 1),
            CharacterRace::Elf => (0, 2, 0, 1, 0, 0),
            CharacterRace::Dwarf => (0, 0, 2, 0, 1, 0),
            CharacterRace::Halfling => (0, 2, 0, 0, 0, 1),
            CharacterRace::Orc => (2, 0, 1, -1, 0, -1),
            CharacterRace::Goblin => (-1, 2, 0, 0, 0, -1),
            CharacterRace::Gnome => (0, 0, 0, 2, 0, 1),
        };
        Stats::new(str_, dex, con, int, wis, cha)
    }

    /// Lowercase tag
    pub fn as_str(&self) -> &'static str {
        match self {
            CharacterRace::Human => "human",
            CharacterRace::Elf => "elf",
            CharacterRace::Dwarf => "dwarf",
            CharacterRace::Halfling => "halfling",
            CharacterRace::Orc => "orc",
            CharacterRace::Goblin => "goblin",
            CharacterRace::Gnome => "gnome",
        }
    }
}

impl std::fmt::Display for CharacterRace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_bonus_table() {
        let warrior = CharacterClass::Warrior.stat_bonus();
        assert_eq!(warrior.strength, 4);
        assert_eq!(warrior.constitution, 2);

        let wizard = CharacterClass::Wizard.stat_bonus();
        assert_eq!(wizard.intelligence, 4);
    }

    #[test]
    fn test_tags_serialize_lowercase() {
        let json = serde_json::to_string(&CharacterRace::Halfling).unwrap();
        assert_eq!(json, "\"halfling\"");

        let class: CharacterClass = serde_json::from_str("\"guard\"").unwrap();
        assert_eq!(class, CharacterClass::Guard);
    }
}
