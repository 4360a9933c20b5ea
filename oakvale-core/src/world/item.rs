//! Items carried by characters or lying on the ground

use serde::{Deserialize, Serialize};

use crate::character::CharacterId;

/// What an item does
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKind {
    Weapon { bonus: i32 },
    Armor { defense: i32 },
    Consumable { heal: u32 },
    Trinket,
    /// Remains of a defeated character
    Body { of: CharacterId, revivable: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub kind: ItemKind,
    /// Trade value in gold
    pub value: u32,
}

impl Item {
    pub fn new(name: impl Into<String>, kind: ItemKind, value: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            value,
        }
    }

    pub fn weapon(name: impl Into<String>, bonus: i32) -> Self {
        Self::new(name, ItemKind::Weapon { bonus }, 10 + 5 * bonus.max(0) as u32)
    }

    pub fn armor(name: impl Into<String>, defense: i32) -> Self {
        Self::new(name, ItemKind::Armor { defense }, 10 + 5 * defense.max(0) as u32)
    }

    pub fn consumable(name: impl Into<String>, heal: u32) -> Self {
        Self::new(name, ItemKind::Consumable { heal }, 2 + heal / 2)
    }

    pub fn trinket(name: impl Into<String>, value: u32) -> Self {
        Self::new(name, ItemKind::Trinket, value)
    }

    /// Body item left behind by a defeated character
    pub fn body(of: CharacterId, name: &str, revivable: bool) -> Self {
        Self::new(
            format!("body of {}", name),
            ItemKind::Body { of, revivable },
            0,
        )
    }

    /// Id of the character this body belongs to, if it is a revivable body
    pub fn revivable_body(&self) -> Option<&CharacterId> {
        match &self.kind {
            ItemKind::Body {
                of,
                revivable: true,
            } => Some(of),
            _ => None,
        }
    }

    pub fn body_of(&self) -> Option<&CharacterId> {
        match &self.kind {
            ItemKind::Body { of, .. } => Some(of),
            _ => None,
        }
    }
}

impl std::fmt::Display for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
