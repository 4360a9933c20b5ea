//! Shrine revival and body decay

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use crate::character::{CharacterId, LifeStatus};
use crate::config::RulesConfig;
use crate::error::Result;
use crate::memory::{EventKind, WorldEvent};
use crate::world::{ItemKind, Position, World};

/// Consecutive turns each revivable body has spent near a shrine
#[derive(Debug, Default, Clone)]
pub struct RevivalTracker {
    progress: BTreeMap<CharacterId, u32>,
}

impl RevivalTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self, id: &CharacterId) -> u32 {
        self.progress.get(id).copied().unwrap_or(0)
    }

    /// Run once per turn, after the clock has advanced
    pub fn step(&mut self, world: &mut World, rules: &RulesConfig) -> Result<Vec<CharacterId>> {
        self.expire(world, rules)?;

        let mut revived = Vec::new();
        let mut seen = BTreeSet::new();
        for (of, position) in revivable_bodies(world) {
            let near = world
                .shrines()
                .any(|shrine| shrine.distance_to(&position) <= rules.shrine_radius);
            let count = self.progress.entry(of.clone()).or_insert(0);
            if near {
                *count += 1;
            } else {
                *count = 0;
            }
            debug!("Revival progress for {}: {}", of, count);
            if *count >= rules.revival_turns {
                revived.push((of.clone(), position));
            }
            seen.insert(of);
        }
        self.progress.retain(|id, _| seen.contains(id));

        let mut ids = Vec::with_capacity(revived.len());
        for (id, position) in revived {
            self.progress.remove(&id);
            revive(world, rules, &id, position)?;
            ids.push(id);
        }
        Ok(ids)
    }

    /// Defeated characters past the window die and their bodies stop being revivable
    fn expire(&mut self, world: &mut World, rules: &RulesConfig) -> Result<()> {
        let turn = world.turn();
        let expired: Vec<CharacterId> = world
            .characters()
            .filter(|c| c.status() == LifeStatus::Defeated)
            .filter(|c| {
                c.defeated_at()
                    .is_some_and(|at| turn.saturating_sub(at) >= rules.revival_window)
            })
            .map(|c| c.id.clone())
            .collect();

        for id in expired {
            let character = world.require_mut(&id)?;
            character.die()?;
            let name = character.name.clone();
            mark_unrevivable(world, &id);
            self.progress.remove(&id);
            world.record(WorldEvent::new(
                0,
                EventKind::Death,
                id.clone(),
                format!("{} is gone for good.", name),
            ));
            info!("{} was not revived in time and is dead", name);
        }
        Ok(())
    }
}

/// Every revivable body and where it currently is, carried ones included
fn revivable_bodies(world: &World) -> Vec<(CharacterId, Position)> {
    let on_ground = world
        .ground_items()
        .filter_map(|(pos, item)| item.revivable_body().map(|of| (of.clone(), *pos)));
    let carried = world.characters().flat_map(|carrier| {
        carrier
            .inventory
            .iter()
            .filter_map(|item| item.revivable_body().map(|of| (of.clone(), carrier.position)))
    });
    on_ground.chain(carried).collect()
}

fn mark_unrevivable(world: &mut World, id: &CharacterId) {
    let flip = |kind: &mut ItemKind| {
        if let ItemKind::Body { of, revivable } = kind {
            if of == id {
                *revivable = false;
            }
        }
    };
    for (_, item) in world.ground_items_mut() {
        flip(&mut item.kind);
    }
    for character in world.characters_mut() {
        for item in character.inventory.iter_mut() {
            flip(&mut item.kind);
        }
    }
}

fn revive(world: &mut World, rules: &RulesConfig, id: &CharacterId, body_at: Position) -> Result<()> {
    let spot = world.nearest_free(&body_at).unwrap_or(body_at);
    world.remove_item_where(|item| item.revivable_body() == Some(id));

    let character = world.require_mut(id)?;
    let hp = ((f64::from(character.max_hp()) * rules.revival_hp_fraction).floor() as u32).max(1);
    character.revive(hp)?;
    character.position = spot;
    let name = character.name.clone();
    let turn = world.turn();
    world
        .require_mut(id)?
        .add_memory(turn, "I was brought back to life at the shrine", 3);

    world.record(WorldEvent::new(
        0,
        EventKind::Revival,
        id.clone(),
        format!("{} rises again at {} with {} HP.", name, spot, hp),
    ));
    info!("{} revived at {} with {} HP", name, spot, hp);
    Ok(())
}
