//! Action validation and resolution
//!
//! Every function validates against the current world before it mutates
//! anything, so a rejected action leaves the world untouched.

use tracing::info;

use crate::character::{Character, CharacterId, Stats};
use crate::config::RulesConfig;
use crate::error::{OakvaleError, Result};
use crate::memory::{EventKind, WorldEvent};
use crate::world::{Direction, Item, ItemKind, Position, World};

/// Reach for melee, conversation and trade (adjacent, diagonals included)
pub const INTERACT_RANGE: f64 = 1.5;

/// Words NPCs use when they mean the player
const PLAYER_WORDS: &[&str] = &[
    "player",
    "adventurer",
    "traveler",
    "traveller",
    "stranger",
    "newcomer",
];

/// Hit damage:
/// `floor(base + w_str*mod(STR) + w_dex*mod(DEX) + weapon - w_con*mod(CON) - armor)`,
/// floored at `min_damage` and never negative.
pub fn damage(rules: &RulesConfig, attacker: &Character, defender: &Character) -> u32 {
    let modifier = |v: i32| f64::from(Stats::modifier(v));
    let raw = rules.base_damage
        + rules.strength_weight * modifier(attacker.stats.strength)
        + rules.dexterity_weight * modifier(attacker.stats.dexterity)
        + f64::from(attacker.weapon_bonus())
        - rules.constitution_weight * modifier(defender.stats.constitution)
        - f64::from(defender.armor());

    raw.floor().max(f64::from(rules.min_damage)).max(0.0) as u32
}

fn living<'w>(world: &'w World, id: &CharacterId) -> Result<&'w Character> {
    let character = world.require(id)?;
    if !character.is_alive() {
        return Err(OakvaleError::invalid(format!(
            "{} is {:?}",
            character.name,
            character.status()
        )));
    }
    Ok(character)
}

fn within_reach(a: &Character, b: &Character) -> Result<()> {
    if a.id == b.id {
        return Err(OakvaleError::invalid(format!("{} cannot target itself", a.name)));
    }
    if a.position.distance(&b.position) > INTERACT_RANGE {
        return Err(OakvaleError::invalid(format!(
            "{} is out of reach of {}",
            b.name, a.name
        )));
    }
    Ok(())
}

/// Resolve free text naming a character, from `actor`'s point of view
pub fn resolve_character(world: &World, actor: &CharacterId, text: &str) -> Option<CharacterId> {
    if let Some(id) = world.resolve_target(text) {
        return Some(id);
    }
    let lowered = text.to_lowercase();
    if !actor.is_player() && PLAYER_WORDS.iter().any(|w| lowered.contains(w)) {
        return world.player().map(|p| p.id.clone());
    }
    world
        .characters()
        .filter(|c| &c.id != actor)
        .find(|c| lowered.contains(&c.name.to_lowercase()))
        .map(|c| c.id.clone())
}

fn check_step(world: &World, from: &Position, direction: Direction) -> Result<Position> {
    let dest = from.step(direction);
    if !world.map.in_bounds(&dest) {
        return Err(OakvaleError::invalid(format!("{} is off the map", dest)));
    }
    if !world.map.is_passable(&dest) {
        let terrain = world.map.terrain_at(&dest).map(|t| t.as_str()).unwrap_or("?");
        return Err(OakvaleError::invalid(format!("{} at {} blocks the way", terrain, dest)));
    }
    if let Some(occupant) = world.occupant(&dest) {
        return Err(OakvaleError::invalid(format!("{} is occupied by {}", dest, occupant.name)));
    }
    Ok(dest)
}

/// Move one tile
pub fn move_step(world: &mut World, actor: &CharacterId, direction: Direction) -> Result<Position> {
    let mover = living(world, actor)?;
    let dest = check_step(world, &mover.position, direction)?;
    let name = mover.name.clone();

    world.require_mut(actor)?.position = dest;
    let place = world.location_name(&dest);
    world.record(WorldEvent::new(
        0,
        EventKind::Move,
        actor.clone(),
        format!("{} moves {} ({}).", name, direction, place),
    ));
    Ok(dest)
}

/// Move one tile towards a named character or location.
///
/// Names are resolved first; text that names nothing but carries a compass
/// word is taken as a plain step. The dominant axis is tried first, then
/// the other axis as a detour.
pub fn move_toward(world: &mut World, actor: &CharacterId, target: &str) -> Result<Position> {
    let mover = living(world, actor)?;
    let from = mover.position;
    let name = mover.name.clone();

    let goal = resolve_character(world, actor, target)
        .and_then(|id| world.character(&id).map(|c| c.position))
        .or_else(|| world.find_location(target).map(|l| l.center()));
    let Some(goal) = goal else {
        let direction = Direction::find_in(target)
            .ok_or_else(|| OakvaleError::invalid(format!("no movement target in '{}'", target)))?;
        return move_step(world, actor, direction);
    };

    let dx = goal.x - from.x;
    let dy = goal.y - from.y;
    let horizontal = (dx != 0).then(|| if dx > 0 { Direction::East } else { Direction::West });
    let vertical = (dy != 0).then(|| if dy > 0 { Direction::South } else { Direction::North });
    let candidates = if dx.abs() > dy.abs() {
        [horizontal, vertical]
    } else {
        [vertical, horizontal]
    };

    let mut last_error = OakvaleError::invalid(format!("{} is already at {}", name, target));
    for direction in candidates.into_iter().flatten() {
        match check_step(world, &from, direction) {
            Ok(_) => return move_step(world, actor, direction),
            Err(e) => last_error = e,
        }
    }
    Err(last_error)
}

/// Result of a landed hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackOutcome {
    pub damage: u32,
    pub defeated: bool,
}

pub fn attack(
    world: &mut World,
    rules: &RulesConfig,
    attacker: &CharacterId,
    target: &CharacterId,
) -> Result<AttackOutcome> {
    let a = living(world, attacker)?;
    let t = living(world, target)?;
    within_reach(a, t)?;
    let dealt = damage(rules, a, t);
    let (a_name, t_name) = (a.name.clone(), t.name.clone());
    let turn = world.turn();

    let (a, t) = world.pair_mut(attacker, target)?;
    let remaining = t.take_damage(dealt);
    t.modify_relationship(attacker, -20);
    a.add_memory(turn, format!("I attacked {} for {} damage", t_name, dealt), 2);
    t.add_memory(turn, format!("{} attacked me for {} damage", a_name, dealt), 3);

    world.record(
        WorldEvent::new(
            0,
            EventKind::Attack,
            attacker.clone(),
            format!("{} attacks {} for {} damage.", a_name, t_name, dealt),
        )
        .with_target(target.clone()),
    );

    let defeated = remaining == 0;
    if defeated {
        defeat(world, target)?;
    }
    Ok(AttackOutcome {
        damage: dealt,
        defeated,
    })
}

/// Alive -> Defeated, leaving a body item on the character's tile
pub fn defeat(world: &mut World, id: &CharacterId) -> Result<()> {
    let turn = world.turn();
    let character = world.require_mut(id)?;
    character.defeat(turn)?;
    let position = character.position;
    let name = character.name.clone();
    let revivable = !character.has_been_revived();

    world.drop_item(position, Item::body(id.clone(), &name, revivable));
    world.record(WorldEvent::new(
        0,
        EventKind::Defeat,
        id.clone(),
        format!("{} has been defeated.", name),
    ));
    info!("{} defeated at {} (revivable: {})", name, position, revivable);
    Ok(())
}

/// Say something to an adjacent character
pub fn talk(world: &mut World, speaker: &CharacterId, target: &CharacterId, line: &str) -> Result<()> {
    let line = line.trim();
    if line.is_empty() {
        return Err(OakvaleError::invalid("nothing to say"));
    }
    let s = living(world, speaker)?;
    let t = living(world, target)?;
    within_reach(s, t)?;
    let (s_name, t_name) = (s.name.clone(), t.name.clone());
    let turn = world.turn();

    let (s, t) = world.pair_mut(speaker, target)?;
    s.modify_relationship(target, 1);
    t.modify_relationship(speaker, 1);
    s.add_memory(turn, format!("I said to {}: \"{}\"", t_name, line), 1);
    t.add_memory(turn, format!("{} said to me: \"{}\"", s_name, line), 2);

    world.record(
        WorldEvent::new(
            0,
            EventKind::Dialog,
            speaker.clone(),
            format!("{} says to {}: \"{}\"", s_name, t_name, line),
        )
        .with_target(target.clone()),
    );
    Ok(())
}

/// Speech not aimed at anyone in particular
pub fn say(world: &mut World, speaker: &CharacterId, line: &str) -> Result<()> {
    let s = living(world, speaker)?;
    let name = s.name.clone();
    let turn = world.turn();
    world
        .require_mut(speaker)?
        .add_memory(turn, format!("I said: \"{}\"", line), 1);
    world.record(WorldEvent::new(
        0,
        EventKind::Dialog,
        speaker.clone(),
        format!("{} says: \"{}\"", name, line),
    ));
    Ok(())
}

/// Sell an item to an adjacent buyer. Returns the price paid.
pub fn trade(
    world: &mut World,
    seller: &CharacterId,
    buyer: &CharacterId,
    item: &str,
    price: Option<u32>,
) -> Result<u32> {
    let s = living(world, seller)?;
    let b = living(world, buyer)?;
    within_reach(s, b)?;
    let goods = s
        .item(item)
        .ok_or_else(|| OakvaleError::invalid(format!("{} has no {}", s.name, item)))?;
    let price = price.unwrap_or(goods.value);
    if b.gold < price {
        return Err(OakvaleError::invalid(format!(
            "{} cannot afford {} gold",
            b.name, price
        )));
    }
    let (s_name, b_name) = (s.name.clone(), b.name.clone());
    let turn = world.turn();

    let (s, b) = world.pair_mut(seller, buyer)?;
    let goods = s
        .remove_item(item)
        .ok_or_else(|| OakvaleError::invalid(format!("{} has no {}", s_name, item)))?;
    let goods_name = goods.name.clone();
    b.add_item(goods);
    b.gold -= price;
    s.gold += price;
    s.modify_relationship(buyer, 2);
    b.modify_relationship(seller, 2);
    s.add_memory(turn, format!("I sold {} to {} for {} gold", goods_name, b_name, price), 2);
    b.add_memory(turn, format!("I bought {} from {} for {} gold", goods_name, s_name, price), 2);

    world.record(
        WorldEvent::new(
            0,
            EventKind::Trade,
            seller.clone(),
            format!("{} sells {} to {} for {} gold.", s_name, goods_name, b_name, price),
        )
        .with_target(buyer.clone()),
    );
    Ok(price)
}

pub fn use_item(world: &mut World, actor: &CharacterId, item: &str) -> Result<()> {
    let user = living(world, actor)?;
    let owned = user
        .item(item)
        .ok_or_else(|| OakvaleError::invalid(format!("{} has no {}", user.name, item)))?;
    let name = user.name.clone();

    let summary = match owned.kind.clone() {
        ItemKind::Consumable { heal } => {
            let character = world.require_mut(actor)?;
            let used = character
                .remove_item(item)
                .ok_or_else(|| OakvaleError::invalid(format!("{} has no {}", name, item)))?;
            let hp = character.heal(heal);
            format!("{} uses {} and recovers to {} HP.", name, used.name, hp)
        }
        ItemKind::Weapon { .. } | ItemKind::Armor { .. } | ItemKind::Trinket => {
            format!("{} handles the {}.", name, owned.name)
        }
        ItemKind::Body { .. } => {
            return Err(OakvaleError::invalid("a body cannot be used"));
        }
    };

    world.record(WorldEvent::new(0, EventKind::ItemUse, actor.clone(), summary));
    Ok(())
}

/// Pick up an item from the actor's tile or an adjacent one
pub fn pick_up(world: &mut World, actor: &CharacterId, item: &str) -> Result<()> {
    let picker = living(world, actor)?;
    let origin = picker.position;
    let name = picker.name.clone();

    let tile = std::iter::once(origin)
        .chain(origin.neighbours())
        .find(|pos| {
            world
                .items_at(pos)
                .iter()
                .any(|i| i.name.eq_ignore_ascii_case(item.trim()))
        })
        .ok_or_else(|| OakvaleError::invalid(format!("no {} within reach", item)))?;

    let taken = world
        .take_item(&tile, item)
        .ok_or_else(|| OakvaleError::invalid(format!("no {} within reach", item)))?;
    let summary = format!("{} picks up {}.", name, taken.name);
    world.require_mut(actor)?.add_item(taken);
    world.record(WorldEvent::new(0, EventKind::ItemUse, actor.clone(), summary));
    Ok(())
}

pub fn drop_item(world: &mut World, actor: &CharacterId, item: &str) -> Result<()> {
    let dropper = living(world, actor)?;
    if !dropper.has_item(item) {
        return Err(OakvaleError::invalid(format!("{} has no {}", dropper.name, item)));
    }
    let name = dropper.name.clone();
    let character = world.require_mut(actor)?;
    let position = character.position;
    let dropped = character
        .remove_item(item)
        .ok_or_else(|| OakvaleError::invalid(format!("{} has no {}", name, item)))?;
    let summary = format!("{} drops {}.", name, dropped.name);
    world.drop_item(position, dropped);
    world.record(WorldEvent::new(0, EventKind::ItemUse, actor.clone(), summary));
    Ok(())
}

pub fn wait(world: &mut World, actor: &CharacterId, manner: &str) -> Result<()> {
    let waiter = living(world, actor)?;
    let summary = format!("{} waits {}.", waiter.name, manner.trim());
    world.record(WorldEvent::new(0, EventKind::Wait, actor.clone(), summary));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{CharacterClass, CharacterRace, LifeStatus};
    use crate::config::OakvaleConfig;
    use crate::world::{Terrain, WorldMap};

    fn fighter(id: &str, x: i32, y: i32) -> Character {
        Character::new(id, id, CharacterClass::Villager, CharacterRace::Human, 1)
            .with_stats(Stats::average())
            .with_max_hp(10)
            .with_position(Position::new(x, y))
    }

    fn world(chars: Vec<Character>) -> World {
        let mut map = WorldMap::new(10, 10);
        map.fill(Terrain::Water, 5, 0, 1, 10);
        let mut world = World::new(map, &OakvaleConfig::default());
        for c in chars {
            world.add_character(c).unwrap();
        }
        world
    }

    #[test]
    fn test_damage_formula() {
        let rules = RulesConfig::default();
        let plain = fighter("a", 0, 0);
        // base 2, all modifiers zero
        assert_eq!(damage(&rules, &plain, &plain), 2);

        let strong = fighter("b", 0, 0)
            .with_stats(Stats::new(16, 14, 10, 10, 10, 10))
            .with_item(Item::weapon("axe", 3));
        // 2 + 3 + 0.5*2 + 3 = 9
        assert_eq!(damage(&rules, &strong, &plain), 9);

        let tank = fighter("c", 0, 0)
            .with_stats(Stats::new(10, 10, 20, 10, 10, 10))
            .with_item(Item::armor("plate", 10));
        // far below zero, clamped to min_damage
        assert_eq!(damage(&rules, &plain, &tank), rules.min_damage);

        let no_floor = RulesConfig {
            min_damage: 0,
            ..RulesConfig::default()
        };
        assert_eq!(damage(&no_floor, &plain, &tank), 0);
    }

    #[test]
    fn test_attack_until_defeat_drops_body() {
        let mut w = world(vec![fighter("a", 1, 1), fighter("b", 2, 1)]);
        let rules = RulesConfig {
            base_damage: 4.0,
            ..RulesConfig::default()
        };
        let (a, b) = (CharacterId::from("a"), CharacterId::from("b"));

        let first = attack(&mut w, &rules, &a, &b).unwrap();
        assert_eq!(first.damage, 4);
        assert!(!first.defeated);
        attack(&mut w, &rules, &a, &b).unwrap();
        let last = attack(&mut w, &rules, &a, &b).unwrap();
        assert!(last.defeated);

        let target = w.character(&b).unwrap();
        assert_eq!(target.hp(), 0);
        assert_eq!(target.status(), LifeStatus::Defeated);
        assert_eq!(target.relationship(&a), -60);
        assert!(w.items_at(&Position::new(2, 1))[0].revivable_body().is_some());

        // A defeated target cannot be attacked again, and nothing changes
        let before = w.character(&a).unwrap().clone();
        assert!(attack(&mut w, &rules, &a, &b).is_err());
        assert_eq!(w.character(&a).unwrap(), &before);
    }

    #[test]
    fn test_attack_out_of_reach_is_rejected() {
        let mut w = world(vec![fighter("a", 1, 1), fighter("b", 3, 1)]);
        let err = attack(&mut w, &RulesConfig::default(), &"a".into(), &"b".into());
        assert!(matches!(err, Err(OakvaleError::InvalidAction(_))));
        assert_eq!(w.character(&"b".into()).unwrap().hp(), 10);
    }

    #[test]
    fn test_move_validation() {
        let mut w = world(vec![fighter("a", 4, 4), fighter("b", 4, 5)]);
        let a = CharacterId::from("a");
        assert!(move_step(&mut w, &a, Direction::East).is_err(), "water");
        assert!(move_step(&mut w, &a, Direction::South).is_err(), "occupied");
        assert_eq!(move_step(&mut w, &a, Direction::North).unwrap(), Position::new(4, 3));
    }

    #[test]
    fn test_move_toward_detours() {
        let mut w = world(vec![fighter("a", 1, 1), fighter("b", 1, 3), fighter("c", 1, 2)]);
        // c blocks the direct path south towards b; step east is not towards b either
        assert!(move_toward(&mut w, &"a".into(), "b").is_err());

        let mut w = world(vec![fighter("a", 1, 1), fighter("b", 4, 3), fighter("c", 2, 1)]);
        // dominant axis east is blocked by c, detour south
        assert_eq!(
            move_toward(&mut w, &"a".into(), "go see b").unwrap(),
            Position::new(1, 2)
        );
    }

    #[test]
    fn test_move_toward_prefers_names_over_compass_words() {
        let mut w = world(vec![fighter("a", 1, 1), fighter("b", 1, 4)]);
        let a = CharacterId::from("a");
        // "east" is only a fallback; b is named and lies south
        assert_eq!(
            move_toward(&mut w, &a, "b by the east wall").unwrap(),
            Position::new(1, 2)
        );
        assert_eq!(
            move_toward(&mut w, &a, "head north for a while").unwrap(),
            Position::new(1, 1)
        );
        assert!(move_toward(&mut w, &a, "restock supplies").is_err());
    }

    #[test]
    fn test_wait_is_recorded_as_wait() {
        let mut w = world(vec![fighter("a", 1, 1)]);
        wait(&mut w, &"a".into(), "patiently").unwrap();
        let events = w.timeline.recent(1);
        assert_eq!(events[0].kind, EventKind::Wait);
        assert_eq!(events[0].summary, "a waits patiently.");
    }

    #[test]
    fn test_trade_moves_goods_and_gold() {
        let seller = fighter("s", 1, 1).with_item(Item::trinket("ring", 8));
        let buyer = fighter("b", 2, 2).with_gold(10);
        let mut w = world(vec![seller, buyer]);
        let (s, b) = (CharacterId::from("s"), CharacterId::from("b"));

        assert!(trade(&mut w, &s, &b, "ring", Some(11)).is_err(), "too expensive");
        assert_eq!(trade(&mut w, &s, &b, "Ring", None).unwrap(), 8);
        assert!(w.character(&b).unwrap().has_item("ring"));
        assert_eq!(w.character(&b).unwrap().gold, 2);
        assert_eq!(w.character(&s).unwrap().gold, 8);
        assert!(trade(&mut w, &s, &b, "ring", None).is_err(), "already sold");
    }

    #[test]
    fn test_use_and_pick_up() {
        let mut hurt = fighter("a", 1, 1).with_item(Item::consumable("potion", 5));
        hurt.take_damage(7);
        let mut w = world(vec![hurt]);
        let a = CharacterId::from("a");

        use_item(&mut w, &a, "potion").unwrap();
        assert_eq!(w.character(&a).unwrap().hp(), 8);
        assert!(use_item(&mut w, &a, "potion").is_err());

        w.drop_item(Position::new(2, 2), Item::trinket("coin", 1));
        pick_up(&mut w, &a, "coin").unwrap();
        assert!(w.character(&a).unwrap().has_item("coin"));
        drop_item(&mut w, &a, "coin").unwrap();
        assert_eq!(w.items_at(&Position::new(1, 1)).len(), 1);
    }

    #[test]
    fn test_resolve_player_words() {
        let mut w = world(vec![fighter("npc", 1, 1)]);
        w.add_character(
            Character::new(CharacterId::player(), "Hero", CharacterClass::Warrior, CharacterRace::Human, 1)
                .with_position(Position::new(3, 3)),
        )
        .unwrap();
        let npc = CharacterId::from("npc");
        assert_eq!(
            resolve_character(&w, &npc, "the stranger"),
            Some(CharacterId::player())
        );
        assert_eq!(resolve_character(&w, &npc, "Hero"), Some(CharacterId::player()));
        assert_eq!(resolve_character(&w, &npc, "nobody"), None);
    }
}
