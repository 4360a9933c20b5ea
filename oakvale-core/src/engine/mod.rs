//! Turn engine: the single writer of world state
//!
//! Each call to [`Engine::advance_turn`] applies the player's action
//! (waiting for the addressed NPC's answer when the player talks),
//! drains whatever NPC decisions are ready, applies them in ascending
//! character id order, advances the clock and resolves revivals, then
//! republishes perception so the next round of decisions starts from
//! consistent post-turn state.
//!
//! Decisions arrive asynchronously and are based on older snapshots, so a
//! decision that no longer fits the world is expected. It is discarded with
//! a log line and never reported to the player.

pub mod revival;
pub mod rules;

pub use revival::RevivalTracker;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::character::{CharacterId, CharacterSheet, LifeStatus};
use crate::config::{OakvaleConfig, RulesConfig};
use crate::decision::{Decision, DecisionResponse, FALLBACK_DIALOG, MoveTarget};
use crate::error::{OakvaleError, Result};
use crate::memory::WorldEvent;
use crate::perception::{PerceptionBuilder, PerceptionSnapshot, Utterance};
use crate::world::{Direction, Position, World};

/// Turns an utterance stays in the addressee's perception
const UTTERANCE_TURNS: u64 = 3;

/// Where the engine sends perception and gets decisions back.
///
/// The NPC process manager implements this; tests substitute a stub.
#[async_trait]
pub trait DecisionSource: Send {
    /// Hand over fresh end-of-turn snapshots, one per alive NPC
    async fn publish(&mut self, snapshots: Vec<PerceptionSnapshot>) -> Result<()>;

    /// Let the source run its scheduling pass
    async fn tick(&mut self, elapsed: Duration, roster: &Roster) -> Result<()>;

    /// Decisions that are ready now. Never blocks.
    fn poll(&mut self) -> Vec<DecisionResponse>;

    /// Spoken answer of the snapshot's NPC to `speaker`. Never fails: a
    /// source that cannot answer in time returns [`FALLBACK_DIALOG`].
    async fn converse(&mut self, _snapshot: PerceptionSnapshot, _speaker: &str, _message: &str) -> String {
        FALLBACK_DIALOG.to_string()
    }

    async fn shutdown(&mut self) -> Result<()>;
}

/// Positions and statuses the scheduler needs for activation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster {
    pub player: Option<Position>,
    pub npcs: Vec<RosterEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub id: CharacterId,
    pub position: Position,
    pub status: LifeStatus,
}

impl Roster {
    pub fn from_world(world: &World) -> Self {
        Self {
            player: world.player().map(|p| p.position),
            npcs: world
                .characters()
                .filter(|c| !c.id.is_player())
                .map(|c| RosterEntry {
                    id: c.id.clone(),
                    position: c.position,
                    status: c.status(),
                })
                .collect(),
        }
    }
}

/// One validated player command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlayerAction {
    Move { direction: Direction },
    Attack { target: String },
    Talk { target: String, message: String },
    /// Sell an item from the player's inventory to an adjacent character
    Trade {
        target: String,
        item: String,
        price: Option<u32>,
    },
    UseItem { item: String },
    PickUp { item: String },
    Drop { item: String },
    Wait,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundItem {
    pub position: Position,
    pub name: String,
}

/// Read-only view handed to the UI after every turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub turn: u64,
    pub time: String,
    pub tiles: Vec<String>,
    pub characters: Vec<CharacterSheet>,
    pub ground_items: Vec<GroundItem>,
    /// Events recorded while resolving the turn that produced this snapshot
    pub events: Vec<WorldEvent>,
    pub player_status: Option<LifeStatus>,
}

impl WorldSnapshot {
    pub fn character(&self, id: &CharacterId) -> Option<&CharacterSheet> {
        self.characters.iter().find(|c| &c.id == id)
    }
}

pub struct Engine<D: DecisionSource> {
    world: World,
    source: D,
    rules: RulesConfig,
    perception: PerceptionBuilder,
    revival: RevivalTracker,
    addressed: BTreeMap<CharacterId, Vec<Utterance>>,
    last_tick: Option<Instant>,
}

impl<D: DecisionSource> Engine<D> {
    pub fn new(world: World, source: D, config: &OakvaleConfig) -> Self {
        Self {
            world,
            source,
            rules: config.rules.clone(),
            perception: PerceptionBuilder::new(config.perception.clone()),
            revival: RevivalTracker::new(),
            addressed: BTreeMap::new(),
            last_tick: None,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn source(&self) -> &D {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut D {
        &mut self.source
    }

    /// Publish the opening snapshots so NPCs can start thinking before
    /// the first player action
    pub async fn start(&mut self) -> Result<WorldSnapshot> {
        info!(
            "Starting engine with {} NPCs at {}",
            self.world.npc_ids().len(),
            self.world.formatted_time()
        );
        self.republish().await?;
        Ok(self.snapshot_since(self.world.turn()))
    }

    /// Current view without advancing anything
    pub fn snapshot(&self) -> WorldSnapshot {
        self.snapshot_since(self.world.turn())
    }

    pub async fn advance_turn(&mut self, action: PlayerAction) -> Result<WorldSnapshot> {
        let turn = self.world.turn();
        self.apply_player(&action).await?;

        let mut decisions = self.source.poll();
        decisions.sort_by(|a, b| a.character.cmp(&b.character));
        for response in &decisions {
            if let Err(e) = self.apply_decision(response) {
                info!(
                    "Discarded {} from {} (snapshot turn {}): {}",
                    response.decision.kind(),
                    response.character,
                    response.turn,
                    e
                );
            }
        }

        self.world.advance_clock();
        self.revival.step(&mut self.world, &self.rules)?;

        let cutoff = self.world.turn().saturating_sub(UTTERANCE_TURNS);
        self.addressed.retain(|_, heard| {
            heard.retain(|u| u.turn >= cutoff);
            !heard.is_empty()
        });

        self.republish().await?;
        debug!("Turn {} resolved, now {}", turn, self.world.formatted_time());
        Ok(self.snapshot_since(turn))
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down engine at turn {}", self.world.turn());
        self.source.shutdown().await
    }

    async fn republish(&mut self) -> Result<()> {
        let mut snapshots = Vec::new();
        for id in self.world.npc_ids() {
            let alive = self.world.character(&id).is_some_and(|c| c.is_alive());
            if !alive {
                continue;
            }
            let heard = self.addressed.get(&id).cloned().unwrap_or_default();
            snapshots.push(self.perception.build(&self.world, &id, heard)?);
        }
        self.source.publish(snapshots).await?;

        let now = Instant::now();
        let elapsed = self
            .last_tick
            .map(|t| now.duration_since(t))
            .unwrap_or(Duration::ZERO);
        self.last_tick = Some(now);
        let roster = Roster::from_world(&self.world);
        self.source.tick(elapsed, &roster).await
    }

    fn snapshot_since(&self, turn: u64) -> WorldSnapshot {
        WorldSnapshot {
            turn: self.world.turn(),
            time: self.world.formatted_time(),
            tiles: self.world.map.rows(),
            characters: self.world.characters().map(|c| c.sheet()).collect(),
            ground_items: self
                .world
                .ground_items()
                .map(|(pos, item)| GroundItem {
                    position: *pos,
                    name: item.name.clone(),
                })
                .collect(),
            events: self
                .world
                .timeline
                .since(turn)
                .into_iter()
                .map(|e| (*e).clone())
                .collect(),
            player_status: self.world.player().map(|p| p.status()),
        }
    }

    fn resolve(&self, actor: &CharacterId, target: &str) -> Result<CharacterId> {
        rules::resolve_character(&self.world, actor, target)
            .ok_or_else(|| OakvaleError::invalid(format!("nobody called '{}' is here", target)))
    }

    fn route_utterance(&mut self, from: &CharacterId, to: &CharacterId, text: &str) {
        let speaker = self
            .world
            .character(from)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| from.to_string());
        self.addressed.entry(to.clone()).or_default().push(Utterance {
            turn: self.world.turn(),
            from: from.clone(),
            speaker,
            text: text.to_string(),
        });
    }

    /// The addressed NPC answers the player within the same turn
    async fn answer(&mut self, player: &CharacterId, npc: &CharacterId, message: &str) -> Result<()> {
        let heard = self.addressed.get(npc).cloned().unwrap_or_default();
        let snapshot = self.perception.build(&self.world, npc, heard)?;
        let speaker = self.world.require(player)?.name.clone();
        let line = self.source.converse(snapshot, &speaker, message).await;
        rules::talk(&mut self.world, npc, player, &line)
    }

    async fn apply_player(&mut self, action: &PlayerAction) -> Result<()> {
        let player = self
            .world
            .player()
            .map(|p| (p.id.clone(), p.is_alive()))
            .ok_or_else(|| OakvaleError::UnknownCharacter(CharacterId::player()))?;
        let (id, alive) = player;
        if !alive && *action != PlayerAction::Wait {
            return Err(OakvaleError::invalid("you are in no state to act"));
        }

        match action {
            PlayerAction::Move { direction } => {
                rules::move_step(&mut self.world, &id, *direction)?;
            }
            PlayerAction::Attack { target } => {
                let target = self.resolve(&id, target)?;
                rules::attack(&mut self.world, &self.rules, &id, &target)?;
            }
            PlayerAction::Talk { target, message } => {
                let target = self.resolve(&id, target)?;
                rules::talk(&mut self.world, &id, &target, message)?;
                self.route_utterance(&id, &target, message);
                if let Err(e) = self.answer(&id, &target, message).await {
                    debug!("{} could not answer: {}", target, e);
                }
            }
            PlayerAction::Trade {
                target,
                item,
                price,
            } => {
                let target = self.resolve(&id, target)?;
                rules::trade(&mut self.world, &id, &target, item, *price)?;
            }
            PlayerAction::UseItem { item } => rules::use_item(&mut self.world, &id, item)?,
            PlayerAction::PickUp { item } => rules::pick_up(&mut self.world, &id, item)?,
            PlayerAction::Drop { item } => rules::drop_item(&mut self.world, &id, item)?,
            PlayerAction::Wait => {}
        }
        Ok(())
    }

    /// Validate and apply one NPC decision. Side effects from the response
    /// (emotion, goals, dialog) only land when the action itself is valid.
    fn apply_decision(&mut self, response: &DecisionResponse) -> Result<()> {
        let actor = &response.character;
        if actor.is_player() {
            return Err(OakvaleError::invalid("decisions cannot drive the player"));
        }
        let alive = self.world.require(actor)?.is_alive();
        if !alive {
            return Err(OakvaleError::invalid(format!("{} is not alive", actor)));
        }

        match &response.decision {
            Decision::Move {
                target: MoveTarget::Direction(direction),
            } => {
                rules::move_step(&mut self.world, actor, *direction)?;
            }
            Decision::Move {
                target: MoveTarget::Toward(place),
            } => {
                rules::move_toward(&mut self.world, actor, place)?;
            }
            Decision::Attack { target } => {
                let target = self.resolve(actor, target)?;
                rules::attack(&mut self.world, &self.rules, actor, &target)?;
            }
            Decision::Talk { target, line } => {
                let target = self.resolve(actor, target)?;
                rules::talk(&mut self.world, actor, &target, line)?;
                self.route_utterance(actor, &target, line);
            }
            Decision::Trade {
                target,
                item,
                price,
            } => {
                let target = self.resolve(actor, target)?;
                rules::trade(&mut self.world, actor, &target, item, *price)?;
            }
            Decision::UseItem { item } => rules::use_item(&mut self.world, actor, item)?,
            Decision::Wait { manner } => {
                if !response.is_fallback() {
                    rules::wait(&mut self.world, actor, manner)?;
                }
            }
        }

        if let Some(thoughts) = &response.thoughts {
            debug!("{} thinks: {}", actor, thoughts);
        }
        let spoke = matches!(response.decision, Decision::Talk { .. });
        if let Some(dialog) = response.dialog.as_deref().filter(|_| !spoke) {
            rules::say(&mut self.world, actor, dialog)?;
        }
        let character = self.world.require_mut(actor)?;
        if let Some(emotion) = &response.emotion {
            character.personality.emotion = Some(emotion.clone());
        }
        if let Some(goal) = &response.goal_update {
            character.apply_goal_update(goal);
        }
        if response.is_fallback() {
            debug!("{} idled this turn ({:?})", actor, response.fallback);
        }
        Ok(())
    }
}
