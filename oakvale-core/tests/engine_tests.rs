//! Turn engine behaviour against a stub decision source

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use oakvale_core::decision::{FALLBACK_DIALOG, MoveTarget};
use oakvale_core::engine::{DecisionSource, Engine, PlayerAction, Roster, WorldSnapshot};
use oakvale_core::memory::EventKind;
use oakvale_core::prelude::*;
use oakvale_core::world::{Location, WorldMap, demo};
use tokio_test::{assert_err, assert_ok};

/// Hands out one pre-scripted batch of decisions per poll
#[derive(Default)]
struct StubSource {
    batches: VecDeque<Vec<DecisionResponse>>,
    published: Vec<Vec<PerceptionSnapshot>>,
    ticks: Vec<(Duration, Roster)>,
    shut_down: bool,
    answers: VecDeque<String>,
    /// (npc, speaker, message) per dialog request
    asked: Vec<(CharacterId, String, String)>,
}

impl StubSource {
    fn with_batches(batches: Vec<Vec<DecisionResponse>>) -> Self {
        Self {
            batches: batches.into(),
            ..Self::default()
        }
    }

    fn last_snapshot_for(&self, id: &str) -> Option<&PerceptionSnapshot> {
        self.published
            .last()?
            .iter()
            .find(|s| s.character_id().as_str() == id)
    }
}

#[async_trait]
impl DecisionSource for StubSource {
    async fn publish(&mut self, snapshots: Vec<PerceptionSnapshot>) -> Result<()> {
        self.published.push(snapshots);
        Ok(())
    }

    async fn tick(&mut self, elapsed: Duration, roster: &Roster) -> Result<()> {
        self.ticks.push((elapsed, roster.clone()));
        Ok(())
    }

    fn poll(&mut self) -> Vec<DecisionResponse> {
        self.batches.pop_front().unwrap_or_default()
    }

    async fn converse(&mut self, snapshot: PerceptionSnapshot, speaker: &str, message: &str) -> String {
        self.asked.push((
            snapshot.character_id().clone(),
            speaker.to_string(),
            message.to_string(),
        ));
        self.answers
            .pop_front()
            .unwrap_or_else(|| FALLBACK_DIALOG.to_string())
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.shut_down = true;
        Ok(())
    }
}

fn decide(id: &str, decision: Decision) -> DecisionResponse {
    DecisionResponse {
        character: id.into(),
        turn: 0,
        decision,
        dialog: None,
        thoughts: None,
        emotion: None,
        goal_update: None,
        fallback: None,
    }
}

fn step(direction: Direction) -> Decision {
    Decision::Move {
        target: MoveTarget::Direction(direction),
    }
}

fn village_engine(batches: Vec<Vec<DecisionResponse>>) -> Engine<StubSource> {
    let config = OakvaleConfig::default();
    let world = demo::oakvale_village(&config).unwrap();
    Engine::new(world, StubSource::with_batches(batches), &config)
}

fn script() -> Vec<Vec<DecisionResponse>> {
    vec![
        // Both want (14, 8); listed in arrival order, not id order
        vec![
            decide("tavernkeeper_01", step(Direction::East)),
            decide("minstrel_01", step(Direction::West)),
        ],
        vec![
            decide("troll_brigand_01", Decision::Attack {
                target: "Karim".into(),
            }),
            decide("guard_01", step(Direction::East)),
        ],
        vec![decide("blacksmith_01", Decision::Talk {
            target: "the stranger".into(),
            line: "Need a blade?".into(),
        })],
    ]
}

async fn play(actions: &[PlayerAction]) -> Vec<WorldSnapshot> {
    let mut engine = village_engine(script());
    let mut snapshots = vec![engine.start().await.unwrap()];
    for action in actions {
        snapshots.push(engine.advance_turn(action.clone()).await.unwrap());
    }
    snapshots
}

#[tokio::test]
async fn test_identical_inputs_give_identical_snapshots() {
    let actions = vec![
        PlayerAction::Move {
            direction: Direction::South,
        },
        PlayerAction::Move {
            direction: Direction::South,
        },
        PlayerAction::Wait,
        PlayerAction::UseItem {
            item: "potion".into(),
        },
    ];

    let first = play(&actions).await;
    let second = play(&actions).await;
    assert_eq!(first, second);
    assert_eq!(first.last().unwrap().turn, 4);
}

#[tokio::test]
async fn test_decisions_apply_in_id_order() {
    let mut engine = village_engine(script());
    engine.start().await.unwrap();
    engine.advance_turn(PlayerAction::Wait).await.unwrap();

    let world = engine.world();
    assert_eq!(
        world.character(&"minstrel_01".into()).unwrap().position,
        Position::new(14, 8)
    );
    // Lost the race for the tile, discarded without side effects
    assert_eq!(
        world.character(&"tavernkeeper_01".into()).unwrap().position,
        Position::new(13, 8)
    );
}

#[tokio::test]
async fn test_out_of_range_decisions_are_discarded() {
    let mut engine = village_engine(script());
    engine.start().await.unwrap();
    engine.advance_turn(PlayerAction::Wait).await.unwrap();
    let snapshot = engine.advance_turn(PlayerAction::Wait).await.unwrap();

    // The brigand is nowhere near the guard
    assert!(snapshot.events.iter().all(|e| e.kind != EventKind::Attack));
    let karim = snapshot.character(&"guard_01".into()).unwrap();
    assert_eq!(karim.hp, karim.max_hp);
    assert_eq!(karim.position, Position::new(11, 7));
    assert_eq!(snapshot.turn, 2);
}

#[tokio::test]
async fn test_invalid_player_action_does_not_advance() {
    let mut engine = village_engine(Vec::new());
    engine.start().await.unwrap();

    assert_err!(
        engine
            .advance_turn(PlayerAction::Attack {
                target: "nobody at all".into(),
            })
            .await
    );
    assert_err!(
        engine
            .advance_turn(PlayerAction::Drop {
                item: "dragon egg".into(),
            })
            .await
    );
    assert_eq!(engine.world().turn(), 0);
    assert_eq!(engine.source().published.len(), 1);

    assert_ok!(engine.advance_turn(PlayerAction::Wait).await);
    assert_eq!(engine.world().turn(), 1);
}

#[tokio::test]
async fn test_player_speech_reaches_addressee() {
    let mut engine = village_engine(Vec::new());
    engine.start().await.unwrap();
    for _ in 0..2 {
        engine
            .advance_turn(PlayerAction::Move {
                direction: Direction::South,
            })
            .await
            .unwrap();
    }
    engine
        .advance_turn(PlayerAction::Talk {
            target: "Melody".into(),
            message: "Play me a song".into(),
        })
        .await
        .unwrap();

    let source = engine.source();
    let melody = source.last_snapshot_for("minstrel_01").unwrap();
    assert_eq!(melody.addressed.len(), 1);
    assert_eq!(melody.addressed[0].text, "Play me a song");
    let goren = source.last_snapshot_for("tavernkeeper_01").unwrap();
    assert!(goren.addressed.is_empty());
}

#[tokio::test]
async fn test_side_effects_follow_valid_actions_only() {
    let mut valid = decide("blacksmith_01", Decision::wait("by the anvil"));
    valid.emotion = Some("content".into());
    valid.goal_update = Some("Sell a sword today".into());
    let mut invalid = decide("guard_01", Decision::Attack {
        target: "Gorkash".into(),
    });
    invalid.emotion = Some("furious".into());

    let mut engine = village_engine(vec![vec![valid, invalid]]);
    engine.start().await.unwrap();
    let snapshot = engine.advance_turn(PlayerAction::Wait).await.unwrap();

    let world = engine.world();
    let durgan = world.character(&"blacksmith_01".into()).unwrap();
    assert_eq!(durgan.personality.emotion.as_deref(), Some("content"));
    assert!(durgan.goals.iter().any(|g| g == "Sell a sword today"));
    let karim = world.character(&"guard_01".into()).unwrap();
    assert_ne!(karim.personality.emotion.as_deref(), Some("furious"));
    assert!(snapshot.events.iter().any(|e| e.summary.contains("by the anvil")));
}

#[tokio::test]
async fn test_fallback_wait_is_silent() {
    let fallback = DecisionResponse::fallback("guard_01".into(), 0, FallbackReason::Timeout);
    let mut engine = village_engine(vec![vec![fallback]]);
    engine.start().await.unwrap();
    let snapshot = engine.advance_turn(PlayerAction::Wait).await.unwrap();
    assert!(
        snapshot
            .events
            .iter()
            .all(|e| e.actor.as_str() != "guard_01")
    );
}

/// 10x10 field with a shrine at (5, 5), the player at (4, 4) and a frail rat at (4, 5)
fn shrine_world(config: &OakvaleConfig) -> World {
    let mut world = World::new(WorldMap::new(10, 10), config);
    world.add_location(Location::new("Shrine", "A mossy altar", 5, 5, 1, 1).with_shrine());
    world
        .add_character(
            Character::new(
                CharacterId::player(),
                "Hero",
                oakvale_core::character::CharacterClass::Warrior,
                oakvale_core::character::CharacterRace::Human,
                1,
            )
            .with_stats(Stats::average())
            .with_position(Position::new(4, 4)),
        )
        .unwrap();
    world
        .add_character(
            Character::new(
                "rat_01",
                "Rat",
                oakvale_core::character::CharacterClass::Monster,
                oakvale_core::character::CharacterRace::Goblin,
                1,
            )
            .with_stats(Stats::average())
            .with_max_hp(2)
            .with_position(Position::new(4, 5)),
        )
        .unwrap();
    world
}

#[tokio::test]
async fn test_defeat_and_shrine_revival() {
    let config = OakvaleConfig::default();
    let world = shrine_world(&config);

    let mut engine = Engine::new(world, StubSource::default(), &config);
    engine.start().await.unwrap();
    let rat = CharacterId::from("rat_01");

    let snapshot = engine
        .advance_turn(PlayerAction::Attack {
            target: "rat".into(),
        })
        .await
        .unwrap();
    assert_eq!(
        snapshot.character(&rat).unwrap().status,
        LifeStatus::Defeated
    );
    assert!(snapshot.ground_items.iter().any(|i| i.name == "body of Rat"));
    // Defeated NPCs get no perception
    assert!(engine.source().last_snapshot_for("rat_01").is_none());

    let mut last = snapshot;
    for _ in 1..config.rules.revival_turns {
        last = engine.advance_turn(PlayerAction::Wait).await.unwrap();
    }
    let sheet = last.character(&rat).unwrap();
    assert_eq!(sheet.status, LifeStatus::Alive);
    assert_eq!(sheet.hp, 1);
    assert!(last.events.iter().any(|e| e.kind == EventKind::Revival));
    assert!(last.ground_items.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_tick_reports_elapsed_time_and_roster() {
    let mut engine = village_engine(Vec::new());
    engine.start().await.unwrap();
    tokio::time::advance(Duration::from_millis(750)).await;
    engine.advance_turn(PlayerAction::Wait).await.unwrap();
    engine.shutdown().await.unwrap();

    let source = engine.source();
    assert_eq!(source.ticks[0].0, Duration::ZERO);
    assert_eq!(source.ticks[1].0, Duration::from_millis(750));
    let roster = &source.ticks[1].1;
    assert_eq!(roster.player, Some(Position::new(15, 5)));
    assert_eq!(roster.npcs.len(), 5);
    assert!(source.shut_down);
}

#[tokio::test]
async fn test_carrying_a_body_away_from_the_shrine_resets_revival() {
    let config = OakvaleConfig::default();
    assert_eq!(config.rules.revival_turns, 3);
    let mut engine = Engine::new(shrine_world(&config), StubSource::default(), &config);
    engine.start().await.unwrap();
    let rat = CharacterId::from("rat_01");

    engine
        .advance_turn(PlayerAction::Attack {
            target: "rat".into(),
        })
        .await
        .unwrap();
    engine
        .advance_turn(PlayerAction::PickUp {
            item: "body of Rat".into(),
        })
        .await
        .unwrap();
    // Two turns near the shrine so far; one more would revive the rat
    let away = engine
        .advance_turn(PlayerAction::Move {
            direction: Direction::North,
        })
        .await
        .unwrap();
    assert_eq!(away.character(&rat).unwrap().status, LifeStatus::Defeated);

    let mut last = away;
    for _ in 0..2 * config.rules.revival_turns {
        last = engine.advance_turn(PlayerAction::Wait).await.unwrap();
    }
    assert_eq!(last.character(&rat).unwrap().status, LifeStatus::Defeated);
    assert!(
        last.character(&CharacterId::player())
            .unwrap()
            .inventory
            .iter()
            .any(|i| i == "body of Rat")
    );

    // Back within range the count starts over from zero
    engine
        .advance_turn(PlayerAction::Move {
            direction: Direction::South,
        })
        .await
        .unwrap();
    let not_yet = engine.advance_turn(PlayerAction::Wait).await.unwrap();
    assert_eq!(not_yet.character(&rat).unwrap().status, LifeStatus::Defeated);
    let revived = engine.advance_turn(PlayerAction::Wait).await.unwrap();
    assert_eq!(revived.character(&rat).unwrap().status, LifeStatus::Alive);
}

#[tokio::test]
async fn test_player_gets_an_answer_in_the_same_turn() {
    let mut engine = village_engine(Vec::new());
    engine
        .source_mut()
        .answers
        .push_back("Gladly, friend.".into());
    engine.start().await.unwrap();
    for _ in 0..2 {
        engine
            .advance_turn(PlayerAction::Move {
                direction: Direction::South,
            })
            .await
            .unwrap();
    }

    let snapshot = engine
        .advance_turn(PlayerAction::Talk {
            target: "Melody".into(),
            message: "Play me a song".into(),
        })
        .await
        .unwrap();
    assert_eq!(
        engine.source().asked,
        vec![(
            CharacterId::from("minstrel_01"),
            "Player".to_string(),
            "Play me a song".to_string()
        )]
    );
    let answer = snapshot
        .events
        .iter()
        .find(|e| e.actor.as_str() == "minstrel_01" && e.kind == EventKind::Dialog)
        .unwrap();
    assert!(answer.summary.contains("Gladly, friend."));
    assert_eq!(answer.target, Some(CharacterId::player()));

    // No answer ready: the canned line stands in
    let snapshot = engine
        .advance_turn(PlayerAction::Talk {
            target: "Melody".into(),
            message: "Another?".into(),
        })
        .await
        .unwrap();
    assert!(
        snapshot
            .events
            .iter()
            .any(|e| e.actor.as_str() == "minstrel_01" && e.summary.contains(FALLBACK_DIALOG))
    );
}
