//! NPC worker: the per-character request/decide loop
//!
//! A worker owns a request builder and a decision client and talks to its
//! supervisor only through messages. It never touches world state.

mod stdio;

pub use stdio::{decode_line, encode_line, run_stdio};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::character::CharacterId;
use crate::decision::{DecisionResponse, FALLBACK_DIALOG, FallbackReason};
use crate::llm::DecisionClient;
use crate::perception::PerceptionSnapshot;
use crate::request::DecisionRequestBuilder;

/// Supervisor to worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WorkerCommand {
    /// Decide on a fresh snapshot; the reply echoes `seq`
    Perceive {
        seq: u64,
        snapshot: Box<PerceptionSnapshot>,
    },
    /// Answer `speaker` out loud; the reply echoes `seq`
    Dialog {
        seq: u64,
        snapshot: Box<PerceptionSnapshot>,
        speaker: String,
        message: String,
    },
    Suspend,
    Resume,
    /// Sentinel: finish and exit
    Shutdown,
}

/// Worker to supervisor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum WorkerReply {
    Decision { seq: u64, response: DecisionResponse },
    Dialog { seq: u64, line: String },
}

impl WorkerReply {
    pub fn seq(&self) -> u64 {
        match self {
            WorkerReply::Decision { seq, .. } | WorkerReply::Dialog { seq, .. } => *seq,
        }
    }
}

/// What the loop does after handling one command
#[derive(Debug)]
pub enum WorkerStep {
    Reply(WorkerReply),
    Continue,
    Stop,
}

pub struct NpcWorker {
    character: CharacterId,
    client: DecisionClient,
    builder: DecisionRequestBuilder,
    paused: bool,
}

impl NpcWorker {
    pub fn new(character: CharacterId, client: DecisionClient, builder: DecisionRequestBuilder) -> Self {
        Self {
            character,
            client,
            builder,
            paused: false,
        }
    }

    pub fn character(&self) -> &CharacterId {
        &self.character
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Decide on a snapshot. LLM failures become a fallback wait.
    pub async fn decide(&self, snapshot: &PerceptionSnapshot) -> DecisionResponse {
        let request = self.builder.build(snapshot);
        match self.client.query(&request).await {
            Ok(response) => {
                debug!("{} decided: {}", self.character, response.decision);
                response
            }
            Err(e) => {
                warn!("{} falls back to waiting: {}", self.character, e);
                DecisionResponse::fallback(
                    self.character.clone(),
                    snapshot.turn,
                    FallbackReason::from(&e),
                )
            }
        }
    }

    /// Answer a speaker. Any LLM failure becomes [`FALLBACK_DIALOG`].
    pub async fn converse(&self, snapshot: &PerceptionSnapshot, speaker: &str, message: &str) -> String {
        let request = self.builder.build_dialog(snapshot, speaker, message);
        match self.client.reply(&request).await {
            Ok(line) => {
                debug!("{} answers {}: {}", self.character, speaker, line);
                line
            }
            Err(e) => {
                warn!("{} has no answer for {}: {}", self.character, speaker, e);
                FALLBACK_DIALOG.to_string()
            }
        }
    }

    fn accepts(&self, seq: u64, snapshot: &PerceptionSnapshot) -> bool {
        if self.paused {
            debug!("{} is suspended, ignoring request {}", self.character, seq);
            return false;
        }
        if snapshot.character_id() != &self.character {
            warn!(
                "{} received a snapshot for {}, ignoring",
                self.character,
                snapshot.character_id()
            );
            return false;
        }
        true
    }

    pub async fn handle(&mut self, command: WorkerCommand) -> WorkerStep {
        match command {
            WorkerCommand::Perceive { seq, snapshot } => {
                if !self.accepts(seq, &snapshot) {
                    return WorkerStep::Continue;
                }
                let response = self.decide(&snapshot).await;
                WorkerStep::Reply(WorkerReply::Decision { seq, response })
            }
            WorkerCommand::Dialog {
                seq,
                snapshot,
                speaker,
                message,
            } => {
                if !self.accepts(seq, &snapshot) {
                    return WorkerStep::Continue;
                }
                let line = self.converse(&snapshot, &speaker, &message).await;
                WorkerStep::Reply(WorkerReply::Dialog { seq, line })
            }
            WorkerCommand::Suspend => {
                self.paused = true;
                WorkerStep::Continue
            }
            WorkerCommand::Resume => {
                self.paused = false;
                WorkerStep::Continue
            }
            WorkerCommand::Shutdown => WorkerStep::Stop,
        }
    }

    /// Run until shutdown or until either channel closes
    pub async fn run(
        mut self,
        mut inbox: mpsc::Receiver<WorkerCommand>,
        outbox: mpsc::Sender<WorkerReply>,
    ) {
        info!("Worker for {} started", self.character);
        while let Some(command) = inbox.recv().await {
            match self.handle(command).await {
                WorkerStep::Reply(reply) => {
                    if outbox.send(reply).await.is_err() {
                        debug!("Reply channel for {} closed", self.character);
                        break;
                    }
                }
                WorkerStep::Continue => {}
                WorkerStep::Stop => break,
            }
        }
        info!("Worker for {} stopped", self.character);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{Character, CharacterClass, CharacterRace};
    use crate::config::{LLMProviderConfig, OakvaleConfig, PerceptionConfig};
    use crate::decision::Decision;
    use crate::llm::ScriptedProvider;
    use crate::perception::PerceptionBuilder;
    use crate::world::{Position, World, WorldMap};
    use std::sync::Arc;

    fn snapshot(id: &str) -> Box<PerceptionSnapshot> {
        let mut world = World::new(WorldMap::new(5, 5), &OakvaleConfig::default());
        world
            .add_character(
                Character::new(id, "Bran", CharacterClass::Guard, CharacterRace::Human, 1)
                    .with_position(Position::new(2, 2)),
            )
            .unwrap();
        Box::new(
            PerceptionBuilder::new(PerceptionConfig::default())
                .build(&world, &id.into(), Vec::new())
                .unwrap(),
        )
    }

    fn worker(provider: ScriptedProvider) -> NpcWorker {
        let client = DecisionClient::new(Arc::new(provider), &LLMProviderConfig::default());
        NpcWorker::new("npc".into(), client, DecisionRequestBuilder::new(6000))
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_reply_per_snapshot() {
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let (reply_tx, mut reply_rx) = mpsc::channel(4);
        let handle = tokio::spawn(
            worker(ScriptedProvider::replies(["ACTION: wait\nTARGET: quietly"])).run(cmd_rx, reply_tx),
        );

        cmd_tx
            .send(WorkerCommand::Perceive {
                seq: 7,
                snapshot: snapshot("npc"),
            })
            .await
            .unwrap();
        let reply = reply_rx.recv().await.unwrap();
        assert_eq!(reply.seq(), 7);
        let WorkerReply::Decision { response, .. } = reply else {
            panic!("expected a decision");
        };
        assert_eq!(response.decision, Decision::wait("quietly"));

        cmd_tx.send(WorkerCommand::Shutdown).await.unwrap();
        handle.await.unwrap();
        assert!(reply_rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_output_becomes_wait() {
        let mut worker = worker(ScriptedProvider::replies(["gibberish"]));
        let step = worker
            .handle(WorkerCommand::Perceive {
                seq: 1,
                snapshot: snapshot("npc"),
            })
            .await;
        let WorkerStep::Reply(WorkerReply::Decision { response, .. }) = step else {
            panic!("expected a decision");
        };
        assert_eq!(response.fallback, Some(FallbackReason::MalformedOutput));
        assert!(matches!(response.decision, Decision::Wait { .. }));
    }

    #[tokio::test]
    async fn test_suspended_worker_ignores_snapshots() {
        let provider = ScriptedProvider::replies(["ACTION: wait"]);
        let calls = provider.call_counter();
        let mut worker = worker(provider);

        assert!(matches!(worker.handle(WorkerCommand::Suspend).await, WorkerStep::Continue));
        let step = worker
            .handle(WorkerCommand::Perceive {
                seq: 1,
                snapshot: snapshot("npc"),
            })
            .await;
        assert!(matches!(step, WorkerStep::Continue));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);

        worker.handle(WorkerCommand::Resume).await;
        assert!(!worker.is_paused());
    }

    #[tokio::test]
    async fn test_foreign_snapshot_ignored() {
        let mut worker = worker(ScriptedProvider::replies(["ACTION: wait"]));
        let step = worker
            .handle(WorkerCommand::Perceive {
                seq: 1,
                snapshot: snapshot("someone_else"),
            })
            .await;
        assert!(matches!(step, WorkerStep::Continue));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dialog_answers_or_falls_back() {
        let mut worker = worker(ScriptedProvider::new(vec![
            crate::llm::scripted::ScriptStep::Reply("\"The mill? North of here.\"".into()),
            crate::llm::scripted::ScriptStep::Fail(crate::llm::QueryError::MalformedOutput("x".into())),
        ]));
        let ask = |seq| WorkerCommand::Dialog {
            seq,
            snapshot: snapshot("npc"),
            speaker: "Player".into(),
            message: "Where is the mill?".into(),
        };

        let WorkerStep::Reply(reply) = worker.handle(ask(4)).await else {
            panic!("expected a reply");
        };
        assert_eq!(
            reply,
            WorkerReply::Dialog {
                seq: 4,
                line: "The mill? North of here.".into()
            }
        );

        let WorkerStep::Reply(WorkerReply::Dialog { line, .. }) = worker.handle(ask(5)).await else {
            panic!("expected a dialog reply");
        };
        assert_eq!(line, FALLBACK_DIALOG);

        worker.handle(WorkerCommand::Suspend).await;
        assert!(matches!(worker.handle(ask(6)).await, WorkerStep::Continue));
    }
}
