//! In-process runtime: one tokio task per NPC

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use oakvale_core::character::CharacterId;
use oakvale_core::config::{LLMProviderConfig, OakvaleConfig};
use oakvale_core::llm::{DecisionClient, LLMProvider};
use oakvale_core::request::DecisionRequestBuilder;
use oakvale_core::worker::NpcWorker;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::runtime::{WorkerChannels, WorkerControl, WorkerRuntime};
use crate::Result;

/// Spawns workers as tasks sharing one LLM provider
pub struct TaskRuntime {
    provider: Arc<dyn LLMProvider>,
    llm: LLMProviderConfig,
    max_prompt_chars: usize,
    mailbox_capacity: usize,
}

impl TaskRuntime {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &OakvaleConfig) -> Self {
        Self {
            provider,
            llm: config.llm.clone(),
            max_prompt_chars: config.perception.max_prompt_chars,
            mailbox_capacity: config.scheduler.mailbox_capacity.max(1),
        }
    }
}

#[async_trait]
impl WorkerRuntime for TaskRuntime {
    async fn spawn(&self, id: &CharacterId) -> Result<WorkerChannels> {
        let (command_tx, command_rx) = mpsc::channel(self.mailbox_capacity);
        let (reply_tx, reply_rx) = mpsc::channel(self.mailbox_capacity);

        let client = DecisionClient::new(self.provider.clone(), &self.llm);
        let worker = NpcWorker::new(
            id.clone(),
            client,
            DecisionRequestBuilder::new(self.max_prompt_chars),
        );
        let handle = tokio::spawn(worker.run(command_rx, reply_tx));
        debug!("Spawned worker task for {}", id);

        Ok(WorkerChannels {
            commands: command_tx,
            replies: reply_rx,
            control: Box::new(TaskControl { handle }),
        })
    }

    fn name(&self) -> &'static str {
        "task"
    }
}

struct TaskControl {
    handle: JoinHandle<()>,
}

#[async_trait]
impl WorkerControl for TaskControl {
    fn pid(&self) -> Option<u32> {
        None
    }

    fn is_finished(&mut self) -> bool {
        self.handle.is_finished()
    }

    async fn wait_exit(&mut self, grace: Duration) -> bool {
        tokio::time::timeout(grace, &mut self.handle).await.is_ok()
    }

    fn kill(&mut self) {
        self.handle.abort();
    }
}
