//! Per-NPC worker bookkeeping

use std::time::Duration;

use oakvale_core::character::CharacterId;
use oakvale_core::worker::{WorkerCommand, WorkerReply};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::runtime::WorkerChannels;

/// Lifecycle state of one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Receiving snapshots
    Active,
    /// Alive but paused; no LLM calls
    Suspended,
    /// Not running; may be respawned
    Terminated,
    /// Crashed too often; never respawned
    Demoted,
}

/// The one outstanding request of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    pub seq: u64,
    pub snapshot_turn: u64,
    /// Manager clock at dispatch
    pub sent_at: Duration,
}

pub struct WorkerHandle {
    pub id: CharacterId,
    pub state: WorkerState,
    /// Distinguishes respawns of the same NPC in logs
    pub instance: Option<Uuid>,
    pub crashes: u32,
    pub in_flight: Option<InFlight>,
    /// Turn of the last snapshot handed to the worker
    pub delivered_turn: Option<u64>,
    pub last_dispatch: Option<Duration>,
    /// Manager clock when the last accepted decision came back
    pub last_decision: Option<Duration>,
    pub(crate) channels: Option<WorkerChannels>,
    /// Replies read while waiting for a dialog answer, handed to the next poll
    pub(crate) backlog: Vec<WorkerReply>,
}

impl WorkerHandle {
    pub fn new(id: CharacterId) -> Self {
        Self {
            id,
            state: WorkerState::Terminated,
            instance: None,
            crashes: 0,
            in_flight: None,
            delivered_turn: None,
            last_dispatch: None,
            last_decision: None,
            channels: None,
            backlog: Vec::new(),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.channels.as_ref().and_then(|c| c.control.pid())
    }

    pub fn is_running(&self) -> bool {
        self.channels.is_some()
    }

    pub(crate) fn attach(&mut self, channels: WorkerChannels) {
        let instance = Uuid::new_v4();
        debug!("{} now runs as instance {}", self.id, instance);
        self.instance = Some(instance);
        self.channels = Some(channels);
        self.state = WorkerState::Active;
        self.in_flight = None;
        self.delivered_turn = None;
        self.last_dispatch = None;
        self.backlog.clear();
    }

    /// Count one failure; past `max_respawns` the worker is demoted for good
    pub(crate) fn record_failure(&mut self, max_respawns: u32) -> WorkerState {
        self.crashes += 1;
        self.state = if self.crashes > max_respawns {
            WorkerState::Demoted
        } else {
            WorkerState::Terminated
        };
        self.state
    }

    /// Non-blocking send. `false` when the mailbox is full or gone.
    pub(crate) fn send(&self, command: WorkerCommand) -> bool {
        let Some(channels) = &self.channels else {
            return false;
        };
        match channels.commands.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Mailbox of {} is full", self.id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Mailbox of {} is closed", self.id);
                false
            }
        }
    }

    /// True if the worker task/process is gone
    pub(crate) fn has_exited(&mut self) -> bool {
        match self.channels.as_mut() {
            Some(channels) => channels.control.is_finished() || channels.commands.is_closed(),
            None => false,
        }
    }

    /// Ask the worker to stop, wait up to `grace`, then kill it
    pub(crate) async fn stop(&mut self, grace: Duration) {
        let Some(mut channels) = self.channels.take() else {
            return;
        };
        let _ = channels.commands.try_send(WorkerCommand::Shutdown);
        if !channels.control.wait_exit(grace).await {
            warn!("Worker for {} ignored shutdown, killing", self.id);
        }
        channels.control.kill();
        self.in_flight = None;
        self.backlog.clear();
    }

    /// Kill immediately
    pub(crate) fn kill(&mut self) {
        if let Some(mut channels) = self.channels.take() {
            channels.control.kill();
        }
        self.in_flight = None;
        self.backlog.clear();
    }
}
