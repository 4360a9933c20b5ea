//! NPC process manager
//!
//! Owns every worker handle, decides who runs, throttles dispatch and turns
//! crashes and hangs into fallback waits. It is driven entirely by the
//! engine through [`DecisionSource`]: `publish` hands over fresh
//! snapshots, `tick` runs one scheduling pass and `poll` drains replies.
//!
//! The manager clock is the sum of `tick` elapsed values, so every decision
//! timeout here is measured in engine time rather than wall-clock time.
//! Player dialog is the exception: the engine waits on it, so its bound is
//! wall-clock.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use oakvale_core::character::{CharacterId, LifeStatus};
use oakvale_core::config::SchedulerConfig;
use oakvale_core::decision::{DecisionResponse, FALLBACK_DIALOG, FallbackReason};
use oakvale_core::engine::{DecisionSource, Roster};
use oakvale_core::perception::PerceptionSnapshot;
use oakvale_core::worker::{WorkerCommand, WorkerReply};
use tracing::{debug, info, warn};

use crate::handle::{InFlight, WorkerHandle, WorkerState};
use crate::lifecycle::{ActivationPolicy, ReconciliationReport};
use crate::runtime::WorkerRuntime;
use crate::{Result, SupervisorError};

/// How an `activate` call was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Started,
    Resumed,
    AlreadyActive,
}

pub struct NpcProcessManager {
    runtime: Arc<dyn WorkerRuntime>,
    config: SchedulerConfig,
    policy: ActivationPolicy,
    workers: BTreeMap<CharacterId, WorkerHandle>,
    latest: BTreeMap<CharacterId, PerceptionSnapshot>,
    fallbacks: Vec<DecisionResponse>,
    clock: Duration,
    next_seq: u64,
    last_report: ReconciliationReport,
}

impl NpcProcessManager {
    pub fn new(runtime: Arc<dyn WorkerRuntime>, config: SchedulerConfig) -> Self {
        info!(
            "NPC manager using {} runtime (max {} active, radius {})",
            runtime.name(),
            config.max_active_workers,
            config.activation_radius
        );
        Self {
            runtime,
            policy: ActivationPolicy::from_config(&config),
            config,
            workers: BTreeMap::new(),
            latest: BTreeMap::new(),
            fallbacks: Vec::new(),
            clock: Duration::ZERO,
            next_seq: 0,
            last_report: ReconciliationReport::default(),
        }
    }

    /// Manager clock: total elapsed time passed to `tick`
    pub fn clock(&self) -> Duration {
        self.clock
    }

    pub fn state(&self, id: &CharacterId) -> Option<WorkerState> {
        self.workers.get(id).map(|w| w.state)
    }

    pub fn worker(&self, id: &CharacterId) -> Option<&WorkerHandle> {
        self.workers.get(id)
    }

    pub fn active_count(&self) -> usize {
        self.workers
            .values()
            .filter(|w| w.state == WorkerState::Active)
            .count()
    }

    pub fn active_ids(&self) -> Vec<CharacterId> {
        self.workers
            .values()
            .filter(|w| w.state == WorkerState::Active)
            .map(|w| w.id.clone())
            .collect()
    }

    /// Outcome of the most recent activation pass
    pub fn last_report(&self) -> &ReconciliationReport {
        &self.last_report
    }

    /// Make a worker active, spawning or resuming it as needed
    pub async fn activate(&mut self, id: &CharacterId) -> Result<Activation> {
        let handle = self
            .workers
            .entry(id.clone())
            .or_insert_with(|| WorkerHandle::new(id.clone()));
        match handle.state {
            WorkerState::Active => return Ok(Activation::AlreadyActive),
            WorkerState::Demoted => return Err(SupervisorError::Demoted(id.clone())),
            WorkerState::Suspended | WorkerState::Terminated => {}
        }

        if self.active_count() >= self.config.max_active_workers {
            return Err(SupervisorError::CapacityExceeded {
                max: self.config.max_active_workers,
            });
        }

        let handle = self
            .workers
            .get_mut(id)
            .ok_or_else(|| SupervisorError::UnknownWorker(id.clone()))?;
        if handle.state == WorkerState::Suspended && handle.is_running() && handle.send(WorkerCommand::Resume) {
            handle.state = WorkerState::Active;
            debug!("Resumed worker for {}", id);
            return Ok(Activation::Resumed);
        }

        // Suspended with a dead mailbox, or never started / crashed
        handle.kill();
        let spawned = self.runtime.spawn(id).await;
        let handle = self
            .workers
            .get_mut(id)
            .ok_or_else(|| SupervisorError::UnknownWorker(id.clone()))?;
        let channels = match spawned {
            Ok(channels) => channels,
            Err(e) => {
                if handle.record_failure(self.config.max_respawns) == WorkerState::Demoted {
                    warn!(
                        "Worker for {} failed to start {} times, permanently suspending it",
                        id, handle.crashes
                    );
                }
                return Err(e);
            }
        };
        handle.attach(channels);
        info!("Started worker for {} (pid: {:?})", id, handle.pid());
        Ok(Activation::Started)
    }

    /// Pause a worker. Its in-flight decision, if any, will be dropped.
    pub fn suspend(&mut self, id: &CharacterId) -> Result<bool> {
        let handle = self
            .workers
            .get_mut(id)
            .ok_or_else(|| SupervisorError::UnknownWorker(id.clone()))?;
        if handle.state != WorkerState::Active {
            return Ok(false);
        }
        handle.send(WorkerCommand::Suspend);
        handle.state = WorkerState::Suspended;
        handle.in_flight = None;
        debug!("Suspended worker for {}", id);
        Ok(true)
    }

    /// Shut a worker down: sentinel, grace period, then hard kill
    pub async fn terminate(&mut self, id: &CharacterId) -> Result<()> {
        let grace = self.config.shutdown_grace;
        let handle = self
            .workers
            .get_mut(id)
            .ok_or_else(|| SupervisorError::UnknownWorker(id.clone()))?;
        handle.stop(grace).await;
        if handle.state != WorkerState::Demoted {
            handle.state = WorkerState::Terminated;
        }
        info!("Terminated worker for {}", id);
        Ok(())
    }

    /// Ask an active worker to answer `speaker` and wait up to
    /// `dialog_timeout` for the line. Decision replies read meanwhile are
    /// kept for the next `poll`.
    pub async fn dialog(&mut self, snapshot: PerceptionSnapshot, speaker: &str, message: &str) -> Result<String> {
        let id = snapshot.character_id().clone();
        let bound = self.config.dialog_timeout;
        let seq = self.next_seq;
        let handle = self
            .workers
            .get_mut(&id)
            .ok_or_else(|| SupervisorError::UnknownWorker(id.clone()))?;
        if handle.state != WorkerState::Active {
            return Err(SupervisorError::NotActive(id));
        }
        let command = WorkerCommand::Dialog {
            seq,
            snapshot: Box::new(snapshot),
            speaker: speaker.to_string(),
            message: message.to_string(),
        };
        if !handle.send(command) {
            return Err(SupervisorError::NotActive(id));
        }
        self.next_seq += 1;

        let WorkerHandle {
            channels, backlog, ..
        } = handle;
        let Some(channels) = channels.as_mut() else {
            return Err(SupervisorError::NotActive(id));
        };
        let answer = async {
            while let Some(reply) = channels.replies.recv().await {
                match reply {
                    WorkerReply::Dialog { seq: got, line } if got == seq => return Some(line),
                    WorkerReply::Dialog { seq: got, .. } => {
                        debug!("Dropping late dialog reply {} from {}", got, id);
                    }
                    decision => backlog.push(decision),
                }
            }
            None
        };
        let outcome = tokio::time::timeout(bound, answer).await;
        match outcome {
            Ok(Some(line)) => Ok(line),
            Ok(None) => Err(SupervisorError::NotActive(id)),
            Err(_) => Err(SupervisorError::DialogTimeout { id, after: bound }),
        }
    }

    /// Bring the worker set in line with the activation policy
    async fn reconcile(&mut self, roster: &Roster) -> ReconciliationReport {
        let mut report = ReconciliationReport::default();
        let desired = self.policy.desired(roster);

        for npc in &roster.npcs {
            let Some(handle) = self.workers.get(&npc.id) else {
                continue;
            };
            if npc.status == LifeStatus::Dead {
                if handle.is_running() && self.terminate(&npc.id).await.is_ok() {
                    report.terminated.push(npc.id.clone());
                }
            } else if !desired.contains(&npc.id) && matches!(self.suspend(&npc.id), Ok(true)) {
                report.suspended.push(npc.id.clone());
            }
        }

        for id in &desired {
            match self.activate(id).await {
                Ok(Activation::Started) => report.started.push(id.clone()),
                Ok(Activation::Resumed) => report.resumed.push(id.clone()),
                Ok(Activation::AlreadyActive) => {}
                Err(SupervisorError::Demoted(_)) => {}
                Err(e) => warn!("Could not activate worker for {}: {}", id, e),
            }
        }

        if !report.is_empty() {
            info!(
                "Reconciliation: started={:?}, resumed={:?}, suspended={:?}, terminated={:?}",
                report.started, report.resumed, report.suspended, report.terminated
            );
        }
        report
    }

    /// Send the newest snapshot to every idle active worker whose interval has passed
    fn dispatch(&mut self) {
        for handle in self.workers.values_mut() {
            if handle.state != WorkerState::Active || handle.in_flight.is_some() {
                continue;
            }
            let Some(snapshot) = self.latest.get(&handle.id) else {
                continue;
            };
            if handle.delivered_turn.is_some_and(|t| t >= snapshot.turn) {
                continue;
            }
            if handle
                .last_dispatch
                .is_some_and(|at| self.clock.saturating_sub(at) < self.config.action_interval)
            {
                continue;
            }

            let seq = self.next_seq;
            let command = WorkerCommand::Perceive {
                seq,
                snapshot: Box::new(snapshot.clone()),
            };
            if handle.send(command) {
                self.next_seq += 1;
                handle.in_flight = Some(InFlight {
                    seq,
                    snapshot_turn: snapshot.turn,
                    sent_at: self.clock,
                });
                handle.delivered_turn = Some(snapshot.turn);
                handle.last_dispatch = Some(self.clock);
                debug!("Dispatched snapshot for turn {} to {} (seq {})", snapshot.turn, handle.id, seq);
            }
        }
    }

    /// Kill crashed and hung workers, queueing a fallback wait for each
    fn reap(&mut self) {
        let mut failed = Vec::new();
        for handle in self.workers.values_mut() {
            if handle.state != WorkerState::Active {
                continue;
            }
            if handle.has_exited() {
                failed.push((handle.id.clone(), FallbackReason::WorkerCrashed));
            } else if handle
                .in_flight
                .is_some_and(|f| self.clock.saturating_sub(f.sent_at) >= self.config.worker_timeout)
            {
                failed.push((handle.id.clone(), FallbackReason::Timeout));
            }
        }

        for (id, reason) in failed {
            let Some(handle) = self.workers.get_mut(&id) else {
                continue;
            };
            let turn = handle
                .in_flight
                .map(|f| f.snapshot_turn)
                .or(handle.delivered_turn)
                .unwrap_or(0);
            handle.kill();
            if handle.record_failure(self.config.max_respawns) == WorkerState::Demoted {
                warn!(
                    "Worker for {} failed {} times, permanently suspending it",
                    id, handle.crashes
                );
            } else {
                warn!("Worker for {} failed ({:?}), will respawn", id, reason);
            }
            self.fallbacks
                .push(DecisionResponse::fallback(id.clone(), turn, reason));
        }
    }
}

#[async_trait]
impl DecisionSource for NpcProcessManager {
    async fn publish(&mut self, snapshots: Vec<PerceptionSnapshot>) -> oakvale_core::error::Result<()> {
        self.latest = snapshots
            .into_iter()
            .map(|s| (s.character_id().clone(), s))
            .collect();
        Ok(())
    }

    async fn tick(&mut self, elapsed: Duration, roster: &Roster) -> oakvale_core::error::Result<()> {
        self.clock += elapsed;
        self.last_report = self.reconcile(roster).await;
        self.dispatch();
        self.reap();
        Ok(())
    }

    fn poll(&mut self) -> Vec<DecisionResponse> {
        let mut ready = std::mem::take(&mut self.fallbacks);
        let clock = self.clock;

        for handle in self.workers.values_mut() {
            let mut replies = std::mem::take(&mut handle.backlog);
            if let Some(channels) = handle.channels.as_mut() {
                while let Ok(reply) = channels.replies.try_recv() {
                    replies.push(reply);
                }
            }
            for reply in replies {
                match reply {
                    WorkerReply::Decision { seq, response } => {
                        let expected = handle.state == WorkerState::Active
                            && handle.in_flight.is_some_and(|f| f.seq == seq);
                        if expected {
                            handle.in_flight = None;
                            handle.last_decision = Some(clock);
                            ready.push(response);
                        } else {
                            debug!("Dropping stale reply {} from {}", seq, handle.id);
                        }
                    }
                    WorkerReply::Dialog { seq, .. } => {
                        debug!("Dropping late dialog reply {} from {}", seq, handle.id);
                    }
                }
            }
        }

        ready.sort_by(|a, b| a.character.cmp(&b.character));
        ready
    }

    async fn converse(&mut self, snapshot: PerceptionSnapshot, speaker: &str, message: &str) -> String {
        let id = snapshot.character_id().clone();
        match self.dialog(snapshot, speaker, message).await {
            Ok(line) => line,
            Err(e) => {
                info!("{} hedges: {}", id, e);
                FALLBACK_DIALOG.to_string()
            }
        }
    }

    async fn shutdown(&mut self) -> oakvale_core::error::Result<()> {
        let grace = self.config.shutdown_grace;
        info!("Shutting down {} workers", self.workers.len());
        join_all(
            self.workers
                .values_mut()
                .filter(|h| h.is_running())
                .map(|h| h.stop(grace)),
        )
        .await;
        for handle in self.workers.values_mut() {
            if handle.state != WorkerState::Demoted {
                handle.state = WorkerState::Terminated;
            }
        }
        Ok(())
    }
}
