//! Worker runtime seam
//!
//! A runtime turns a character id into a running worker and hands back the
//! two message channels plus a control handle. The manager does not care
//! whether the worker is a tokio task or a child process.

use std::time::Duration;

use async_trait::async_trait;
use oakvale_core::character::CharacterId;
use oakvale_core::worker::{WorkerCommand, WorkerReply};
use tokio::sync::mpsc;

use crate::Result;

/// Liveness and termination of one spawned worker
#[async_trait]
pub trait WorkerControl: Send {
    /// OS process id, when the worker is a process
    fn pid(&self) -> Option<u32>;

    /// True once the worker has exited, for whatever reason
    fn is_finished(&mut self) -> bool;

    /// Wait up to `grace` for a voluntary exit. Returns whether it exited.
    async fn wait_exit(&mut self, grace: Duration) -> bool;

    /// Hard kill. Idempotent.
    fn kill(&mut self);
}

/// Endpoints of a freshly spawned worker
pub struct WorkerChannels {
    pub commands: mpsc::Sender<WorkerCommand>,
    pub replies: mpsc::Receiver<WorkerReply>,
    pub control: Box<dyn WorkerControl>,
}

/// Creates workers
#[async_trait]
pub trait WorkerRuntime: Send + Sync {
    async fn spawn(&self, id: &CharacterId) -> Result<WorkerChannels>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}
