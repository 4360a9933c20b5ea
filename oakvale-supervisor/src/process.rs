//! Process runtime: one child process per NPC
//!
//! Each child runs the `worker` subcommand and speaks line-delimited JSON:
//! [`WorkerCommand`]s on stdin, [`WorkerReply`]s on stdout. Two pump tasks
//! bridge the pipes to the same bounded channels the task runtime uses.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use oakvale_core::character::CharacterId;
use oakvale_core::worker::{WorkerCommand, WorkerReply, decode_line, encode_line};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::runtime::{WorkerChannels, WorkerControl, WorkerRuntime};
use crate::{Result, SupervisorError};

/// Configuration for the process runtime
#[derive(Debug, Clone)]
pub struct ProcessRuntimeConfig {
    /// Binary providing the `worker` subcommand
    pub program: PathBuf,

    /// Arguments placed before `--character-id <id>`
    pub args: Vec<String>,

    /// Capacity of each channel between the manager and the pumps
    pub mailbox_capacity: usize,

    /// Working directory for workers
    pub working_dir: Option<PathBuf>,
}

impl Default for ProcessRuntimeConfig {
    fn default() -> Self {
        Self {
            program: std::env::current_exe().unwrap_or_else(|_| PathBuf::from("oakvale")),
            args: vec!["worker".to_string()],
            mailbox_capacity: 4,
            working_dir: None,
        }
    }
}

pub struct ProcessRuntime {
    config: ProcessRuntimeConfig,
}

impl ProcessRuntime {
    pub fn new(config: ProcessRuntimeConfig) -> Result<Self> {
        if !config.program.exists() {
            return Err(SupervisorError::BinaryNotFound(
                config.program.display().to_string(),
            ));
        }
        Ok(Self { config })
    }
}

#[async_trait]
impl WorkerRuntime for ProcessRuntime {
    async fn spawn(&self, id: &CharacterId) -> Result<WorkerChannels> {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .arg("--character-id")
            .arg(id.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(ref dir) = self.config.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().context("Failed to spawn worker process")?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SupervisorError::Spawn(format!("no stdin pipe for {}", id)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SupervisorError::Spawn(format!("no stdout pipe for {}", id)))?;

        let capacity = self.config.mailbox_capacity.max(1);
        let (command_tx, command_rx) = mpsc::channel(capacity);
        let (reply_tx, reply_rx) = mpsc::channel(capacity);

        let writer = tokio::spawn(pump_commands(id.clone(), command_rx, stdin));
        let reader = tokio::spawn(pump_replies(id.clone(), stdout, reply_tx));

        info!("Worker process for {} started (PID: {:?})", id, child.id());
        Ok(WorkerChannels {
            commands: command_tx,
            replies: reply_rx,
            control: Box::new(ProcessControl {
                pid: child.id(),
                child,
                pumps: vec![writer, reader],
            }),
        })
    }

    fn name(&self) -> &'static str {
        "process"
    }
}

async fn pump_commands(
    id: CharacterId,
    mut commands: mpsc::Receiver<WorkerCommand>,
    mut stdin: tokio::process::ChildStdin,
) {
    while let Some(command) = commands.recv().await {
        let line = match encode_line(&command) {
            Ok(line) => line,
            Err(e) => {
                warn!("Could not encode command for {}: {}", id, e);
                continue;
            }
        };
        if let Err(e) = stdin.write_all(line.as_bytes()).await {
            debug!("stdin of {} closed: {}", id, e);
            break;
        }
        if stdin.flush().await.is_err() {
            break;
        }
    }
}

async fn pump_replies(
    id: CharacterId,
    stdout: tokio::process::ChildStdout,
    replies: mpsc::Sender<WorkerReply>,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match decode_line::<WorkerReply>(&line) {
                Ok(reply) => {
                    if replies.send(reply).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Ignoring undecodable reply from {}: {}", id, e),
            },
            Ok(None) => break,
            Err(e) => {
                debug!("stdout of {} failed: {}", id, e);
                break;
            }
        }
    }
}

struct ProcessControl {
    child: Child,
    pid: Option<u32>,
    pumps: Vec<JoinHandle<()>>,
}

#[async_trait]
impl WorkerControl for ProcessControl {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn is_finished(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }

    async fn wait_exit(&mut self, grace: Duration) -> bool {
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!("Worker process {:?} exited ({})", self.pid, status);
                true
            }
            Ok(Err(e)) => {
                warn!("Error waiting for worker process {:?}: {}", self.pid, e);
                false
            }
            Err(_) => false,
        }
    }

    fn kill(&mut self) {
        if let Err(e) = self.child.start_kill() {
            debug!("Kill of worker process {:?}: {}", self.pid, e);
        }
        for pump in &self.pumps {
            pump.abort();
        }
    }
}
