//! Line-delimited JSON transport for workers running as child processes

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use super::{NpcWorker, WorkerCommand, WorkerStep};
use crate::error::Result;

/// Serialize a message as one protocol line (newline included)
pub fn encode_line<T: Serialize>(message: &T) -> Result<String> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T> {
    Ok(serde_json::from_str(line.trim())?)
}

/// Drive a worker over a reader/writer pair.
///
/// Reads one [`WorkerCommand`] per line and writes one reply line per
/// accepted snapshot or dialog request. Returns on `Shutdown` or end of input. Undecodable
/// lines are logged and skipped.
pub async fn run_stdio<R, W>(mut worker: NpcWorker, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!("Stdio worker for {} ready", worker.character());
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command: WorkerCommand = match decode_line(&line) {
            Ok(command) => command,
            Err(e) => {
                warn!("Skipping undecodable command line: {}", e);
                continue;
            }
        };

        match worker.handle(command).await {
            WorkerStep::Reply(reply) => {
                writer.write_all(encode_line(&reply)?.as_bytes()).await?;
                writer.flush().await?;
            }
            WorkerStep::Continue => {}
            WorkerStep::Stop => break,
        }
    }

    info!("Stdio worker for {} exiting", worker.character());
    Ok(())
}
