//! Oakvale Supervisor - worker lifecycle for LLM-driven NPCs
//!
//! The engine hands perception snapshots to an [`NpcProcessManager`], which
//! keeps a bounded pool of workers busy with them:
//!
//! - **Activation** - NPCs near the player get a worker, the rest are suspended
//! - **Throttling** - at most one request in flight per worker, spaced by an interval
//! - **Fault tolerance** - crashed or hung workers are killed, replaced by a
//!   fallback wait, and respawned until they have failed too often
//!
//! Workers run either as tokio tasks ([`TaskRuntime`]) or as child processes
//! speaking line-delimited JSON ([`ProcessRuntime`]).

mod error;
mod handle;
mod lifecycle;
mod manager;
mod process;
mod runtime;
mod task;

pub use error::{Result, SupervisorError};
pub use handle::{InFlight, WorkerHandle, WorkerState};
pub use lifecycle::{ActivationPolicy, ReconciliationReport};
pub use manager::{Activation, NpcProcessManager};
pub use process::{ProcessRuntime, ProcessRuntimeConfig};
pub use runtime::{WorkerChannels, WorkerControl, WorkerRuntime};
pub use task::TaskRuntime;
