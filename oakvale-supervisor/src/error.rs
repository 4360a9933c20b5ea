//! Error types for supervisor operations

use oakvale_core::character::CharacterId;
use oakvale_core::error::OakvaleError;
use thiserror::Error;

/// Result type for supervisor operations
pub type Result<T> = std::result::Result<T, SupervisorError>;

/// Error types for supervisor
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("No worker for {0}")]
    UnknownWorker(CharacterId),

    #[error("Worker pool is full ({max} active)")]
    CapacityExceeded { max: usize },

    #[error("Worker for {0} crashed too often and is permanently suspended")]
    Demoted(CharacterId),

    #[error("Worker for {0} is not active")]
    NotActive(CharacterId),

    #[error("No answer from {id} within {after:?}")]
    DialogTimeout { id: CharacterId, after: std::time::Duration },

    #[error("Worker binary not found: {0}")]
    BinaryNotFound(String),

    #[error("Failed to spawn worker: {0}")]
    Spawn(String),

    #[error(transparent)]
    Core(#[from] OakvaleError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<SupervisorError> for OakvaleError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::Core(inner) => inner,
            SupervisorError::Spawn(reason) => OakvaleError::WorkerCrashed(reason),
            other => OakvaleError::Other(other.to_string()),
        }
    }
}
