//! Error types for Oakvale operations

use crate::character::{CharacterId, LifeStatus};
use crate::llm::QueryError;

/// Result type for Oakvale operations
pub type Result<T> = std::result::Result<T, OakvaleError>;

/// Error types for the Oakvale core
#[derive(Debug, thiserror::Error)]
pub enum OakvaleError {
    /// Action failed validation against the current world state
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Status change not permitted by the life-cycle rules
    #[error("Invalid status transition for {id}: {from:?} -> {to:?}")]
    InvalidTransition {
        id: CharacterId,
        from: LifeStatus,
        to: LifeStatus,
    },

    /// Character id not present in the world
    #[error("Unknown character: {0}")]
    UnknownCharacter(CharacterId),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// LLM boundary failure
    #[error(transparent)]
    Llm(#[from] QueryError),

    /// Worker process or task failed
    #[error("Worker crashed: {0}")]
    WorkerCrashed(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl OakvaleError {
    /// Shorthand for an [`OakvaleError::InvalidAction`]
    pub fn invalid(reason: impl Into<String>) -> Self {
        OakvaleError::InvalidAction(reason.into())
    }
}

impl From<String> for OakvaleError {
    fn from(s: String) -> Self {
        OakvaleError::Other(s)
    }
}

impl From<&str> for OakvaleError {
    fn from(s: &str) -> Self {
        OakvaleError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for OakvaleError {
    fn from(err: anyhow::Error) -> Self {
        OakvaleError::Other(err.to_string())
    }
}

impl From<figment::Error> for OakvaleError {
    fn from(err: figment::Error) -> Self {
        OakvaleError::Configuration(err.to_string())
    }
}
