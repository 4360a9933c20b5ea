//! # Oakvale core
//!
//! World model and NPC decision pipeline for the Oakvale role-playing game.
//! Non-player characters are driven by a locally hosted language model:
//! the engine builds a perception snapshot per NPC, a worker turns it into
//! a prompt and queries the model, and the structured decision flows back
//! to the engine, which validates and applies it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use oakvale_core::prelude::*;
//!
//! # async fn run(source: impl DecisionSource) -> Result<()> {
//! let config = OakvaleConfig::load()?;
//! let world = oakvale_core::world::demo::oakvale_village(&config)?;
//! let mut engine = Engine::new(world, source, &config);
//!
//! engine.start().await?;
//! let snapshot = engine
//!     .advance_turn(PlayerAction::Move { direction: Direction::South })
//!     .await?;
//! println!("{}", snapshot.time);
//! engine.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Layout
//!
//! - **world / character / memory**: authoritative state, owned by the engine
//! - **perception / request**: what an NPC sees, and the prompt built from it
//! - **llm / decision**: model providers, retries, response parsing
//! - **worker**: the per-NPC request/decide loop, in-process or over stdio
//! - **engine**: turn resolution behind the [`engine::DecisionSource`] seam

pub mod character;
pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod llm;
pub mod memory;
pub mod perception;
pub mod request;
pub mod worker;
pub mod world;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::character::{Character, CharacterId, CharacterSheet, LifeStatus, Stats};
    pub use crate::config::OakvaleConfig;
    pub use crate::decision::{Decision, DecisionResponse, FallbackReason};
    pub use crate::engine::{DecisionSource, Engine, PlayerAction, Roster, WorldSnapshot};
    pub use crate::error::{OakvaleError, Result};
    pub use crate::llm::{DecisionClient, LLMProvider, LLMProviderFactory, QueryError};
    pub use crate::perception::{PerceptionBuilder, PerceptionSnapshot};
    pub use crate::request::DecisionRequestBuilder;
    pub use crate::worker::{NpcWorker, WorkerCommand, WorkerReply};
    pub use crate::world::{Direction, Position, World};
}
