//! Structured NPC decisions
//!
//! Free text from the model is turned into a closed [`Decision`] union by
//! [`parse::parse_decision`]. Anything that does not fit the union is a
//! `MalformedOutput` error, and callers substitute a fallback wait.

pub mod parse;

pub use parse::{ParsedDecision, parse_decision};

use serde::{Deserialize, Serialize};

use crate::character::CharacterId;
use crate::llm::QueryError;
use crate::world::Direction;

/// Where a move is headed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveTarget {
    /// One step in a compass direction
    Direction(Direction),
    /// One step towards a named character or location
    Toward(String),
}

impl std::fmt::Display for MoveTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MoveTarget::Direction(d) => write!(f, "{}", d),
            MoveTarget::Toward(name) => write!(f, "toward {}", name),
        }
    }
}

/// Action chosen by an NPC.
///
/// Targets are free text (a character name or id) and are resolved against
/// the world when the decision is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    Move { target: MoveTarget },
    Attack { target: String },
    Talk { target: String, line: String },
    Trade {
        target: String,
        item: String,
        /// Asking price; the item's value when absent
        price: Option<u32>,
    },
    UseItem { item: String },
    Wait { manner: String },
}

impl Decision {
    pub fn wait(manner: impl Into<String>) -> Self {
        Decision::Wait {
            manner: manner.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Decision::Move { .. } => "move",
            Decision::Attack { .. } => "attack",
            Decision::Talk { .. } => "talk",
            Decision::Trade { .. } => "trade",
            Decision::UseItem { .. } => "use_item",
            Decision::Wait { .. } => "wait",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Move { target } => write!(f, "move {}", target),
            Decision::Attack { target } => write!(f, "attack {}", target),
            Decision::Talk { target, line } => write!(f, "talk to {}: \"{}\"", target, line),
            Decision::Trade {
                target,
                item,
                price,
            } => match price {
                Some(p) => write!(f, "trade {} to {} for {} gold", item, target, p),
                None => write!(f, "trade {} to {}", item, target),
            },
            Decision::UseItem { item } => write!(f, "use {}", item),
            Decision::Wait { manner } => write!(f, "wait {}", manner),
        }
    }
}

/// Line an NPC speaks when it cannot answer the player in time
pub const FALLBACK_DIALOG: &str = "Hmm... Let me think about that.";

/// Why a decision was synthesized instead of coming from the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    Timeout,
    MalformedOutput,
    ServiceUnavailable,
    WorkerCrashed,
}

impl From<&QueryError> for FallbackReason {
    fn from(err: &QueryError) -> Self {
        match err {
            QueryError::Timeout(_) => FallbackReason::Timeout,
            QueryError::MalformedOutput(_) => FallbackReason::MalformedOutput,
            QueryError::ServiceUnavailable(_) => FallbackReason::ServiceUnavailable,
        }
    }
}

/// A decision for one character, tagged with the snapshot turn it was based on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub character: CharacterId,
    pub turn: u64,
    pub decision: Decision,
    pub dialog: Option<String>,
    pub thoughts: Option<String>,
    pub emotion: Option<String>,
    pub goal_update: Option<String>,
    pub fallback: Option<FallbackReason>,
}

impl DecisionResponse {
    pub fn from_parsed(character: CharacterId, turn: u64, parsed: ParsedDecision) -> Self {
        Self {
            character,
            turn,
            decision: parsed.decision,
            dialog: parsed.dialog,
            thoughts: parsed.thoughts,
            emotion: parsed.emotion,
            goal_update: parsed.goal_update,
            fallback: None,
        }
    }

    /// Default wait used whenever no usable decision is available
    pub fn fallback(character: CharacterId, turn: u64, reason: FallbackReason) -> Self {
        Self {
            character,
            turn,
            decision: Decision::wait("for something to happen"),
            dialog: None,
            thoughts: Some("I'm not sure what to do right now".to_string()),
            emotion: None,
            goal_update: None,
            fallback: Some(reason),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}
