//! Strict parser for model output
//!
//! Two shapes are accepted:
//!
//! ```text
//! ACTION: move
//! TARGET: north
//! DIALOG: None
//! THOUGHTS: The road looks quiet.
//! EMOTION: calm
//! GOAL_UPDATE: None
//! ```
//!
//! or a JSON object with the same keys in lowercase, optionally wrapped in a
//! code fence or surrounded by prose.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use super::{Decision, MoveTarget};
use crate::llm::QueryError;
use crate::world::Direction;

/// Everything a model reply carries besides the action itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDecision {
    pub decision: Decision,
    pub dialog: Option<String>,
    pub thoughts: Option<String>,
    pub emotion: Option<String>,
    pub goal_update: Option<String>,
}

#[derive(Debug, Default)]
struct RawFields {
    action: Option<String>,
    target: Option<String>,
    item: Option<String>,
    price: Option<String>,
    dialog: Option<String>,
    thoughts: Option<String>,
    emotion: Option<String>,
    goal_update: Option<String>,
}

impl RawFields {
    fn set(&mut self, key: &str, value: String) {
        let slot = match key {
            "action" => &mut self.action,
            "target" => &mut self.target,
            "item" => &mut self.item,
            "price" => &mut self.price,
            "dialog" | "dialogue" => &mut self.dialog,
            "thoughts" => &mut self.thoughts,
            "emotion" => &mut self.emotion,
            "goal_update" => &mut self.goal_update,
            _ => return,
        };
        // First occurrence wins
        if slot.is_none() {
            *slot = meaningful(&value);
        }
    }
}

/// Placeholder values models emit for "nothing"
fn meaningful(value: &str) -> Option<String> {
    let trimmed = value
        .trim()
        .trim_matches(|c| c == '[' || c == ']' || c == '*')
        .trim()
        .trim_matches('"')
        .trim();
    match trimmed.to_lowercase().as_str() {
        "" | "none" | "n/a" | "na" | "null" | "nothing" | "-" => None,
        _ => Some(trimmed.to_string()),
    }
}

fn strip_code_fences(input: &str) -> &str {
    static CODE_FENCE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"```(?:json|JSON)?\s*\n?([\s\S]*?)\n?```").unwrap());

    CODE_FENCE_RE
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(input)
}

/// First balanced `{ ... }` block, respecting string literals
fn extract_object(input: &str) -> Option<&str> {
    let start = input.find('{')?;
    let body = &input[start..];
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in body.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&body[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_json_fields(text: &str) -> Option<RawFields> {
    static TRAILING_COMMA_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r",(\s*[}\]])").unwrap());

    let candidate = extract_object(strip_code_fences(text))?;
    let repaired = TRAILING_COMMA_RE.replace_all(candidate, "$1");
    let value: serde_json::Value = serde_json::from_str(&repaired).ok()?;
    let object = value.as_object()?;

    let mut fields = RawFields::default();
    for (key, value) in object {
        let text = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Null => continue,
            other => other.to_string(),
        };
        fields.set(&key.to_lowercase(), text);
    }
    Some(fields)
}

fn parse_labelled_fields(text: &str) -> RawFields {
    let mut fields = RawFields::default();
    for line in text.lines() {
        let line = line.trim().trim_start_matches(['-', '*', ' ']);
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        let label = label
            .trim()
            .trim_matches('*')
            .trim()
            .to_lowercase()
            .replace(' ', "_");
        fields.set(&label, value.to_string());
    }
    fields
}

fn malformed(reason: impl Into<String>) -> QueryError {
    QueryError::MalformedOutput(reason.into())
}

fn parse_price(text: &str) -> Option<u32> {
    static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
    NUMBER_RE.find(text).and_then(|m| m.as_str().parse().ok())
}

fn require(value: Option<String>, what: &str, kind: &str) -> Result<String, QueryError> {
    value.ok_or_else(|| malformed(format!("{} without {}", kind, what)))
}

/// Words that only connect an action verb to its object
const CONNECTIVES: &[&str] = &["to", "toward", "towards", "at", "with", "into", "over"];

/// Split an `ACTION:` value into its kind and whatever follows it.
///
/// `"Move to the tavern"` is `("move", Some("the tavern"))`, `"use item"`
/// is `("use_item", None)`.
fn split_action(action: &str) -> (String, Option<String>) {
    let head = action
        .split(['/', ',', '('])
        .next()
        .unwrap_or_default()
        .trim();
    let mut words = head.split_whitespace().peekable();
    let mut kind = words
        .next()
        .unwrap_or_default()
        .to_lowercase()
        .replace('-', "_");
    if kind == "use" && words.peek().is_some_and(|w| w.eq_ignore_ascii_case("item")) {
        words.next();
        kind = "use_item".to_string();
    }
    while words
        .peek()
        .is_some_and(|w| CONNECTIVES.contains(&w.to_lowercase().as_str()))
    {
        words.next();
    }
    let rest = words.collect::<Vec<_>>().join(" ");
    (kind, meaningful(&rest))
}

/// A move target opening with a compass word is a step; anything else
/// names a place or character and is resolved against the world later.
fn move_target(target: String) -> MoveTarget {
    let first = target.split_whitespace().next().unwrap_or_default();
    match Direction::parse(&first.replace('-', "")) {
        Some(direction) => MoveTarget::Direction(direction),
        None => MoveTarget::Toward(target),
    }
}

/// Parse model output into a decision.
///
/// Fails with `MalformedOutput` on empty text, a missing or unknown action
/// kind, or missing kind-specific parameters.
pub fn parse_decision(text: &str) -> Result<ParsedDecision, QueryError> {
    if text.trim().is_empty() {
        return Err(malformed("empty output"));
    }

    let fields = match parse_json_fields(text) {
        Some(fields) if fields.action.is_some() => fields,
        _ => parse_labelled_fields(text),
    };

    let Some(action) = fields.action.as_deref() else {
        let preview: String = text.chars().take(100).collect();
        debug!("No ACTION field in model output: {}", preview);
        return Err(malformed("missing ACTION"));
    };

    let (kind, rest) = split_action(action);
    let target = fields.target.clone().or(rest);

    let decision = match kind.as_str() {
        "move" | "walk" | "go" | "travel" | "approach" | "follow" | "head" => {
            let target = require(target, "target", "move")?;
            Decision::Move {
                target: move_target(target),
            }
        }
        "attack" | "fight" | "strike" => Decision::Attack {
            target: require(target, "target", "attack")?,
        },
        "talk" | "speak" | "say" | "greet" => Decision::Talk {
            target: require(target, "target", "talk")?,
            line: require(fields.dialog.clone(), "dialog", "talk")?,
        },
        "trade" | "sell" | "barter" => Decision::Trade {
            target: require(target, "target", "trade")?,
            item: require(fields.item.clone(), "item", "trade")?,
            price: fields.price.as_deref().and_then(parse_price),
        },
        "use_item" | "use" | "drink" | "eat" => Decision::UseItem {
            item: require(fields.item.clone().or(target), "item", "use_item")?,
        },
        "wait" | "rest" | "idle" | "observe" => Decision::Wait {
            manner: target.unwrap_or_else(|| "patiently".to_string()),
        },
        other => return Err(malformed(format!("unknown action kind: {}", other))),
    };

    Ok(ParsedDecision {
        decision,
        dialog: fields.dialog,
        thoughts: fields.thoughts,
        emotion: fields.emotion,
        goal_update: fields.goal_update,
    })
}
