//! Decision request: a perception snapshot rendered as a bounded prompt

use crate::character::CharacterId;
use crate::llm::LLMRequest;
use crate::memory::{MemoryEntry, WorldEvent};
use crate::perception::PerceptionSnapshot;

/// Instructions shared by every NPC decision
pub const NPC_ACTION_SYSTEM_PROMPT: &str = "You are roleplaying as an NPC in a D&D-style game.
Based on your character sheet, memories, and current situation, decide what action to take next.
Respond using the following format ONLY:

ACTION: [move/talk/trade/use_item/attack/wait]
TARGET: [target of the action: a direction, a character name or a place]
ITEM: [item to trade or use, if any]
PRICE: [asking price in gold when trading]
DIALOG: [Any dialog the character says]
THOUGHTS: [Internal thoughts, not spoken]
EMOTION: [Current emotional state]
GOAL_UPDATE: [Any updates to current goals]

Be authentic to your character's personality and motivations.";

/// Appended to the per-character opening line of a dialog request
const NPC_DIALOG_INSTRUCTIONS: &str = "Respond to the player in character, according to your personality, goals, and memories.
Keep your response brief and conversational. Reply with the spoken words only.";

/// Immutable prompt pair for one decision cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionRequest {
    character: CharacterId,
    turn: u64,
    system_prompt: String,
    user_prompt: String,
}

impl DecisionRequest {
    pub fn character(&self) -> &CharacterId {
        &self.character
    }

    /// Turn of the snapshot this request was built from
    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn user_prompt(&self) -> &str {
        &self.user_prompt
    }

    /// Total prompt size in characters
    pub fn len(&self) -> usize {
        self.system_prompt.chars().count() + self.user_prompt.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.user_prompt.is_empty()
    }

    pub fn to_llm_request(&self, temperature: f32, max_tokens: usize) -> LLMRequest {
        LLMRequest::with_system_prompt(self.system_prompt.clone(), self.user_prompt.clone())
            .temperature(temperature)
            .max_tokens(max_tokens)
    }
}

/// Renders snapshots into size-bounded requests
#[derive(Debug, Clone)]
pub struct DecisionRequestBuilder {
    max_chars: usize,
}

impl DecisionRequestBuilder {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Render a snapshot.
    ///
    /// Output is a pure function of the snapshot. When over budget the
    /// oldest events go first, then the oldest memories, then the oldest
    /// goals down to the newest one; anything still over is cut at the
    /// budget.
    pub fn build(&self, snapshot: &PerceptionSnapshot) -> DecisionRequest {
        let closing = format!(
            "\nBased on this information, what does {} do next?",
            snapshot.sheet.name
        );
        self.fit(snapshot, NPC_ACTION_SYSTEM_PROMPT.to_string(), &closing)
    }

    /// Render a request for a spoken reply to `speaker`. Same budget rules
    /// as [`build`](Self::build); the message itself is never dropped.
    pub fn build_dialog(&self, snapshot: &PerceptionSnapshot, speaker: &str, message: &str) -> DecisionRequest {
        let sheet = &snapshot.sheet;
        let system_prompt = format!(
            "You are roleplaying as {}, a {} {} in a fantasy RPG.\n{}",
            sheet.name, sheet.race, sheet.class, NPC_DIALOG_INSTRUCTIONS
        );
        let closing = format!(
            "\n{} SAYS: \"{}\"\n\nHow does {} respond?",
            speaker.to_uppercase(),
            message.trim(),
            sheet.name
        );
        self.fit(snapshot, system_prompt, &closing)
    }

    fn fit(&self, snapshot: &PerceptionSnapshot, system_prompt: String, closing: &str) -> DecisionRequest {
        let system_chars = system_prompt.chars().count();
        let budget = self.max_chars.saturating_sub(system_chars);

        let mut parts = Parts {
            goals: &snapshot.sheet.goals,
            events: &snapshot.recent_events,
            memories: &snapshot.memories,
        };

        let mut user_prompt = render(snapshot, &parts, closing);
        while user_prompt.chars().count() > budget {
            if !parts.events.is_empty() {
                parts.events = &parts.events[1..];
            } else if !parts.memories.is_empty() {
                parts.memories = &parts.memories[1..];
            } else if parts.goals.len() > 1 {
                parts.goals = &parts.goals[1..];
            } else {
                let closing_chars = closing.chars().count();
                let body = render(snapshot, &parts, "");
                user_prompt = body
                    .chars()
                    .take(budget.saturating_sub(closing_chars))
                    .chain(closing.chars())
                    .take(budget)
                    .collect();
                break;
            }
            user_prompt = render(snapshot, &parts, closing);
        }

        DecisionRequest {
            character: snapshot.sheet.id.clone(),
            turn: snapshot.turn,
            system_prompt,
            user_prompt,
        }
    }
}

/// Sections that shrink under budget pressure
struct Parts<'a> {
    goals: &'a [String],
    events: &'a [WorldEvent],
    memories: &'a [MemoryEntry],
}

fn render(snapshot: &PerceptionSnapshot, parts: &Parts<'_>, closing: &str) -> String {
    let sheet = &snapshot.sheet;
    let mut out = String::from("CHARACTER SHEET:\n");

    out.push_str(&format!(
        "Name: {} ({} {}, level {})\n",
        sheet.name, sheet.race, sheet.class, sheet.level
    ));
    if !sheet.description.is_empty() {
        out.push_str(&format!("Description: {}\n", sheet.description));
    }
    let s = &sheet.stats;
    out.push_str(&format!(
        "Stats: STR {} DEX {} CON {} INT {} WIS {} CHA {}\n",
        s.strength, s.dexterity, s.constitution, s.intelligence, s.wisdom, s.charisma
    ));
    out.push_str(&format!("HP: {}/{}\n", sheet.hp, sheet.max_hp));
    out.push_str(&format!("Position: {}\n", sheet.position));
    out.push_str(&format!("Gold: {}\n", sheet.gold));
    out.push_str(&format!("Inventory: {}\n", list_or_none(&sheet.inventory)));
    let p = &sheet.personality;
    out.push_str(&format!("Traits: {}\n", list_or_none(&p.traits)));
    out.push_str(&format!("Likes: {}\n", list_or_none(&p.likes)));
    out.push_str(&format!("Dislikes: {}\n", list_or_none(&p.dislikes)));
    if let Some(emotion) = &p.emotion {
        out.push_str(&format!("Feeling: {}\n", emotion));
    }
    out.push_str(&format!("Goals: {}\n", list_or_none(parts.goals)));

    out.push_str(&format!("\nCURRENT LOCATION:\n{}\n", snapshot.location));
    out.push_str(&format!("\nTIME OF DAY:\n{}\n", snapshot.time));

    out.push_str("\nVISIBLE ENVIRONMENT:\n");
    for row in &snapshot.terrain {
        out.push_str(row);
        out.push('\n');
    }
    for entity in &snapshot.visible_entities {
        out.push_str(&format!(
            "- {} ({} {}) {} tiles {}, HP {}/{}\n",
            entity.name,
            entity.race,
            entity.class,
            entity.distance.round() as i64,
            entity.direction.map(|d| d.as_str()).unwrap_or("here"),
            entity.hp,
            entity.max_hp
        ));
    }
    for item in &snapshot.visible_items {
        out.push_str(&format!(
            "- {} on the ground {} tiles {}\n",
            item.name,
            item.distance.round() as i64,
            item.direction.map(|d| d.as_str()).unwrap_or("here")
        ));
    }

    if !snapshot.relationships.is_empty() {
        out.push_str("\nRELATIONSHIPS:\n");
        for r in &snapshot.relationships {
            out.push_str(&format!("- {}: {} ({})\n", r.name, r.description, r.score));
        }
    }

    if !snapshot.addressed.is_empty() {
        out.push_str("\nSPOKEN TO YOU:\n");
        for u in &snapshot.addressed {
            out.push_str(&format!("- {} says: \"{}\"\n", u.speaker, u.text));
        }
    }

    out.push_str("\nRECENT HISTORY:\n");
    for event in parts.events {
        out.push_str(&format!("- [turn {}] {}\n", event.turn, event.summary));
    }

    out.push_str("\nMEMORIES:\n");
    for memory in parts.memories {
        out.push_str(&format!("- {}\n", memory.summary));
    }

    out.push_str(closing);
    out
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{Character, CharacterClass, CharacterRace};
    use crate::config::{OakvaleConfig, PerceptionConfig};
    use crate::memory::EventKind;
    use crate::perception::PerceptionBuilder;
    use crate::world::{Position, World, WorldMap};

    fn snapshot(events: usize, memories: usize) -> PerceptionSnapshot {
        let mut world = World::new(WorldMap::new(12, 12), &OakvaleConfig::default());
        let mut npc = Character::new("npc", "Bran", CharacterClass::Guard, CharacterRace::Human, 1)
            .with_position(Position::new(3, 3));
        for i in 0..memories {
            npc.add_memory(0, format!("memory number {} about the old mill", i), 1);
        }
        world.add_character(npc).unwrap();
        for i in 0..events {
            world.record(WorldEvent::new(
                0,
                EventKind::Dialog,
                "npc".into(),
                format!("event number {} happened in the square", i),
            ));
        }
        let config = PerceptionConfig {
            recent_events: 50,
            recent_memories: 50,
            ..PerceptionConfig::default()
        };
        PerceptionBuilder::new(config)
            .build(&world, &"npc".into(), Vec::new())
            .unwrap()
    }

    #[test]
    fn test_render_is_deterministic() {
        let snap = snapshot(3, 3);
        let builder = DecisionRequestBuilder::new(6000);
        assert_eq!(builder.build(&snap), builder.build(&snap));
        let request = builder.build(&snap);
        assert!(request.user_prompt().contains("CHARACTER SHEET:"));
        assert!(request.user_prompt().ends_with("what does Bran do next?"));
        assert_eq!(request.character().as_str(), "npc");
    }

    #[test]
    fn test_budget_drops_oldest_events_first() {
        let snap = snapshot(20, 20);
        let full = DecisionRequestBuilder::new(100_000).build(&snap);
        let limit = full.len() - 200;
        let trimmed = DecisionRequestBuilder::new(limit).build(&snap);

        assert!(trimmed.len() <= limit);
        assert!(!trimmed.user_prompt().contains("event number 0 "));
        assert!(trimmed.user_prompt().contains("event number 19 "));
        // Memories are untouched while events remain
        assert!(trimmed.user_prompt().contains("memory number 0 "));
    }

    #[test]
    fn test_goals_shrink_before_environment() {
        let mut snap = snapshot(5, 5);
        snap.sheet.goals = (0..300)
            .map(|i| format!("Errand {} for the mill", i))
            .collect();
        let request = DecisionRequestBuilder::new(3000).build(&snap);
        let prompt = request.user_prompt();

        assert!(request.len() <= 3000);
        assert!(prompt.contains("VISIBLE ENVIRONMENT:"));
        assert!(prompt.contains("RECENT HISTORY:"));
        assert!(prompt.ends_with("what does Bran do next?"));
        assert!(prompt.contains("Errand 299 for the mill"));
        assert!(!prompt.contains("Errand 0 for the mill"));
    }

    #[test]
    fn test_budget_is_hard() {
        let snap = snapshot(5, 5);
        let request = DecisionRequestBuilder::new(NPC_ACTION_SYSTEM_PROMPT.len() + 50).build(&snap);
        assert!(request.len() <= NPC_ACTION_SYSTEM_PROMPT.len() + 50);
    }

    #[test]
    fn test_dialog_request_keeps_the_message() {
        let snap = snapshot(20, 20);
        let builder = DecisionRequestBuilder::new(100_000);
        let request = builder.build_dialog(&snap, "Player", "  Seen any goblins?  ");
        assert!(request.system_prompt().starts_with("You are roleplaying as Bran, a"));
        assert!(request.user_prompt().contains("CHARACTER SHEET:"));
        assert!(
            request
                .user_prompt()
                .ends_with("PLAYER SAYS: \"Seen any goblins?\"\n\nHow does Bran respond?")
        );

        let tight = DecisionRequestBuilder::new(request.system_prompt().len() + 120)
            .build_dialog(&snap, "Player", "Seen any goblins?");
        assert!(tight.len() <= request.system_prompt().len() + 120);
        assert!(tight.user_prompt().ends_with("How does Bran respond?"));
        assert!(tight.user_prompt().contains("Seen any goblins?"));
    }
}
