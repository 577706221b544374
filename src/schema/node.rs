use serde::{Deserialize, Serialize};

use super::condition::Condition;
use super::effect::Effect;

/// One line of dialogue attributed to a speaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueLine {
    pub speaker: String,
    pub text: String,
}

/// Where a choice leads, classified once when the story is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    Node(String),
    Ending(String),
    /// Names neither a node nor an ending. Resolving it falls back to the
    /// story's fallback ending.
    Unresolved(String),
}

impl Target {
    /// The raw id as authored.
    pub fn id(&self) -> &str {
        match self {
            Self::Node(id) | Self::Ending(id) | Self::Unresolved(id) => id.as_str(),
        }
    }
}

/// A player-selectable option within an event node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub id: String,
    pub text: String,
    pub condition: Condition,
    pub effect: Effect,
    pub next: Target,
}

/// One authored unit of narrative content: dialogue followed by choices.
///
/// A node with no dialogue lines shows its choices immediately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventNode {
    pub id: String,
    /// Background/location reference, opaque to the engine.
    pub scene: String,
    pub dialogue: Vec<DialogueLine>,
    pub choices: Vec<Choice>,
}

impl EventNode {
    pub fn choice(&self, id: &str) -> Option<&Choice> {
        self.choices.iter().find(|c| c.id == id)
    }

    /// Index of the last dialogue line, or 0 for a choice-only node.
    pub fn last_line(&self) -> usize {
        self.dialogue.len().saturating_sub(1)
    }
}

/// A terminal node. Reached only through a choice's `next`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ending {
    pub id: String,
    pub title: String,
    pub text: String,
    /// Thresholds the author associates with this ending. Informational;
    /// the engine never evaluates them on its own.
    pub triggers: Condition,
}
