/// The story engine: one playthrough walked through a shared story.
///
/// Owns the mutable session state (attributes, inventory, position, phase)
/// and mediates every transition through the read-only [`Story`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::core::story::{Story, StoryError};
use crate::schema::attributes::{Attributes, Inventory};
use crate::schema::condition::check_condition;
use crate::schema::node::{Choice, DialogueLine, EventNode, Target};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("choice '{choice}' is not available at node '{node}'")]
    InvalidChoice { node: String, choice: String },
    #[error("the playthrough has ended; start a new game first")]
    InvalidPhase,
    #[error("snapshot does not fit this story: {0}")]
    InvalidSnapshot(String),
    #[error("no story was given to the builder")]
    MissingStory,
    #[error("story error: {0}")]
    Story(#[from] StoryError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Playing,
    Ended,
}

/// Record of a choice that led to an id the story does not define. The
/// playthrough was routed to the fallback ending instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataIntegrityFallback {
    pub node: String,
    pub choice: String,
    pub target: String,
    pub ending: String,
}

/// The mutable state of a single playthrough.
///
/// Serializable so a host can save and later [`StoryEngine::restore`] it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playthrough {
    pub attributes: Attributes,
    pub inventory: Inventory,
    /// Current event node. Meaningful only while playing.
    pub node: String,
    /// Index of the dialogue line being shown.
    pub cursor: usize,
    pub phase: Phase,
    pub ending: Option<String>,
    /// Ids of resolved choices, oldest first.
    pub history: Vec<String>,
    pub fallback: Option<DataIntegrityFallback>,
}

impl Playthrough {
    fn fresh(start: &str, attributes: Attributes) -> Self {
        Self {
            attributes,
            inventory: Inventory::new(),
            node: start.to_string(),
            cursor: 0,
            phase: Phase::Playing,
            ending: None,
            history: Vec::new(),
            fallback: None,
        }
    }
}

/// A selectable choice as shown to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceView {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneView {
    pub node_id: String,
    pub scene: String,
    /// None for a choice-only node.
    pub line: Option<DialogueLine>,
    pub cursor: usize,
    pub line_count: usize,
    /// Empty until the last line is reached. Only choices whose condition
    /// currently holds are listed.
    pub choices: Vec<ChoiceView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndingView {
    pub ending_id: String,
    pub title: String,
    pub text: String,
    pub attributes: Attributes,
    pub inventory: Vec<String>,
    pub fallback: Option<DataIntegrityFallback>,
}

/// What the renderer should draw right now.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum View {
    Playing(SceneView),
    Ended(EndingView),
}

impl View {
    pub fn is_ended(&self) -> bool {
        matches!(self, Self::Ended(_))
    }

    pub fn choice_ids(&self) -> Vec<&str> {
        match self {
            Self::Playing(scene) => scene.choices.iter().map(|c| c.id.as_str()).collect(),
            Self::Ended(_) => Vec::new(),
        }
    }
}

pub struct StoryEngine {
    story: Arc<Story>,
    initial_attributes: Attributes,
    state: Playthrough,
}

/// Builder for constructing a `StoryEngine`.
pub struct StoryEngineBuilder {
    story_file: Option<PathBuf>,
    story: Option<Arc<Story>>,
    strict: bool,
    attribute_overrides: Vec<(String, i64)>,
}

impl StoryEngine {
    pub fn builder() -> StoryEngineBuilder {
        StoryEngineBuilder {
            story_file: None,
            story: None,
            strict: false,
            attribute_overrides: Vec::new(),
        }
    }

    /// Create an engine over a shared story and start a new game.
    pub fn new(story: Arc<Story>) -> Self {
        let initial_attributes = story.config().initial_attributes.clone();
        Self::with_initial_attributes(story, initial_attributes)
    }

    fn with_initial_attributes(story: Arc<Story>, initial_attributes: Attributes) -> Self {
        let state = Playthrough::fresh(story.start(), initial_attributes.clone());
        Self {
            story,
            initial_attributes,
            state,
        }
    }

    pub fn story(&self) -> &Arc<Story> {
        &self.story
    }

    pub fn playthrough(&self) -> &Playthrough {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Attribute values a new game starts with.
    pub fn initial_attributes(&self) -> &Attributes {
        &self.initial_attributes
    }

    /// Discard the current playthrough and start over at the story's start node.
    pub fn start_new_game(&mut self) -> View {
        self.state = Playthrough::fresh(self.story.start(), self.initial_attributes.clone());
        debug!(start = %self.state.node, "started new game");
        self.current_view()
    }

    pub fn current_view(&self) -> View {
        match self.state.phase {
            Phase::Playing => match self.current_node() {
                Some(node) => View::Playing(self.scene_view(node)),
                // Unreachable through the public API; restore() validates nodes.
                None => {
                    error!(node = %self.state.node, "current node missing from story");
                    View::Ended(self.ending_view(self.story.fallback_ending()))
                }
            },
            Phase::Ended => {
                let ending = self
                    .state
                    .ending
                    .as_deref()
                    .unwrap_or_else(|| self.story.fallback_ending());
                View::Ended(self.ending_view(ending))
            }
        }
    }

    /// Move to the next dialogue line. No-op on the last line, on a
    /// choice-only node, or after the game has ended.
    pub fn advance_dialogue(&mut self) -> View {
        if self.state.phase == Phase::Playing {
            if let Some(node) = self.current_node() {
                if self.state.cursor + 1 < node.dialogue.len() {
                    self.state.cursor += 1;
                }
            }
        }
        self.current_view()
    }

    /// Choices the player may currently select.
    pub fn visible_choices(&self) -> Vec<&Choice> {
        if self.state.phase != Phase::Playing {
            return Vec::new();
        }
        match self.current_node() {
            Some(node) => self.selectable(node).collect(),
            None => Vec::new(),
        }
    }

    /// Resolve a visible choice: apply its effect, log it, and follow `next`.
    ///
    /// The choice is re-validated against the live state; a stale or hidden
    /// id fails with `InvalidChoice` and leaves the playthrough untouched.
    pub fn resolve_choice(&mut self, choice_id: &str) -> Result<View, EngineError> {
        if self.state.phase == Phase::Ended {
            return Err(EngineError::InvalidPhase);
        }

        let story = Arc::clone(&self.story);
        let choice = story
            .node(&self.state.node)
            .filter(|node| self.choices_unlocked(node))
            .and_then(|node| node.choice(choice_id))
            .filter(|c| check_condition(&c.condition, &self.state.attributes, &self.state.inventory))
            .ok_or_else(|| EngineError::InvalidChoice {
                node: self.state.node.clone(),
                choice: choice_id.to_string(),
            })?;

        choice
            .effect
            .apply(&mut self.state.attributes, &mut self.state.inventory);
        self.state.history.push(choice.id.clone());

        match &choice.next {
            Target::Node(id) => {
                debug!(from = %self.state.node, to = %id, choice = %choice.id, "moved to node");
                self.state.node = id.clone();
                self.state.cursor = 0;
            }
            Target::Ending(id) => self.end(id),
            Target::Unresolved(target) => {
                let fallback = story.fallback_ending();
                warn!(
                    node = %self.state.node,
                    choice = %choice.id,
                    target = %target,
                    fallback = %fallback,
                    "choice leads to an unknown id, routing to fallback ending"
                );
                self.state.fallback = Some(DataIntegrityFallback {
                    node: self.state.node.clone(),
                    choice: choice.id.clone(),
                    target: target.clone(),
                    ending: fallback.to_string(),
                });
                self.end(fallback);
            }
        }

        Ok(self.current_view())
    }

    /// A copy of the current playthrough, suitable for saving.
    pub fn snapshot(&self) -> Playthrough {
        self.state.clone()
    }

    /// Replace the current playthrough with a saved one.
    ///
    /// The saved position must exist in this story. A cursor past the end of
    /// the node's dialogue is clamped to the last line. A game still in
    /// progress carries no ending or fallback record.
    pub fn restore(&mut self, mut saved: Playthrough) -> Result<View, EngineError> {
        match saved.phase {
            Phase::Playing => {
                let node = self.story.node(&saved.node).ok_or_else(|| {
                    EngineError::InvalidSnapshot(format!("unknown node '{}'", saved.node))
                })?;
                saved.cursor = saved.cursor.min(node.last_line());
                saved.ending = None;
                saved.fallback = None;
            }
            Phase::Ended => {
                let ending = saved.ending.as_deref().ok_or_else(|| {
                    EngineError::InvalidSnapshot("ended playthrough without an ending".to_string())
                })?;
                if self.story.ending(ending).is_none() {
                    return Err(EngineError::InvalidSnapshot(format!(
                        "unknown ending '{ending}'"
                    )));
                }
            }
        }
        self.state = saved;
        debug!(phase = ?self.state.phase, node = %self.state.node, "restored playthrough");
        Ok(self.current_view())
    }

    fn current_node(&self) -> Option<&EventNode> {
        self.story.node(&self.state.node)
    }

    fn choices_unlocked(&self, node: &EventNode) -> bool {
        self.state.cursor >= node.last_line()
    }

    fn selectable<'n>(&'n self, node: &'n EventNode) -> impl Iterator<Item = &'n Choice> + 'n {
        let unlocked = self.choices_unlocked(node);
        node.choices.iter().filter(move |c| {
            unlocked && check_condition(&c.condition, &self.state.attributes, &self.state.inventory)
        })
    }

    fn end(&mut self, ending: &str) {
        debug!(ending = %ending, choices = self.state.history.len(), "playthrough ended");
        self.state.phase = Phase::Ended;
        self.state.ending = Some(ending.to_string());
        self.state.cursor = 0;
    }

    fn scene_view(&self, node: &EventNode) -> SceneView {
        SceneView {
            node_id: node.id.clone(),
            scene: node.scene.clone(),
            line: node.dialogue.get(self.state.cursor).cloned(),
            cursor: self.state.cursor,
            line_count: node.dialogue.len(),
            choices: self
                .selectable(node)
                .map(|c| ChoiceView {
                    id: c.id.clone(),
                    text: c.text.clone(),
                })
                .collect(),
        }
    }

    fn ending_view(&self, ending_id: &str) -> EndingView {
        let (title, text) = match self.story.ending(ending_id) {
            Some(ending) => (ending.title.clone(), ending.text.clone()),
            None => (ending_id.to_string(), String::new()),
        };
        EndingView {
            ending_id: ending_id.to_string(),
            title,
            text,
            attributes: self.state.attributes.clone(),
            inventory: self
                .state
                .inventory
                .sorted()
                .into_iter()
                .map(str::to_string)
                .collect(),
            fallback: self.state.fallback.clone(),
        }
    }
}

impl StoryEngineBuilder {
    pub fn story_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.story_file = Some(path.into());
        self
    }

    /// Provide a story directly (for testing without files).
    pub fn with_story(mut self, story: Story) -> Self {
        self.story = Some(Arc::new(story));
        self
    }

    /// Share one loaded story between several engines.
    pub fn with_shared_story(mut self, story: Arc<Story>) -> Self {
        self.story = Some(story);
        self
    }

    /// Reject stories containing dangling `next` references.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Override one of the story's initial attribute values.
    pub fn initial_attribute(mut self, name: &str, value: i64) -> Self {
        self.attribute_overrides.push((name.to_string(), value));
        self
    }

    pub fn build(self) -> Result<StoryEngine, EngineError> {
        let story = match (self.story, self.story_file) {
            (Some(story), _) => story,
            (None, Some(path)) => Arc::new(Story::load_from_ron(&path)?),
            (None, None) => return Err(EngineError::MissingStory),
        };

        if self.strict {
            story.ensure_resolved()?;
        }

        let mut initial_attributes = story.config().initial_attributes.clone();
        for (name, value) in self.attribute_overrides {
            initial_attributes.set(name, value);
        }

        Ok(StoryEngine::with_initial_attributes(story, initial_attributes))
    }
}
