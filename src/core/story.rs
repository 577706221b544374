/// Story catalog — authored nodes, endings, and new-game configuration,
/// loaded from RON and validated once.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::schema::attributes::Attributes;
use crate::schema::condition::{Clause, Condition};
use crate::schema::effect::Effect;
use crate::schema::node::{Choice, DialogueLine, Ending, EventNode, Target};

#[derive(Debug, Error)]
pub enum StoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("id '{0}' is defined more than once")]
    DuplicateId(String),
    #[error("node '{node}' defines choice '{choice}' more than once")]
    DuplicateChoice { node: String, choice: String },
    #[error("node '{0}' offers no choices")]
    NoChoices(String),
    #[error("start node '{0}' is not defined")]
    MissingStart(String),
    #[error("fallback ending '{0}' is not defined")]
    MissingFallback(String),
    #[error("{location}: '{attribute}' must be within [{min}, {max}], which is empty")]
    ImpossibleRange {
        location: String,
        attribute: String,
        min: i64,
        max: i64,
    },
    #[error("choice '{choice}' in node '{node}' leads to unknown id '{target}'")]
    DanglingReference {
        node: String,
        choice: String,
        target: String,
    },
}

/// New-game configuration carried by every story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryConfig {
    /// Node a new playthrough starts at.
    pub start: String,
    /// Ending used when a choice leads to an id the story does not define.
    pub fallback_ending: String,
    #[serde(default)]
    pub initial_attributes: Attributes,
}

/// A choice whose `next` names neither a node nor an ending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    pub node: String,
    pub choice: String,
    pub target: String,
}

/// A validated, read-only story catalog.
#[derive(Debug, Clone)]
pub struct Story {
    config: StoryConfig,
    nodes: Vec<EventNode>,
    endings: Vec<Ending>,
    node_index: FxHashMap<String, usize>,
    ending_index: FxHashMap<String, usize>,
}

// The authored RON shape differs from the validated types: conditions are
// written as min/max maps and `next` is a bare id.

#[derive(Debug, Deserialize)]
#[serde(rename = "Story")]
struct RonStory {
    config: StoryConfig,
    nodes: Vec<RonNode>,
    #[serde(default)]
    endings: Vec<RonEnding>,
}

#[derive(Debug, Deserialize)]
struct RonNode {
    id: String,
    #[serde(default)]
    scene: String,
    #[serde(default)]
    dialogue: Vec<DialogueLine>,
    #[serde(default)]
    choices: Vec<RonChoice>,
}

#[derive(Debug, Deserialize)]
struct RonChoice {
    id: String,
    text: String,
    #[serde(default)]
    condition: RonCondition,
    #[serde(default)]
    effect: Effect,
    next: String,
}

#[derive(Debug, Default, Deserialize)]
struct RonCondition {
    #[serde(default)]
    min: BTreeMap<String, i64>,
    #[serde(default)]
    max: BTreeMap<String, i64>,
    #[serde(default)]
    has_items: Vec<String>,
    #[serde(default)]
    min_items: usize,
}

#[derive(Debug, Deserialize)]
struct RonEnding {
    id: String,
    #[serde(default)]
    title: String,
    text: String,
    #[serde(default)]
    triggers: RonCondition,
}

impl RonCondition {
    fn lower(self) -> Condition {
        let mut clauses = Vec::new();
        for (attribute, min) in self.min {
            clauses.push(Clause::AtLeast { attribute, min });
        }
        for (attribute, max) in self.max {
            clauses.push(Clause::AtMost { attribute, max });
        }
        for item in self.has_items {
            clauses.push(Clause::HasItem(item));
        }
        if self.min_items > 0 {
            clauses.push(Clause::DistinctItems(self.min_items));
        }
        Condition { clauses }
    }
}

impl Story {
    /// Load a story from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<Story, StoryError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a story from a RON string.
    ///
    /// Choices leading to unknown ids are accepted and resolve to the
    /// fallback ending at runtime. Use [`Story::parse_ron_strict`] to
    /// reject them instead.
    pub fn parse_ron(input: &str) -> Result<Story, StoryError> {
        let raw: RonStory = ron::from_str(input)?;

        let nodes = raw
            .nodes
            .into_iter()
            .map(|node| EventNode {
                id: node.id,
                scene: node.scene,
                dialogue: node.dialogue,
                choices: node
                    .choices
                    .into_iter()
                    .map(|c| Choice {
                        id: c.id,
                        text: c.text,
                        condition: c.condition.lower(),
                        effect: c.effect,
                        next: Target::Unresolved(c.next),
                    })
                    .collect(),
            })
            .collect();

        let endings = raw
            .endings
            .into_iter()
            .map(|e| Ending {
                id: e.id,
                title: e.title,
                text: e.text,
                triggers: e.triggers.lower(),
            })
            .collect();

        let story = Self::from_parts(raw.config, nodes, endings)?;
        info!(
            nodes = story.nodes.len(),
            endings = story.endings.len(),
            start = %story.config.start,
            "loaded story"
        );
        Ok(story)
    }

    /// Parse a story and reject any dangling `next` reference.
    pub fn parse_ron_strict(input: &str) -> Result<Story, StoryError> {
        let story = Self::parse_ron(input)?;
        story.ensure_resolved()?;
        Ok(story)
    }

    /// Build a story from already-constructed parts.
    ///
    /// Every choice's `next` is reclassified against the ids present, so
    /// callers may pass any `Target` variant.
    pub fn from_parts(
        config: StoryConfig,
        mut nodes: Vec<EventNode>,
        endings: Vec<Ending>,
    ) -> Result<Story, StoryError> {
        let mut node_index = FxHashMap::default();
        let mut ending_index = FxHashMap::default();

        for (i, node) in nodes.iter().enumerate() {
            if node_index.insert(node.id.clone(), i).is_some() {
                return Err(StoryError::DuplicateId(node.id.clone()));
            }
        }
        for (i, ending) in endings.iter().enumerate() {
            if node_index.contains_key(&ending.id)
                || ending_index.insert(ending.id.clone(), i).is_some()
            {
                return Err(StoryError::DuplicateId(ending.id.clone()));
            }
        }

        if !node_index.contains_key(&config.start) {
            return Err(StoryError::MissingStart(config.start));
        }
        if !ending_index.contains_key(&config.fallback_ending) {
            return Err(StoryError::MissingFallback(config.fallback_ending));
        }

        for node in &mut nodes {
            if node.choices.is_empty() {
                return Err(StoryError::NoChoices(node.id.clone()));
            }
            let mut seen = FxHashSet::default();
            for choice in &mut node.choices {
                if !seen.insert(choice.id.clone()) {
                    return Err(StoryError::DuplicateChoice {
                        node: node.id.clone(),
                        choice: choice.id.clone(),
                    });
                }
                check_ranges(
                    &choice.condition,
                    || format!("choice '{}' in node '{}'", choice.id, node.id),
                )?;

                let id = choice.next.id().to_string();
                choice.next = if node_index.contains_key(&id) {
                    Target::Node(id)
                } else if ending_index.contains_key(&id) {
                    Target::Ending(id)
                } else {
                    Target::Unresolved(id)
                };
            }
        }
        for ending in &endings {
            check_ranges(&ending.triggers, || format!("ending '{}'", ending.id))?;
        }

        Ok(Story {
            config,
            nodes,
            endings,
            node_index,
            ending_index,
        })
    }

    pub fn config(&self) -> &StoryConfig {
        &self.config
    }

    pub fn start(&self) -> &str {
        &self.config.start
    }

    pub fn fallback_ending(&self) -> &str {
        &self.config.fallback_ending
    }

    pub fn node(&self, id: &str) -> Option<&EventNode> {
        self.node_index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn ending(&self, id: &str) -> Option<&Ending> {
        self.ending_index.get(id).map(|&i| &self.endings[i])
    }

    /// Nodes in authored order.
    pub fn nodes(&self) -> &[EventNode] {
        &self.nodes
    }

    /// Endings in authored order.
    pub fn endings(&self) -> &[Ending] {
        &self.endings
    }

    /// Every choice whose `next` could not be resolved, in authored order.
    pub fn dangling_references(&self) -> Vec<DanglingReference> {
        let mut dangling = Vec::new();
        for node in &self.nodes {
            for choice in &node.choices {
                if let Target::Unresolved(target) = &choice.next {
                    dangling.push(DanglingReference {
                        node: node.id.clone(),
                        choice: choice.id.clone(),
                        target: target.clone(),
                    });
                }
            }
        }
        dangling
    }

    /// Fail on the first dangling reference.
    pub fn ensure_resolved(&self) -> Result<(), StoryError> {
        match self.dangling_references().into_iter().next() {
            Some(d) => Err(StoryError::DanglingReference {
                node: d.node,
                choice: d.choice,
                target: d.target,
            }),
            None => Ok(()),
        }
    }
}

/// Reject a condition that bounds one attribute to an empty range.
fn check_ranges<F>(condition: &Condition, location: F) -> Result<(), StoryError>
where
    F: Fn() -> String,
{
    let mut mins: BTreeMap<&str, i64> = BTreeMap::new();
    let mut maxs: BTreeMap<&str, i64> = BTreeMap::new();
    for clause in &condition.clauses {
        match clause {
            Clause::AtLeast { attribute, min } => {
                let entry = mins.entry(attribute.as_str()).or_insert(*min);
                *entry = (*entry).max(*min);
            }
            Clause::AtMost { attribute, max } => {
                let entry = maxs.entry(attribute.as_str()).or_insert(*max);
                *entry = (*entry).min(*max);
            }
            Clause::HasItem(_) | Clause::DistinctItems(_) => {}
        }
    }
    for (attribute, min) in mins {
        if let Some(&max) = maxs.get(attribute) {
            if min > max {
                return Err(StoryError::ImpossibleRange {
                    location: location(),
                    attribute: attribute.to_string(),
                    min,
                    max,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_STORY: &str = r#"Story(
        config: (
            start: "door",
            fallback_ending: "normal_end",
            initial_attributes: {"affection": 0, "alertness": 40},
        ),
        nodes: [
            (
                id: "door",
                scene: "cafe_front",
                dialogue: [
                    (speaker: "narrator", text: "Rain taps the awning."),
                    (speaker: "hana", text: "Coming in?"),
                ],
                choices: [
                    (
                        id: "enter",
                        text: "Step inside.",
                        effect: (deltas: {"affection": 5}),
                        next: "counter",
                    ),
                    (id: "walk_away", text: "Keep walking.", next: "normal_end"),
                ],
            ),
            (
                id: "counter",
                choices: [
                    (
                        id: "confess",
                        text: "Tell her the truth.",
                        condition: (min: {"affection": 60}, has_items: ["letter"]),
                        next: "true_end",
                    ),
                    (id: "stammer", text: "Say nothing.", next: "missing_node"),
                ],
            ),
        ],
        endings: [
            (id: "normal_end", title: "Normal", text: "Just another night."),
            (
                id: "true_end",
                title: "True",
                text: "The rain stops.",
                triggers: (min: {"affection": 60}),
            ),
        ],
    )"#;

    #[test]
    fn parse_small_story() {
        let story = Story::parse_ron(SMALL_STORY).unwrap();
        assert_eq!(story.start(), "door");
        assert_eq!(story.fallback_ending(), "normal_end");
        assert_eq!(story.nodes().len(), 2);
        assert_eq!(story.endings().len(), 2);
        assert_eq!(story.config().initial_attributes.get("alertness"), 40);

        let door = story.node("door").unwrap();
        assert_eq!(door.scene, "cafe_front");
        assert_eq!(door.dialogue.len(), 2);
        assert_eq!(door.dialogue[1].speaker, "hana");
        assert_eq!(door.choices[0].effect.deltas.get("affection"), Some(&5));
    }

    #[test]
    fn targets_are_classified() {
        let story = Story::parse_ron(SMALL_STORY).unwrap();
        let door = story.node("door").unwrap();
        assert_eq!(door.choices[0].next, Target::Node("counter".to_string()));
        assert_eq!(door.choices[1].next, Target::Ending("normal_end".to_string()));

        let counter = story.node("counter").unwrap();
        assert_eq!(
            counter.choices[1].next,
            Target::Unresolved("missing_node".to_string())
        );
    }

    #[test]
    fn conditions_are_lowered() {
        let story = Story::parse_ron(SMALL_STORY).unwrap();
        let confess = story.node("counter").unwrap().choice("confess").unwrap();
        assert_eq!(
            confess.condition.clauses,
            vec![
                Clause::AtLeast {
                    attribute: "affection".to_string(),
                    min: 60
                },
                Clause::HasItem("letter".to_string()),
            ]
        );
        assert!(story.node("door").unwrap().choices[0]
            .condition
            .is_unconditional());
        assert_eq!(story.ending("true_end").unwrap().triggers.clauses.len(), 1);
    }

    #[test]
    fn dangling_references_listed() {
        let story = Story::parse_ron(SMALL_STORY).unwrap();
        assert_eq!(
            story.dangling_references(),
            vec![DanglingReference {
                node: "counter".to_string(),
                choice: "stammer".to_string(),
                target: "missing_node".to_string(),
            }]
        );
        assert!(matches!(
            Story::parse_ron_strict(SMALL_STORY),
            Err(StoryError::DanglingReference { target, .. }) if target == "missing_node"
        ));
    }

    #[test]
    fn missing_start_rejected() {
        let input = SMALL_STORY.replace(r#"start: "door""#, r#"start: "attic""#);
        assert!(matches!(
            Story::parse_ron(&input),
            Err(StoryError::MissingStart(id)) if id == "attic"
        ));
    }

    #[test]
    fn missing_fallback_rejected() {
        let input = SMALL_STORY.replace(
            r#"fallback_ending: "normal_end""#,
            r#"fallback_ending: "nowhere""#,
        );
        assert!(matches!(
            Story::parse_ron(&input),
            Err(StoryError::MissingFallback(id)) if id == "nowhere"
        ));
    }

    #[test]
    fn node_and_ending_share_namespace() {
        let input = SMALL_STORY.replace(r#"(id: "normal_end", title"#, r#"(id: "counter", title"#);
        assert!(matches!(
            Story::parse_ron(&input),
            Err(StoryError::DuplicateId(id)) if id == "counter"
        ));
    }

    #[test]
    fn duplicate_choice_rejected() {
        let input = SMALL_STORY.replace(r#"id: "walk_away""#, r#"id: "enter""#);
        assert!(matches!(
            Story::parse_ron(&input),
            Err(StoryError::DuplicateChoice { node, choice }) if node == "door" && choice == "enter"
        ));
    }

    #[test]
    fn empty_range_rejected() {
        let input = SMALL_STORY.replace(
            r#"condition: (min: {"affection": 60}, has_items: ["letter"])"#,
            r#"condition: (min: {"affection": 60}, max: {"affection": 10})"#,
        );
        assert!(matches!(
            Story::parse_ron(&input),
            Err(StoryError::ImpossibleRange { attribute, min: 60, max: 10, .. }) if attribute == "affection"
        ));
    }

    #[test]
    fn node_without_choices_rejected() {
        let input = r#"Story(
            config: (start: "a", fallback_ending: "end"),
            nodes: [(id: "a", dialogue: [(speaker: "x", text: "...")])],
            endings: [(id: "end", text: "Done.")],
        )"#;
        assert!(matches!(
            Story::parse_ron(input),
            Err(StoryError::NoChoices(id)) if id == "a"
        ));
    }

    #[test]
    fn from_parts_reclassifies_targets() {
        let config = StoryConfig {
            start: "a".to_string(),
            fallback_ending: "end".to_string(),
            initial_attributes: Attributes::new(),
        };
        let nodes = vec![EventNode {
            id: "a".to_string(),
            scene: String::new(),
            dialogue: Vec::new(),
            choices: vec![Choice {
                id: "go".to_string(),
                text: "Go".to_string(),
                condition: Condition::always(),
                effect: Effect::default(),
                next: Target::Node("end".to_string()),
            }],
        }];
        let endings = vec![Ending {
            id: "end".to_string(),
            title: String::new(),
            text: "Done.".to_string(),
            triggers: Condition::always(),
        }];
        let story = Story::from_parts(config, nodes, endings).unwrap();
        assert_eq!(
            story.node("a").unwrap().choices[0].next,
            Target::Ending("end".to_string())
        );
    }

    #[test]
    fn load_test_story_from_ron() {
        let path = std::path::PathBuf::from("tests/fixtures/test_story.ron");
        let story = Story::load_from_ron(&path).unwrap();
        assert_eq!(story.start(), "intro");
        assert!(story.ending(story.fallback_ending()).is_some());
    }

    #[test]
    fn malformed_ron_is_an_error() {
        assert!(matches!(
            Story::parse_ron("Story(config: ("),
            Err(StoryError::Ron(_))
        ));
    }
}
