/// Authoring checks for stories: broken links, unreachable content, and
/// conditions that can never hold.

use rustc_hash::FxHashSet;
use std::collections::VecDeque;

use crate::core::story::Story;
use crate::schema::condition::Clause;
use crate::schema::node::Target;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LintReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

pub fn lint(story: &Story) -> LintReport {
    let mut report = LintReport::default();

    for d in story.dangling_references() {
        report.errors.push(format!(
            "choice '{}' in node '{}' leads to unknown id '{}'",
            d.choice, d.node, d.target
        ));
    }

    check_reachability(story, &mut report);
    check_conditional_nodes(story, &mut report);
    check_condition_inputs(story, &mut report);

    report
}

/// Walk every `next` link from the start node, ignoring conditions.
fn check_reachability(story: &Story, report: &mut LintReport) {
    let mut seen_nodes: FxHashSet<&str> = FxHashSet::default();
    let mut seen_endings: FxHashSet<&str> = FxHashSet::default();
    let mut queue = VecDeque::from([story.start()]);
    seen_nodes.insert(story.start());

    while let Some(id) = queue.pop_front() {
        let Some(node) = story.node(id) else {
            continue;
        };
        for choice in &node.choices {
            match &choice.next {
                Target::Node(next) => {
                    if seen_nodes.insert(next.as_str()) {
                        queue.push_back(next.as_str());
                    }
                }
                Target::Ending(ending) => {
                    seen_endings.insert(ending.as_str());
                }
                Target::Unresolved(_) => {
                    seen_endings.insert(story.fallback_ending());
                }
            }
        }
    }

    for node in story.nodes() {
        if !seen_nodes.contains(node.id.as_str()) {
            report
                .warnings
                .push(format!("node '{}' is unreachable from '{}'", node.id, story.start()));
        }
    }
    for ending in story.endings() {
        // The fallback ending only needs to exist.
        if ending.id != story.fallback_ending() && !seen_endings.contains(ending.id.as_str()) {
            report
                .warnings
                .push(format!("ending '{}' is unreachable from '{}'", ending.id, story.start()));
        }
    }
}

fn check_conditional_nodes(story: &Story, report: &mut LintReport) {
    for node in story.nodes() {
        if node.choices.iter().all(|c| !c.condition.is_unconditional()) {
            report.warnings.push(format!(
                "every choice in node '{}' is conditional; players may be stranded there",
                node.id
            ));
        }
    }
}

/// Flag attributes and items that choice conditions or ending triggers read
/// but nothing ever provides.
fn check_condition_inputs(story: &Story, report: &mut LintReport) {
    let mut known_attributes: FxHashSet<&str> = story
        .config()
        .initial_attributes
        .iter()
        .map(|(name, _)| name)
        .collect();
    let mut granted_items: FxHashSet<&str> = FxHashSet::default();

    for node in story.nodes() {
        for choice in &node.choices {
            known_attributes.extend(choice.effect.deltas.keys().map(String::as_str));
            granted_items.extend(choice.effect.gain_items.iter().map(String::as_str));
        }
    }

    let readers = story
        .nodes()
        .iter()
        .flat_map(|node| {
            node.choices.iter().map(move |choice| {
                (
                    format!("choice '{}' in node '{}'", choice.id, node.id),
                    &choice.condition,
                )
            })
        })
        .chain(
            story
                .endings()
                .iter()
                .map(|ending| (format!("triggers of ending '{}'", ending.id), &ending.triggers)),
        );

    let mut reported: FxHashSet<String> = FxHashSet::default();
    for (reader, condition) in readers {
        for clause in &condition.clauses {
            let warning = match clause {
                Clause::AtLeast { attribute, .. } | Clause::AtMost { attribute, .. }
                    if !known_attributes.contains(attribute.as_str()) =>
                {
                    format!("attribute '{attribute}' is read by {reader} but never set")
                }
                Clause::HasItem(item) if !granted_items.contains(item.as_str()) => {
                    format!("item '{item}' is required by {reader} but never granted")
                }
                _ => continue,
            };
            if reported.insert(warning.clone()) {
                report.warnings.push(warning);
            }
        }
    }
}
