/// Seeded random playthroughs, for smoke-testing authored stories.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;

use crate::core::engine::{DataIntegrityFallback, EngineError, Phase, StoryEngine};
use crate::core::story::Story;

/// Outcome of one random playthrough.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoplayReport {
    /// Ending reached, if the game ended within the step limit.
    pub ending: Option<String>,
    /// Number of choices resolved.
    pub steps: usize,
    pub history: Vec<String>,
    /// True if play stopped at a node where no choice was visible.
    pub stranded: bool,
    pub fallback: Option<DataIntegrityFallback>,
}

/// Play one game by reading every line and picking uniformly among the
/// visible choices, until an ending, a dead end, or `max_steps` choices.
pub fn random_playthrough(
    story: Arc<Story>,
    seed: u64,
    max_steps: usize,
) -> Result<AutoplayReport, EngineError> {
    let mut engine = StoryEngine::new(story);
    play(&mut engine, seed, max_steps)
}

/// Like [`random_playthrough`], continuing from the engine's current state.
pub fn play(
    engine: &mut StoryEngine,
    seed: u64,
    max_steps: usize,
) -> Result<AutoplayReport, EngineError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut steps = 0;
    let mut stranded = false;

    while engine.phase() == Phase::Playing && steps < max_steps {
        let view = engine.current_view();
        if view.choice_ids().is_empty() {
            let cursor = engine.playthrough().cursor;
            engine.advance_dialogue();
            if engine.playthrough().cursor == cursor {
                stranded = true;
                break;
            }
            continue;
        }

        let ids: Vec<String> = view.choice_ids().into_iter().map(str::to_string).collect();
        if let Some(id) = ids.choose(&mut rng) {
            engine.resolve_choice(id)?;
            steps += 1;
        }
    }

    let state = engine.playthrough();
    Ok(AutoplayReport {
        ending: state.ending.clone(),
        steps,
        history: state.history.clone(),
        stranded,
        fallback: state.fallback.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOOP_STORY: &str = r#"Story(
        config: (start: "hall", fallback_ending: "lost", initial_attributes: {"day": 1}),
        nodes: [
            (
                id: "hall",
                dialogue: [(speaker: "narrator", text: "Doors everywhere.")],
                choices: [
                    (id: "wait", text: "Wait.", effect: (deltas: {"day": 1}), next: "hall"),
                    (id: "north", text: "North.", next: "garden"),
                    (id: "south", text: "South.", next: "nowhere"),
                ],
            ),
            (
                id: "garden",
                choices: [
                    (id: "rest", text: "Rest.", next: "home"),
                    (id: "dig", text: "Dig.", condition: (has_items: ["spade"]), next: "treasure"),
                ],
            ),
            (
                id: "locked",
                choices: [
                    (id: "unlock", text: "Unlock.", condition: (has_items: ["key"]), next: "home"),
                ],
            ),
        ],
        endings: [
            (id: "home", text: "You go home."),
            (id: "treasure", text: "Gold."),
            (id: "lost", text: "You are lost."),
        ],
    )"#;

    fn story() -> Arc<Story> {
        Arc::new(Story::parse_ron(LOOP_STORY).unwrap())
    }

    #[test]
    fn same_seed_same_report() {
        let a = random_playthrough(story(), 7, 100).unwrap();
        let b = random_playthrough(story(), 7, 100).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn playthrough_terminates() {
        for seed in 0..50 {
            let report = random_playthrough(story(), seed, 500).unwrap();
            assert!(!report.stranded);
            let ending = report.ending.expect("game should end");
            assert!(["home", "lost"].contains(&ending.as_str()), "got {ending}");
            assert_eq!(report.steps, report.history.len());
            if ending == "lost" {
                assert_eq!(report.fallback.map(|f| f.target), Some("nowhere".to_string()));
            }
        }
    }

    #[test]
    fn step_limit_respected() {
        let report = random_playthrough(story(), 3, 0).unwrap();
        assert_eq!(report.steps, 0);
        assert!(report.ending.is_none());
    }

    #[test]
    fn stranded_when_nothing_visible() {
        let mut engine = StoryEngine::new(story());
        let mut saved = engine.snapshot();
        saved.node = "locked".to_string();
        saved.cursor = 0;
        engine.restore(saved).unwrap();

        let report = play(&mut engine, 1, 10).unwrap();
        assert!(report.stranded);
        assert!(report.ending.is_none());
        assert_eq!(report.steps, 0);
    }
}
