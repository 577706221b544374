//! WASM bindings for story-engine — drives the browser renderer for the
//! embedded narrative games.

use std::sync::Arc;
use wasm_bindgen::prelude::*;

use story_engine::core::engine::{Playthrough, StoryEngine, View};
use story_engine::core::story::Story;

// ---------------------------------------------------------------------------
// Embedded stories — compiled into the WASM binary
// ---------------------------------------------------------------------------
mod data {
    pub const MIDNIGHT_CAFE: &str = include_str!("../../story_data/midnight_cafe/story.ron");
    pub const NIGHT_MARKET: &str = include_str!("../../story_data/night_market/story.ron");
}

const STORY_NAMES: [&str; 2] = ["midnight_cafe", "night_market"];

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
struct StoryInfo {
    name: String,
    start: String,
    nodes: usize,
    endings: Vec<EndingInfo>,
}

#[derive(serde::Serialize)]
struct EndingInfo {
    id: String,
    title: String,
}

fn story_source(name: &str) -> Option<&'static str> {
    match name {
        "midnight_cafe" => Some(data::MIDNIGHT_CAFE),
        "night_market" => Some(data::NIGHT_MARKET),
        _ => None,
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsError> {
    serde_json::to_string(value).map_err(|e| JsError::new(&format!("Serialization error: {e}")))
}

// ---------------------------------------------------------------------------
// StoryPlayer — the main exported struct
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct StoryPlayer {
    engine: StoryEngine,
    name: String,
}

#[wasm_bindgen]
impl StoryPlayer {
    /// Start a new game of one of the embedded stories.
    #[wasm_bindgen(constructor)]
    pub fn new(name: &str) -> Result<StoryPlayer, JsError> {
        let source =
            story_source(name).ok_or_else(|| JsError::new(&format!("Unknown story: {name}")))?;
        let mut player = Self::from_ron(source)?;
        player.name = name.to_string();
        Ok(player)
    }

    /// Start a new game of a story supplied as RON text.
    pub fn from_ron(source: &str) -> Result<StoryPlayer, JsError> {
        let story = Story::parse_ron(source)
            .map_err(|e| JsError::new(&format!("Story parse error: {e}")))?;
        Ok(StoryPlayer {
            engine: StoryEngine::new(Arc::new(story)),
            name: "custom".to_string(),
        })
    }

    /// Discard the current playthrough. Returns the new view as JSON.
    pub fn start_new_game(&mut self) -> Result<String, JsError> {
        to_json(&self.engine.start_new_game())
    }

    /// Current view as JSON.
    ///
    /// While playing:
    /// ```json
    /// {
    ///   "phase": "playing",
    ///   "node_id": "counter",
    ///   "scene": "cafe_counter",
    ///   "line": { "speaker": "hana", "text": "What can I get you?" },
    ///   "cursor": 1,
    ///   "line_count": 2,
    ///   "choices": [{ "id": "order_coffee", "text": "Black coffee." }]
    /// }
    /// ```
    /// After an ending, `phase` is `"ended"` and the object carries
    /// `ending_id`, `title`, `text`, `attributes`, `inventory`, `fallback`.
    pub fn view(&self) -> Result<String, JsError> {
        to_json(&self.engine.current_view())
    }

    pub fn advance_dialogue(&mut self) -> Result<String, JsError> {
        to_json(&self.engine.advance_dialogue())
    }

    /// Resolve a visible choice. Illegal choices are reported as errors;
    /// the renderer should re-render the current view.
    pub fn resolve_choice(&mut self, choice_id: &str) -> Result<String, JsError> {
        let view: View = self
            .engine
            .resolve_choice(choice_id)
            .map_err(|e| JsError::new(&e.to_string()))?;
        to_json(&view)
    }

    pub fn is_ended(&self) -> bool {
        self.engine.current_view().is_ended()
    }

    /// Serialize the current playthrough for the host to store.
    pub fn save(&self) -> Result<String, JsError> {
        to_json(&self.engine.snapshot())
    }

    /// Restore a playthrough produced by `save`. Returns the restored view.
    pub fn load(&mut self, saved_json: &str) -> Result<String, JsError> {
        let saved: Playthrough = serde_json::from_str(saved_json)
            .map_err(|e| JsError::new(&format!("Invalid save JSON: {e}")))?;
        let view = self
            .engine
            .restore(saved)
            .map_err(|e| JsError::new(&e.to_string()))?;
        to_json(&view)
    }

    /// JSON description of the loaded story.
    pub fn story_info(&self) -> Result<String, JsError> {
        let story = self.engine.story();
        let info = StoryInfo {
            name: self.name.clone(),
            start: story.start().to_string(),
            nodes: story.nodes().len(),
            endings: story
                .endings()
                .iter()
                .map(|e| EndingInfo {
                    id: e.id.clone(),
                    title: e.title.clone(),
                })
                .collect(),
        };
        to_json(&info)
    }

    /// JSON array of embedded story names.
    pub fn available_stories() -> String {
        serde_json::to_string(&STORY_NAMES).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_stories_parse() {
        for name in STORY_NAMES {
            let source = story_source(name).unwrap();
            let story = Story::parse_ron_strict(source).unwrap();
            assert!(story.node(story.start()).is_some(), "{name}");
        }
    }

    #[test]
    fn view_serializes_with_phase_tag() {
        let story = Story::parse_ron(data::MIDNIGHT_CAFE).unwrap();
        let engine = StoryEngine::new(Arc::new(story));
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&engine.current_view()).unwrap()).unwrap();
        assert_eq!(json["phase"], "playing");
        assert_eq!(json["node_id"], "arrival");
        assert_eq!(json["line"]["speaker"], "narrator");
    }

    #[test]
    fn save_round_trips_through_json() {
        let story = Arc::new(Story::parse_ron(data::NIGHT_MARKET).unwrap());
        let mut engine = StoryEngine::new(Arc::clone(&story));
        engine.advance_dialogue();
        engine.resolve_choice("browse").unwrap();
        engine.resolve_choice("perform").unwrap();

        let saved = serde_json::to_string(&engine.snapshot()).unwrap();
        let mut other = StoryEngine::new(story);
        other
            .restore(serde_json::from_str(&saved).unwrap())
            .unwrap();
        assert_eq!(other.snapshot(), engine.snapshot());
        assert_eq!(other.playthrough().attributes.get("money"), 45);
    }
}
