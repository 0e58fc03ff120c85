use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use genvn_llm::Role;

/// A character currently on screen.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CharacterState {
    pub name: String,
    /// Sprite emotion; the frontend defaults to a neutral face when absent.
    #[serde(default)]
    pub emotion: Option<String>,
    /// Free-form per-character variables passed through from the engine.
    #[serde(default)]
    pub vars: HashMap<String, serde_json::Value>,
}

impl CharacterState {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            emotion: None,
            vars: HashMap::new(),
        }
    }
}

/// One prior conversation turn replayed into the prompt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: Role,
    pub content: String,
}

/// Narrow the output grammar to a single form for this turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnIntent {
    Dialogue,
    Narration,
    Choices,
}

/// Everything needed to generate the next story turn. Assembled per request,
/// never persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoryRequest {
    /// Identifies the scene in the story graph.
    pub scene_id: String,
    /// Rollback/context lines from the frontend.
    #[serde(default)]
    pub context: Vec<String>,
    #[serde(default, alias = "active_chars")]
    pub active_characters: Vec<CharacterState>,
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
    /// The player's choice from the previous turn; becomes the final user
    /// message.
    pub user_choice: String,
    #[serde(default)]
    pub intent: Option<TurnIntent>,
}

/// Aggregated (non-streaming) generation result.
#[derive(Clone, Debug, Serialize)]
pub struct StoryReply {
    pub text: String,
}
