//! Retrieval-augmented story generation.
//!
//! [`StoryEngine`] pulls lore from a pluggable [`LoreRetriever`], builds a
//! deterministic grammar-constrained prompt, and drives the chat model in
//! streaming or single-shot mode.

mod engine;
mod error;
pub mod memory;
pub mod prompt;
mod types;

pub use engine::{StoryConfig, StoryEngine, StoryEvent, StoryStream};
pub use error::StoryError;
pub use memory::{LoreRetriever, StaticLore};
pub use types::{CharacterState, HistoryTurn, StoryReply, StoryRequest, TurnIntent};
