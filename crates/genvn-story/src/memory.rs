//! Pluggable lore retrieval.
//!
//! The real story-graph memory store is an external collaborator; generation
//! only needs "zero or more prior statements relevant to the scene". The
//! trait keeps that seam open while [`StaticLore`] stands in for it.

use std::future::Future;
use std::pin::Pin;

use crate::error::StoryError;
use crate::types::CharacterState;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait LoreRetriever: Send + Sync {
    /// Fetch lore fragments relevant to the scene and cast.
    fn retrieve<'a>(
        &'a self,
        scene_id: &'a str,
        context: &'a [String],
        user_choice: &'a str,
        active_characters: &'a [CharacterState],
    ) -> BoxFuture<'a, Result<Vec<String>, StoryError>>;
}

/// Fixed-fragment placeholder until the story-graph store lands.
#[derive(Clone, Debug, Default)]
pub struct StaticLore {
    fragments: Vec<String>,
}

impl StaticLore {
    #[must_use]
    pub fn new(fragments: Vec<String>) -> Self {
        Self { fragments }
    }
}

impl LoreRetriever for StaticLore {
    fn retrieve<'a>(
        &'a self,
        scene_id: &'a str,
        _context: &'a [String],
        _user_choice: &'a str,
        _active_characters: &'a [CharacterState],
    ) -> BoxFuture<'a, Result<Vec<String>, StoryError>> {
        Box::pin(async move {
            tracing::debug!(scene_id, fragments = self.fragments.len(), "static lore served");
            Ok(self.fragments.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_lore_returns_configured_fragments() {
        let lore = StaticLore::new(vec!["Mara fears open water.".into()]);
        let fragments = lore.retrieve("s1", &[], "dive in", &[]).await.unwrap();
        assert_eq!(fragments, vec!["Mara fears open water.".to_string()]);
    }

    #[tokio::test]
    async fn default_is_empty() {
        let lore = StaticLore::default();
        let fragments = lore.retrieve("s1", &[], "go", &[]).await.unwrap();
        assert!(fragments.is_empty());
    }
}
