//! HTTP boundary for the GenVN backend.
//!
//! Thin axum layer over the asset and story services: request validation,
//! error mapping to structured JSON failures, and NDJSON streaming of
//! generation output.

mod error;
mod handlers;
mod router;
mod server;

pub use error::{ApiError, GatewayError};
pub use router::build_router;
pub use server::{AppState, GatewayServer};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use genvn_assets::{
        AssetIndexer, AssetSearcher, IndexerConfig, SearchOptions, SearcherConfig,
    };
    use genvn_embed::mock::MockEmbedder;
    use genvn_llm::mock::MockChatModel;
    use genvn_store::memory::InMemoryAssetStore;
    use genvn_store::{CollectionSpec, DistanceMetric};
    use genvn_story::{StaticLore, StoryConfig, StoryEngine};

    use crate::server::AppState;

    pub(crate) fn app_state(lore: &[&str]) -> AppState {
        let store = Arc::new(InMemoryAssetStore::new(CollectionSpec {
            name: "test_assets".into(),
            vector_dim: 4,
            metric: DistanceMetric::Cosine,
        }));
        let embedder = Arc::new(MockEmbedder::new(4));
        let chat = Arc::new(MockChatModel::default());

        let indexer = Arc::new(AssetIndexer::new(
            store.clone(),
            embedder.clone(),
            chat.clone(),
            IndexerConfig::new(std::env::temp_dir()),
        ));
        let searcher = Arc::new(AssetSearcher::new(
            store,
            embedder,
            chat.clone(),
            SearcherConfig::default(),
        ));
        let story = Arc::new(StoryEngine::new(
            chat,
            Arc::new(StaticLore::new(
                lore.iter().map(|s| (*s).to_owned()).collect(),
            )),
            StoryConfig::default(),
        ));

        AppState::new(indexer, searcher, story, false, SearchOptions::default())
    }
}
