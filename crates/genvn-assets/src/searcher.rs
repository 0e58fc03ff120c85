//! Semantic asset search with optional query rewriting.

use std::sync::Arc;

use serde::Serialize;

use genvn_embed::Embedder;
use genvn_llm::{ChatModel, ChatOptions, Message};
use genvn_store::AssetStore;

use crate::embed_task;
use crate::error::AssetError;

const REWRITE_PROMPT: &str = "Rewrite the user's scene request as a short, \
concrete image-search description. Keep nouns and visual attributes, drop \
narrative filler. Reply with the rewritten query only.";

/// Query-time default for the HNSW `ef` search breadth.
///
/// Deliberately independent of the build-time `ef_construct` default on
/// [`genvn_store::IndexParams`]; the two ends of the recall/latency
/// trade-off are tuned separately.
pub const DEFAULT_SEARCH_BREADTH: u64 = 64;

pub const DEFAULT_K: usize = 5;

/// Per-query knobs. Every default here is explicit and caller-overridable.
#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    /// Ask the chat model to rewrite the query before embedding it.
    pub rewrite: bool,
    pub k: usize,
    /// HNSW `ef` for this query; higher trades latency for recall.
    pub search_breadth: u64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            rewrite: false,
            k: DEFAULT_K,
            search_breadth: DEFAULT_SEARCH_BREADTH,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearcherConfig {
    /// Upper bound on the rewritten query length, in characters. The model's
    /// raw output is otherwise unvalidated.
    pub max_rewrite_len: usize,
}

impl Default for SearcherConfig {
    fn default() -> Self {
        Self {
            max_rewrite_len: 512,
        }
    }
}

/// One search hit, ascending by distance, carrying the query that was
/// actually embedded (after any rewrite) for caller transparency.
#[derive(Debug, Clone, Serialize)]
pub struct AssetMatch {
    pub path: String,
    pub name: String,
    pub kind: String,
    pub caption: Option<String>,
    pub distance: f32,
    pub effective_query: String,
}

pub struct AssetSearcher {
    store: Arc<dyn AssetStore>,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatModel>,
    config: SearcherConfig,
    rewrite_options: ChatOptions,
}

impl AssetSearcher {
    #[must_use]
    pub fn new(
        store: Arc<dyn AssetStore>,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
        config: SearcherConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            chat,
            config,
            rewrite_options: ChatOptions::new(),
        }
    }

    /// Find the `k` assets nearest to `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the rewrite call, embedding, or store query fails.
    /// Store errors are fatal for this request; nothing is retried here.
    pub async fn search(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> Result<Vec<AssetMatch>, AssetError> {
        let effective = if options.rewrite {
            self.rewrite_query(query).await?
        } else {
            query.to_owned()
        };

        let vector = embed_task::embed_text(self.embedder.clone(), effective.clone()).await?;
        let hits = self
            .store
            .query(vector, options.k, options.search_breadth)
            .await?;

        Ok(hits
            .into_iter()
            .map(|h| AssetMatch {
                path: h.path,
                name: h.name,
                kind: h.kind,
                caption: h.caption,
                distance: h.distance,
                effective_query: effective.clone(),
            })
            .collect())
    }

    async fn rewrite_query(&self, query: &str) -> Result<String, AssetError> {
        let messages = [Message::system(REWRITE_PROMPT), Message::user(query)];
        let response = self
            .chat
            .chat_chunk(&messages, &self.rewrite_options, None)
            .await?;

        let rewritten = bound_chars(response.message.content.trim(), self.config.max_rewrite_len);
        if rewritten.is_empty() {
            tracing::warn!("rewrite produced empty text, keeping original query");
            return Ok(query.to_owned());
        }
        tracing::debug!(original = query, rewritten, "query rewritten");
        Ok(rewritten.to_owned())
    }
}

/// Truncate to at most `max` characters on a char boundary.
fn bound_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_explicit() {
        let options = SearchOptions::default();
        assert!(!options.rewrite);
        assert_eq!(options.k, DEFAULT_K);
        assert_eq!(options.search_breadth, DEFAULT_SEARCH_BREADTH);
    }

    #[test]
    fn bound_chars_truncates_on_boundary() {
        assert_eq!(bound_chars("hello", 3), "hel");
        assert_eq!(bound_chars("hello", 10), "hello");
        // multi-byte chars are not split
        assert_eq!(bound_chars("héllo", 2), "hé");
    }

    #[test]
    fn bound_chars_empty() {
        assert_eq!(bound_chars("", 5), "");
        assert_eq!(bound_chars("abc", 0), "");
    }
}
