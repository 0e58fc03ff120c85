//! Asset indexing and retrieval for GenVN.
//!
//! Two read/write paths over one vector collection: [`AssetIndexer`] runs the
//! one-shot ingestion pipeline (discover files, embed, optionally caption,
//! insert, build the ANN index), and [`AssetSearcher`] serves
//! nearest-neighbour lookups with optional LLM query rewriting.

mod embed_task;
mod error;
pub mod indexer;
pub mod searcher;

pub use error::AssetError;
pub use indexer::{AssetIndexer, IndexerConfig, IngestReport};
pub use searcher::{
    AssetMatch, AssetSearcher, DEFAULT_K, DEFAULT_SEARCH_BREADTH, SearchOptions, SearcherConfig,
};
