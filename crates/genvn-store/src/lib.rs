//! Durable vector storage for visual assets.
//!
//! A collection holds one fixed-width float-vector column plus the typed
//! payload columns of an [`AssetRecord`]. Ingestion inserts records one at a
//! time, then builds a single HNSW index over the vector column; queries are
//! only meaningful once that build has completed.

mod error;
#[cfg(any(test, feature = "mock"))]
pub mod memory;
pub mod qdrant;

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

pub use error::StoreError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Distance metric for the ANN index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclid,
}

impl DistanceMetric {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclid => "euclid",
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared shape of an asset collection.
#[derive(Clone, Debug)]
pub struct CollectionSpec {
    pub name: String,
    /// Width of the float-vector column. Records whose embedding length
    /// differs are rejected, never truncated or padded.
    pub vector_dim: usize,
    pub metric: DistanceMetric,
}

/// One indexed asset. The store assigns the record id on insert.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetRecord {
    pub path: String,
    pub name: String,
    /// File extension, lowercased.
    pub kind: String,
    pub embedding: Vec<f32>,
    pub caption: Option<String>,
}

/// A query hit with its stored columns.
///
/// `distance` is normalized so that smaller is always closer, regardless of
/// metric: cosine hits are reported as `1 - similarity`, Euclid hits as the
/// raw distance. Result sets are ordered by non-decreasing `distance`.
#[derive(Clone, Debug, Serialize)]
pub struct ScoredAsset {
    pub id: String,
    pub path: String,
    pub name: String,
    pub kind: String,
    pub caption: Option<String>,
    pub distance: f32,
}

/// HNSW build parameters: the ingestion-time side of the recall/latency
/// trade-off. The query-time side (`search_breadth`) is passed per query and
/// defaults independently; the two knobs are deliberately not unified.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct IndexParams {
    /// Graph connectivity (edges per node).
    pub m: u64,
    /// Candidate-list size during construction.
    pub ef_construct: u64,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construct: 128,
        }
    }
}

pub trait AssetStore: Send + Sync {
    /// Create the collection if it does not exist.
    ///
    /// Idempotent: calling on an existing collection is a no-op, never an
    /// error.
    fn define_collection(&self) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Exact number of records currently stored.
    fn count(&self) -> BoxFuture<'_, Result<u64, StoreError>>;

    /// Insert one record, returning its assigned id.
    ///
    /// Success or failure is independent per record. The embedding length is
    /// validated against the collection's vector width before anything is
    /// written.
    fn insert(&self, record: AssetRecord) -> BoxFuture<'_, Result<String, StoreError>>;

    /// Build the ANN index over the vector column.
    ///
    /// Queries observe a valid index only after this completes.
    fn build_index(&self, params: IndexParams) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Return the `k` nearest records to `vector`, ordered by non-decreasing
    /// distance. `search_breadth` is the HNSW `ef` value for this query.
    fn query(
        &self,
        vector: Vec<f32>,
        k: usize,
        search_breadth: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredAsset>, StoreError>>;
}
