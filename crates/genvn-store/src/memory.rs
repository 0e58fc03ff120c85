//! Exact-scan in-memory [`AssetStore`] for tests.
//!
//! Mirrors the contract of the Qdrant store including the index lifecycle:
//! queries fail until `build_index` has run.

use std::sync::RwLock;

use crate::{
    AssetRecord, AssetStore, BoxFuture, CollectionSpec, DistanceMetric, IndexParams, ScoredAsset,
    StoreError,
};

struct Inner {
    defined: bool,
    indexed: bool,
    records: Vec<(String, AssetRecord)>,
}

pub struct InMemoryAssetStore {
    spec: CollectionSpec,
    inner: RwLock<Inner>,
}

impl std::fmt::Debug for InMemoryAssetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryAssetStore")
            .field("collection", &self.spec.name)
            .finish_non_exhaustive()
    }
}

impl InMemoryAssetStore {
    #[must_use]
    pub fn new(spec: CollectionSpec) -> Self {
        Self {
            spec,
            inner: RwLock::new(Inner {
                defined: false,
                indexed: false,
                records: Vec::new(),
            }),
        }
    }

    /// Stored records, in insertion order. Test helper.
    #[must_use]
    pub fn records(&self) -> Vec<AssetRecord> {
        self.inner
            .read()
            .map(|g| g.records.iter().map(|(_, r)| r.clone()).collect())
            .unwrap_or_default()
    }
}

fn distance(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        DistanceMetric::Cosine => {
            let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
            let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm_a == 0.0 || norm_b == 0.0 {
                return 1.0;
            }
            1.0 - dot / (norm_a * norm_b)
        }
        DistanceMetric::Euclid => a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt(),
    }
}

impl AssetStore for InMemoryAssetStore {
    fn define_collection(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let mut inner = self
                .inner
                .write()
                .map_err(|e| StoreError::Collection(e.to_string()))?;
            inner.defined = true;
            Ok(())
        })
    }

    fn count(&self) -> BoxFuture<'_, Result<u64, StoreError>> {
        Box::pin(async move {
            let inner = self
                .inner
                .read()
                .map_err(|e| StoreError::Collection(e.to_string()))?;
            Ok(inner.records.len() as u64)
        })
    }

    fn insert(&self, record: AssetRecord) -> BoxFuture<'_, Result<String, StoreError>> {
        Box::pin(async move {
            if record.embedding.len() != self.spec.vector_dim {
                return Err(StoreError::DimensionMismatch {
                    expected: self.spec.vector_dim,
                    actual: record.embedding.len(),
                });
            }
            let mut inner = self
                .inner
                .write()
                .map_err(|e| StoreError::Insert(e.to_string()))?;
            if !inner.defined {
                return Err(StoreError::Insert(format!(
                    "collection '{}' is not defined",
                    self.spec.name
                )));
            }
            let id = uuid::Uuid::new_v4().to_string();
            inner.records.push((id.clone(), record));
            Ok(id)
        })
    }

    fn build_index(&self, _params: IndexParams) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let mut inner = self
                .inner
                .write()
                .map_err(|e| StoreError::Index(e.to_string()))?;
            if !inner.defined {
                return Err(StoreError::Index(format!(
                    "collection '{}' is not defined",
                    self.spec.name
                )));
            }
            inner.indexed = true;
            Ok(())
        })
    }

    fn query(
        &self,
        vector: Vec<f32>,
        k: usize,
        _search_breadth: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredAsset>, StoreError>> {
        Box::pin(async move {
            if vector.len() != self.spec.vector_dim {
                return Err(StoreError::DimensionMismatch {
                    expected: self.spec.vector_dim,
                    actual: vector.len(),
                });
            }
            let inner = self
                .inner
                .read()
                .map_err(|e| StoreError::Search(e.to_string()))?;
            if !inner.indexed {
                return Err(StoreError::Index(format!(
                    "collection '{}' has no built index",
                    self.spec.name
                )));
            }

            let mut hits: Vec<ScoredAsset> = inner
                .records
                .iter()
                .map(|(id, r)| ScoredAsset {
                    id: id.clone(),
                    path: r.path.clone(),
                    name: r.name.clone(),
                    kind: r.kind.clone(),
                    caption: r.caption.clone(),
                    distance: distance(self.spec.metric, &vector, &r.embedding),
                })
                .collect();
            hits.sort_by(|a, b| {
                a.distance
                    .partial_cmp(&b.distance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            hits.truncate(k);
            Ok(hits)
        })
    }
}
