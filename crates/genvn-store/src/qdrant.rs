//! Qdrant-backed [`AssetStore`].
//!
//! Ingestion-friendly lifecycle: the collection is created with HNSW disabled
//! (`m = 0`) so inserts land unindexed, and [`AssetStore::build_index`]
//! re-enables HNSW and waits for the optimizer to finish. Queries are only
//! valid after that build completes.

use std::collections::HashMap;
use std::time::Duration;

use qdrant_client::Qdrant;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::{
    CollectionStatus, CountPointsBuilder, CreateCollectionBuilder,
    CreateFieldIndexCollectionBuilder, Distance, FieldType, HnswConfigDiffBuilder, PointId,
    PointStruct, ScoredPoint, SearchParamsBuilder, SearchPointsBuilder, UpdateCollectionBuilder,
    UpsertPointsBuilder, VectorParamsBuilder,
};

use crate::{
    AssetRecord, AssetStore, BoxFuture, CollectionSpec, DistanceMetric, IndexParams, ScoredAsset,
    StoreError,
};

const BUILD_POLL_INTERVAL: Duration = Duration::from_millis(500);
const BUILD_POLL_ATTEMPTS: u32 = 240;

pub struct QdrantAssetStore {
    client: Qdrant,
    spec: CollectionSpec,
}

impl std::fmt::Debug for QdrantAssetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantAssetStore")
            .field("collection", &self.spec.name)
            .field("vector_dim", &self.spec.vector_dim)
            .field("metric", &self.spec.metric)
            .finish_non_exhaustive()
    }
}

impl QdrantAssetStore {
    /// Connect to Qdrant at `url` for the given collection spec.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the client cannot be created.
    pub fn connect(url: &str, spec: CollectionSpec) -> Result<Self, StoreError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self { client, spec })
    }

    fn record_payload(
        record: &AssetRecord,
    ) -> Result<HashMap<String, qdrant_client::qdrant::Value>, StoreError> {
        serde_json::from_value(serde_json::json!({
            "path": record.path,
            "name": record.name,
            "kind": record.kind,
            "caption": record.caption,
        }))
        .map_err(|e| StoreError::Payload(e.to_string()))
    }
}

fn to_distance(metric: DistanceMetric) -> Distance {
    match metric {
        DistanceMetric::Cosine => Distance::Cosine,
        DistanceMetric::Euclid => Distance::Euclid,
    }
}

/// Qdrant reports similarity for cosine collections and raw distance for
/// Euclid ones; normalize to ascending distance either way.
fn score_to_distance(metric: DistanceMetric, score: f32) -> f32 {
    match metric {
        DistanceMetric::Cosine => 1.0 - score,
        DistanceMetric::Euclid => score,
    }
}

fn point_id_string(id: &PointId) -> Option<String> {
    match id.point_id_options.as_ref()? {
        PointIdOptions::Uuid(s) => Some(s.clone()),
        PointIdOptions::Num(n) => Some(n.to_string()),
    }
}

fn scored_asset(metric: DistanceMetric, point: &ScoredPoint) -> Option<ScoredAsset> {
    let p = &point.payload;
    let get_str = |key: &str| {
        p.get(key)
            .and_then(qdrant_client::qdrant::Value::as_str)
            .cloned()
    };

    Some(ScoredAsset {
        id: point.id.as_ref().and_then(point_id_string)?,
        path: get_str("path")?,
        name: get_str("name")?,
        kind: get_str("kind")?,
        caption: get_str("caption"),
        distance: score_to_distance(metric, point.score),
    })
}

impl AssetStore for QdrantAssetStore {
    fn define_collection(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let exists = self
                .client
                .collection_exists(&self.spec.name)
                .await
                .map_err(|e| StoreError::Connection(e.to_string()))?;
            if exists {
                return Ok(());
            }

            let dim = u64::try_from(self.spec.vector_dim)
                .map_err(|e| StoreError::Collection(e.to_string()))?;

            // m = 0 defers HNSW construction until build_index.
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.spec.name)
                        .vectors_config(VectorParamsBuilder::new(dim, to_distance(self.spec.metric)))
                        .hnsw_config(HnswConfigDiffBuilder::default().m(0)),
                )
                .await
                .map_err(|e| StoreError::Collection(e.to_string()))?;

            for field in ["path", "kind"] {
                self.client
                    .create_field_index(CreateFieldIndexCollectionBuilder::new(
                        &self.spec.name,
                        field,
                        FieldType::Keyword,
                    ))
                    .await
                    .map_err(|e| StoreError::Collection(e.to_string()))?;
            }

            tracing::info!(
                collection = %self.spec.name,
                dim = self.spec.vector_dim,
                metric = %self.spec.metric,
                "collection created"
            );
            Ok(())
        })
    }

    fn count(&self) -> BoxFuture<'_, Result<u64, StoreError>> {
        Box::pin(async move {
            let response = self
                .client
                .count(CountPointsBuilder::new(&self.spec.name).exact(true))
                .await
                .map_err(|e| StoreError::Collection(e.to_string()))?;
            Ok(response.result.map_or(0, |r| r.count))
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

            let payload = Self::record_payload(&record)?;
            let point_id = uuid::Uuid::new_v4().to_string();
            let point = PointStruct::new(point_id.clone(), record.embedding, payload);

            self.client
                .upsert_points(UpsertPointsBuilder::new(&self.spec.name, vec![point]))
                .await
                .map_err(|e| StoreError::Insert(e.to_string()))?;

            Ok(point_id)
        })
    }

    fn build_index(&self, params: IndexParams) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.client
                .update_collection(
                    UpdateCollectionBuilder::new(&self.spec.name).hnsw_config(
                        HnswConfigDiffBuilder::default()
                            .m(params.m)
                            .ef_construct(params.ef_construct),
                    ),
                )
                .await
                .map_err(|e| StoreError::Index(e.to_string()))?;

            // The optimizer rebuilds in the background; wait until the
            // collection settles so callers can rely on a complete index.
            for _ in 0..BUILD_POLL_ATTEMPTS {
                let info = self
                    .client
                    .collection_info(&self.spec.name)
                    .await
                    .map_err(|e| StoreError::Index(e.to_string()))?;
                let status = info.result.map_or(0, |r| r.status);
                if status == CollectionStatus::Green as i32 {
                    tracing::info!(collection = %self.spec.name, "ann index built");
                    return Ok(());
                }
                tokio::time::sleep(BUILD_POLL_INTERVAL).await;
            }

            Err(StoreError::Index(format!(
                "index build on '{}' did not settle in time",
                self.spec.name
            )))
        })
    }

    fn query(
        &self,
        vector: Vec<f32>,
        k: usize,
        search_breadth: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredAsset>, StoreError>> {
        Box::pin(async move {
            if vector.len() != self.spec.vector_dim {
                return Err(StoreError::DimensionMismatch {
                    expected: self.spec.vector_dim,
                    actual: vector.len(),
                });
            }

            let limit = u64::try_from(k).map_err(|e| StoreError::Search(e.to_string()))?;
            let response = self
                .client
                .search_points(
                    SearchPointsBuilder::new(&self.spec.name, vector, limit)
                        .with_payload(true)
                        .params(SearchParamsBuilder::default().hnsw_ef(search_breadth)),
                )
                .await
                .map_err(|e| StoreError::Search(e.to_string()))?;

            let mut hits: Vec<ScoredAsset> = response
                .result
                .iter()
                .filter_map(|p| scored_asset(self.spec.metric, p))
                .collect();
            hits.sort_by(|a, b| {
                a.distance
                    .partial_cmp(&b.distance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            Ok(hits)
        })
    }
}
