//! Integration tests against a live Qdrant instance.
//!
//! Run with `cargo test -p genvn-store -- --ignored` after starting Qdrant
//! locally (`docker run -p 6334:6334 qdrant/qdrant`).

use genvn_store::qdrant::QdrantAssetStore;
use genvn_store::{AssetRecord, AssetStore, CollectionSpec, DistanceMetric, IndexParams};

const QDRANT_URL: &str = "http://localhost:6334";

fn test_store(name: &str) -> QdrantAssetStore {
    QdrantAssetStore::connect(
        QDRANT_URL,
        CollectionSpec {
            name: name.into(),
            vector_dim: 4,
            metric: DistanceMetric::Cosine,
        },
    )
    .unwrap()
}

fn record(path: &str, embedding: Vec<f32>, caption: Option<&str>) -> AssetRecord {
    AssetRecord {
        path: path.into(),
        name: path.rsplit('/').next().unwrap_or(path).into(),
        kind: "webp".into(),
        embedding,
        caption: caption.map(Into::into),
    }
}

#[tokio::test]
#[ignore = "requires running Qdrant instance"]
async fn define_insert_index_query_lifecycle() {
    let store = test_store("genvn_it_lifecycle");

    store.define_collection().await.unwrap();
    store.define_collection().await.unwrap();

    store
        .insert(record("bg/a.webp", vec![1.0, 0.0, 0.0, 0.0], Some("alpha")))
        .await
        .unwrap();
    store
        .insert(record("bg/b.webp", vec![0.0, 1.0, 0.0, 0.0], Some("beta")))
        .await
        .unwrap();
    assert_eq!(store.count().await.unwrap(), 2);

    store.build_index(IndexParams::default()).await.unwrap();

    let hits = store.query(vec![1.0, 0.0, 0.0, 0.0], 2, 64).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].path, "bg/a.webp");
    assert!(hits[0].distance <= hits[1].distance);
}

#[tokio::test]
#[ignore = "requires running Qdrant instance"]
async fn mismatched_dimension_is_rejected() {
    let store = test_store("genvn_it_dim");
    store.define_collection().await.unwrap();
    let err = store
        .insert(record("bg/bad.webp", vec![1.0, 0.0], None))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        genvn_store::StoreError::DimensionMismatch { .. }
    ));
}
