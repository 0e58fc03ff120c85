//! Blocking-pool wrappers around the synchronous embedder.

use std::sync::Arc;

use genvn_embed::Embedder;

use crate::error::AssetError;

pub(crate) async fn embed_image(
    embedder: Arc<dyn Embedder>,
    bytes: Vec<u8>,
) -> Result<Vec<f32>, AssetError> {
    tokio::task::spawn_blocking(move || embedder.embed_image(&bytes))
        .await
        .map_err(|e| AssetError::Join(e.to_string()))?
        .map_err(AssetError::from)
}

pub(crate) async fn embed_text(
    embedder: Arc<dyn Embedder>,
    text: String,
) -> Result<Vec<f32>, AssetError> {
    tokio::task::spawn_blocking(move || embedder.embed_text(&text))
        .await
        .map_err(|e| AssetError::Join(e.to_string()))?
        .map_err(AssetError::from)
}
