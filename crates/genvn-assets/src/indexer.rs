//! Asset ingestion: discover → embed → caption → insert → index build.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use genvn_embed::Embedder;
use genvn_llm::{ChatModel, ChatOptions, Message};
use genvn_store::{AssetRecord, AssetStore, IndexParams};

use crate::embed_task;
use crate::error::AssetError;

/// Extensions accepted for ingestion, matched case-insensitively. PNG is
/// deliberately excluded: backgrounds ship as photographic jpeg/webp packs
/// and PNG is reserved for sprites with alpha, which are composited rather
/// than retrieved.
const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "webp"];

const CAPTION_PROMPT: &str = "You label background art for a visual novel. \
Describe this image in one short sentence: the setting, key objects, \
lighting and mood. Reply with the caption only.";

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Root directory scanned recursively for assets.
    pub root: PathBuf,
    /// Weight of the image vector in the image/caption blend. The blend is
    /// computed during captioned ingestion but not what ends up stored; see
    /// the note in `ingest_one`.
    pub caption_weight: f32,
    /// Build-time HNSW parameters (the ingestion side of the recall knob;
    /// query-time breadth is configured separately on the searcher).
    pub index: IndexParams,
}

impl IndexerConfig {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            caption_weight: 0.5,
            index: IndexParams::default(),
        }
    }
}

/// Summary of one ingestion run.
#[derive(Debug, Default, Serialize)]
pub struct IngestReport {
    pub processed: usize,
    pub failed: usize,
    pub failed_paths: Vec<String>,
    /// True when the store already held records and the run was skipped
    /// wholesale. Ingestion is all-or-nothing, never incremental; refreshing
    /// assets requires an external purge and a full re-run.
    pub skipped_existing: bool,
}

/// Orchestrates the ingestion pipeline over the configured asset root.
pub struct AssetIndexer {
    store: Arc<dyn AssetStore>,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatModel>,
    config: IndexerConfig,
    caption_options: ChatOptions,
    ingest_lock: tokio::sync::Mutex<()>,
}

impl AssetIndexer {
    #[must_use]
    pub fn new(
        store: Arc<dyn AssetStore>,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
        config: IndexerConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            chat,
            config,
            caption_options: ChatOptions::new(),
            ingest_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Run the full ingestion pipeline.
    ///
    /// Skips entirely when the collection already holds records. Per-asset
    /// failures are counted and skipped; the batch never aborts for one bad
    /// file. Store writes stay serialized, and the ANN index is built once
    /// after the last insert; queries are valid only from that point.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be defined or counted, or
    /// if the final index build fails.
    pub async fn load_assets(&self, infer_metadata: bool) -> Result<IngestReport, AssetError> {
        let _guard = self.ingest_lock.lock().await;

        self.store.define_collection().await?;

        let existing = self.store.count().await?;
        if existing > 0 {
            tracing::info!(existing, "collection already populated, skipping ingestion");
            return Ok(IngestReport {
                skipped_existing: true,
                ..IngestReport::default()
            });
        }

        let files = discover_assets(&self.config.root);
        let total = files.len();
        tracing::info!(total, root = %self.config.root.display(), "asset ingestion started");

        let mut report = IngestReport::default();
        for (i, path) in files.iter().enumerate() {
            let rel = path
                .strip_prefix(&self.config.root)
                .unwrap_or(path)
                .to_string_lossy()
                .to_string();

            match self.ingest_one(path, &rel, infer_metadata).await {
                Ok(()) => {
                    report.processed += 1;
                    tracing::debug!(
                        file = %rel,
                        progress = format_args!("{}/{total}", i + 1),
                        "asset indexed"
                    );
                }
                Err(e) => {
                    tracing::warn!(file = %rel, error = %e, "asset skipped");
                    report.failed += 1;
                    report.failed_paths.push(rel);
                }
            }
        }

        self.store.build_index(self.config.index).await?;

        tracing::info!(
            processed = report.processed,
            failed = report.failed,
            "asset ingestion finished"
        );
        Ok(report)
    }

    async fn ingest_one(
        &self,
        path: &Path,
        rel: &str,
        infer_metadata: bool,
    ) -> Result<(), AssetError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AssetError::Parse(format!("{rel}: {e}")))?;

        let image_vec = embed_task::embed_image(self.embedder.clone(), bytes.clone()).await?;

        let (embedding, caption) = if infer_metadata {
            let caption = self.caption(&bytes).await?;
            let caption_vec =
                embed_task::embed_text(self.embedder.clone(), caption.clone()).await?;
            // TODO: the blended vector is computed but never persisted; the
            // caption embedding is what gets stored below. Either store the
            // blend or delete blend_embeddings.
            let _blended = blend_embeddings(&image_vec, &caption_vec, self.config.caption_weight);
            (caption_vec, Some(caption))
        } else {
            (image_vec, None)
        };

        let record = AssetRecord {
            path: rel.to_owned(),
            name: file_stem(path),
            kind: extension_lowercase(path),
            embedding,
            caption,
        };
        self.store.insert(record).await?;
        Ok(())
    }

    async fn caption(&self, image: &[u8]) -> Result<String, AssetError> {
        let messages = [Message::user_with_image(CAPTION_PROMPT, image)];
        let response = self
            .chat
            .chat_chunk(&messages, &self.caption_options, None)
            .await?;
        let caption = response.message.content.trim().to_owned();
        if caption.is_empty() {
            return Err(AssetError::Parse("empty caption from vision model".into()));
        }
        Ok(caption)
    }
}

fn blend_embeddings(image: &[f32], text: &[f32], image_weight: f32) -> Vec<f32> {
    image
        .iter()
        .zip(text.iter())
        .map(|(i, t)| image_weight * i + (1.0 - image_weight) * t)
        .collect()
}

fn is_allowed(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ALLOWED_EXTENSIONS.iter().any(|a| ext.eq_ignore_ascii_case(a)))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn extension_lowercase(path: &Path) -> String {
    path.extension()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Enumerate allowlisted asset files under `root`, sorted for a
/// deterministic ingestion order.
fn discover_assets(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = ignore::WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .build()
        .flatten()
        .filter(|e| e.file_type().is_some_and(|ft| ft.is_file()) && is_allowed(e.path()))
        .map(ignore::DirEntry::into_path)
        .collect();
    files.sort();
    files
}
