use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use genvn_store::{CollectionSpec, DistanceMetric, IndexParams};

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub assets: AssetsConfig,
    pub story: StoryConfig,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub url: String,
    pub collection: String,
    pub metric: DistanceMetric,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".into(),
            collection: "visual_assets".into(),
            metric: DistanceMetric::Cosine,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// HuggingFace repo of the vision-text embedding model.
    pub model_id: String,
    /// Expected output dimension; must match the model and becomes the
    /// collection's vector width.
    pub dimension: usize,
    pub device: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_id: "google/siglip-base-patch16-224".into(),
            dimension: 768,
            device: "cpu".into(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// Substituted for requests that attach images (captioning).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vision_model: Option<String>,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub stream_read_timeout_secs: u64,
    /// Bounded retry attempts for transport errors only.
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "gemma3".into(),
            vision_model: None,
            connect_timeout_secs: 10,
            request_timeout_secs: 120,
            stream_read_timeout_secs: 120,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetsConfig {
    pub root: PathBuf,
    /// Caption assets with the vision model during ingestion.
    pub infer_metadata: bool,
    pub caption_weight: f32,
    /// Build-time HNSW knobs.
    pub index: IndexParams,
    /// Query-time defaults; independent of the build-time knobs above.
    pub search_k: usize,
    pub search_breadth: u64,
    pub max_rewrite_len: usize,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data/assets"),
            infer_metadata: true,
            caption_weight: 0.5,
            index: IndexParams::default(),
            search_k: 5,
            search_breadth: 64,
            max_rewrite_len: 512,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct StoryConfig {
    pub lore_limit: usize,
    /// Placeholder lore served until the story-graph store exists.
    pub lore: Vec<String>,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            lore_limit: 8,
            lore: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8000,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// The collection shape implied by store and embedding settings.
    #[must_use]
    pub fn collection_spec(&self) -> CollectionSpec {
        CollectionSpec {
            name: self.store.collection.clone(),
            vector_dim: self.embedding.dimension,
            metric: self.store.metric,
        }
    }

    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("GENVN_STORE_URL") {
            self.store.url = v;
        }
        if let Ok(v) = std::env::var("GENVN_STORE_COLLECTION") {
            self.store.collection = v;
        }
        if let Ok(v) = std::env::var("GENVN_STORE_METRIC") {
            if let Ok(metric) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.store.metric = metric;
            } else {
                tracing::warn!("ignoring invalid GENVN_STORE_METRIC value: {v}");
            }
        }
        if let Ok(v) = std::env::var("GENVN_EMBEDDING_MODEL_ID") {
            self.embedding.model_id = v;
        }
        if let Ok(v) = std::env::var("GENVN_EMBEDDING_DIMENSION")
            && let Ok(dimension) = v.parse::<usize>()
        {
            self.embedding.dimension = dimension;
        }
        if let Ok(v) = std::env::var("GENVN_EMBEDDING_DEVICE") {
            self.embedding.device = v;
        }
        if let Ok(v) = std::env::var("GENVN_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("GENVN_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("GENVN_LLM_VISION_MODEL") {
            self.llm.vision_model = Some(v);
        }
        if let Ok(v) = std::env::var("GENVN_ASSET_ROOT") {
            self.assets.root = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("GENVN_ASSETS_INFER_METADATA")
            && let Ok(enabled) = v.parse::<bool>()
        {
            self.assets.infer_metadata = enabled;
        }
        if let Ok(v) = std::env::var("GENVN_GATEWAY_BIND") {
            self.gateway.bind = v;
        }
        if let Ok(v) = std::env::var("GENVN_GATEWAY_PORT")
            && let Ok(port) = v.parse::<u16>()
        {
            self.gateway.port = port;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.store.url, "http://localhost:6334");
        assert_eq!(config.embedding.dimension, 768);
        assert_eq!(config.llm.model, "gemma3");
        assert!(config.assets.infer_metadata);
        assert_eq!(config.gateway.port, 8000);
    }

    #[test]
    fn collection_spec_combines_sections() {
        let config = Config::default();
        let spec = config.collection_spec();
        assert_eq!(spec.name, "visual_assets");
        assert_eq!(spec.vector_dim, 768);
        assert_eq!(spec.metric, DistanceMetric::Cosine);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load(Path::new("/nonexistent/genvn.toml")).unwrap();
        assert_eq!(config.store.collection, "visual_assets");
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genvn.toml");
        std::fs::write(
            &path,
            r#"
[llm]
model = "llama3.2-vision"

[assets]
root = "content/backgrounds"
search_breadth = 128

[store]
metric = "euclid"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.llm.model, "llama3.2-vision");
        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert_eq!(config.assets.root, PathBuf::from("content/backgrounds"));
        assert_eq!(config.assets.search_breadth, 128);
        assert_eq!(config.assets.search_k, 5);
        assert_eq!(config.store.metric, DistanceMetric::Euclid);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genvn.toml");
        std::fs::write(&path, "[llm\nmodel=").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn env_overrides_apply() {
        // SAFETY: test-local env mutation; keys are unique to this test
        unsafe {
            std::env::set_var("GENVN_LLM_MODEL", "qwen2.5vl");
            std::env::set_var("GENVN_GATEWAY_PORT", "9100");
            std::env::set_var("GENVN_STORE_METRIC", "euclid");
        }

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config.llm.model, "qwen2.5vl");
        assert_eq!(config.gateway.port, 9100);
        assert_eq!(config.store.metric, DistanceMetric::Euclid);

        // SAFETY: cleanup of the vars set above
        unsafe {
            std::env::remove_var("GENVN_LLM_MODEL");
            std::env::remove_var("GENVN_GATEWAY_PORT");
            std::env::remove_var("GENVN_STORE_METRIC");
        }
    }

    #[test]
    fn unparsable_env_value_is_ignored() {
        // SAFETY: test-local env mutation; key is unique to this test
        unsafe {
            std::env::set_var("GENVN_ASSETS_INFER_METADATA", "maybe");
        }
        let mut config = Config::default();
        config.apply_env_overrides();
        assert!(config.assets.infer_metadata);
        // SAFETY: cleanup of the var set above
        unsafe {
            std::env::remove_var("GENVN_ASSETS_INFER_METADATA");
        }
    }
}
