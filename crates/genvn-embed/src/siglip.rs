//! SigLIP embedder backed by candle.

use std::sync::Arc;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::siglip;
use image::imageops::FilterType;
use tokenizers::Tokenizer;

use crate::{EmbedError, Embedder};

#[derive(Clone)]
pub struct SiglipEmbedder {
    model: Arc<siglip::Model>,
    tokenizer: Tokenizer,
    device: Device,
    image_size: usize,
    max_text_len: usize,
    pad_id: u32,
    dim: usize,
}

impl std::fmt::Debug for SiglipEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiglipEmbedder")
            .field("device", &self.device)
            .field("dim", &self.dim)
            .finish_non_exhaustive()
    }
}

/// Resolve a configured device name.
///
/// # Errors
///
/// Returns [`EmbedError::ModelLoad`] for unknown names or unavailable
/// accelerators.
pub fn parse_device(name: &str) -> Result<Device, EmbedError> {
    match name {
        "cpu" => Ok(Device::Cpu),
        "cuda" => Device::new_cuda(0)
            .map_err(|e| EmbedError::ModelLoad(format!("CUDA device unavailable: {e}"))),
        "metal" => Device::new_metal(0)
            .map_err(|e| EmbedError::ModelLoad(format!("Metal device unavailable: {e}"))),
        other => Err(EmbedError::ModelLoad(format!("unknown device '{other}'"))),
    }
}

impl SiglipEmbedder {
    /// Load a SigLIP model from `HuggingFace` Hub.
    ///
    /// Downloads config, tokenizer, and weights once; every later embed call
    /// reuses the loaded model.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::ModelLoad`] if any artifact cannot be fetched or
    /// parsed.
    pub fn load(repo_id: &str, device: &Device) -> Result<Self, EmbedError> {
        let api = hf_hub::api::sync::Api::new().map_err(|e| {
            EmbedError::ModelLoad(format!("failed to create HuggingFace API client: {e}"))
        })?;
        let repo = api.model(repo_id.to_owned());

        let config_path = repo.get("config.json").map_err(|e| {
            EmbedError::ModelLoad(format!("failed to download config.json from {repo_id}: {e}"))
        })?;
        let tokenizer_path = repo.get("tokenizer.json").map_err(|e| {
            EmbedError::ModelLoad(format!(
                "failed to download tokenizer.json from {repo_id}: {e}"
            ))
        })?;
        let weights_path = repo.get("model.safetensors").map_err(|e| {
            EmbedError::ModelLoad(format!(
                "failed to download model.safetensors from {repo_id}: {e}"
            ))
        })?;

        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| EmbedError::ModelLoad(format!("failed to read SigLIP config: {e}")))?;
        let config: siglip::Config = serde_json::from_str(&config_str)
            .map_err(|e| EmbedError::ModelLoad(format!("failed to parse SigLIP config: {e}")))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EmbedError::ModelLoad(format!("failed to load tokenizer: {e}")))?;
        // SigLIP pads text with the sentencepiece EOS token.
        let pad_id = tokenizer.token_to_id("</s>").unwrap_or(0);

        // SAFETY: file is a valid safetensors downloaded from hf-hub, not
        // modified during VarBuilder lifetime
        let vb =
            unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)? };
        let model = siglip::Model::new(&config, vb)?;

        tracing::info!(
            repo_id,
            dim = config.text_config.hidden_size,
            "embedding model loaded"
        );
        Ok(Self {
            model: Arc::new(model),
            tokenizer,
            device: device.clone(),
            image_size: config.vision_config.image_size,
            max_text_len: config.text_config.max_position_embeddings,
            pad_id,
            dim: config.text_config.hidden_size,
        })
    }

    fn pixel_values(&self, bytes: &[u8]) -> Result<Tensor, EmbedError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| EmbedError::Image(e.to_string()))?
            .resize_to_fill(
                u32::try_from(self.image_size).unwrap_or(u32::MAX),
                u32::try_from(self.image_size).unwrap_or(u32::MAX),
                FilterType::Triangle,
            )
            .to_rgb8();

        let data = img.into_raw();
        let tensor = Tensor::from_vec(data, (self.image_size, self.image_size, 3), &self.device)?
            .permute((2, 0, 1))?
            .to_dtype(DType::F32)?;
        // SigLIP expects pixels scaled to [-1, 1].
        let tensor = ((tensor / 255.0)? * 2.0)? - 1.0;
        Ok(tensor?.unsqueeze(0)?)
    }

    fn token_ids(&self, text: &str) -> Result<Tensor, EmbedError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| EmbedError::Inference(format!("tokenizer encode failed: {e}")))?;

        let mut ids = encoding.get_ids().to_vec();
        ids.truncate(self.max_text_len);
        ids.resize(self.max_text_len, self.pad_id);

        Ok(Tensor::new(ids.as_slice(), &self.device)?.unsqueeze(0)?)
    }
}

fn l2_normalize(features: &Tensor) -> Result<Vec<f32>, EmbedError> {
    let norm = features.sqr()?.sum_keepdim(1)?.sqrt()?;
    let normalized = features.broadcast_div(&norm)?.squeeze(0)?;
    normalized.to_vec1::<f32>().map_err(EmbedError::Candle)
}

impl Embedder for SiglipEmbedder {
    fn dimension(&self) -> usize {
        self.dim
    }

    fn embed_image(&self, image: &[u8]) -> Result<Vec<f32>, EmbedError> {
        let pixels = self.pixel_values(image)?;
        let features = self.model.get_image_features(&pixels)?;
        l2_normalize(&features)
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let ids = self.token_ids(text)?;
        let features = self.model.get_text_features(&ids)?;
        l2_normalize(&features)
    }
}
