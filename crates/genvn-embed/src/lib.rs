//! Joint image/text embeddings for asset retrieval.
//!
//! A single vision-language model (SigLIP) maps both images and text into one
//! vector space of a fixed dimension, so a background image and the caption
//! describing it land near each other. The model is loaded once at
//! construction and reused for every call.

mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod siglip;

pub use error::EmbedError;

/// Image-and-text embedding provider.
///
/// Implementations are deterministic: identical input against the same loaded
/// model yields the identical vector. Both methods return vectors of
/// [`Embedder::dimension`] length; callers must validate that dimension
/// against the store schema before ingestion.
///
/// Embedding is compute-bound and synchronous; async callers run it on the
/// blocking pool.
pub trait Embedder: Send + Sync {
    /// Fixed output dimension of this provider.
    fn dimension(&self) -> usize;

    /// Embed an encoded image (jpeg or webp bytes).
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::Image`] if the bytes cannot be decoded, or
    /// [`EmbedError::Inference`] if the forward pass fails.
    fn embed_image(&self, image: &[u8]) -> Result<Vec<f32>, EmbedError>;

    /// Embed a text query or caption.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::Inference`] if tokenization or the forward pass
    /// fails.
    fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}
