//! Test-only deterministic embedder.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{EmbedError, Embedder};

/// Deterministic embedder for tests.
///
/// Inputs matching a preset key (substring) map to the preset vector; image
/// bytes are interpreted as UTF-8 and looked up the same way, so a test file
/// containing the word "airport" embeds like the text "airport". Anything
/// else hashes to a stable pseudo-vector.
pub struct MockEmbedder {
    dim: usize,
    presets: Vec<(String, Vec<f32>)>,
    fail_marker: Option<String>,
    calls: AtomicUsize,
}

impl std::fmt::Debug for MockEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockEmbedder")
            .field("dim", &self.dim)
            .field("presets", &self.presets.len())
            .finish_non_exhaustive()
    }
}

impl MockEmbedder {
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            presets: Vec::new(),
            fail_marker: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Inputs containing `key` embed to `vector`.
    #[must_use]
    pub fn with_preset(mut self, key: impl Into<String>, vector: Vec<f32>) -> Self {
        debug_assert_eq!(vector.len(), self.dim);
        self.presets.push((key.into(), vector));
        self
    }

    /// Inputs containing `marker` fail with an inference error.
    #[must_use]
    pub fn with_fail_marker(mut self, marker: impl Into<String>) -> Self {
        self.fail_marker = Some(marker.into());
        self
    }

    /// Total embed calls (image + text) made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, input: &str) -> Result<Vec<f32>, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(marker) = &self.fail_marker
            && input.contains(marker.as_str())
        {
            return Err(EmbedError::Inference(format!(
                "mock failure triggered by '{marker}'"
            )));
        }

        for (key, vector) in &self.presets {
            if input.contains(key.as_str()) {
                return Ok(vector.clone());
            }
        }

        Ok(hash_vector(input.as_bytes(), self.dim))
    }
}

fn hash_vector(bytes: &[u8], dim: usize) -> Vec<f32> {
    let mut reader = blake3::Hasher::new().update(bytes).finalize_xof();
    let mut raw = vec![0u8; dim * 4];
    reader.fill(&mut raw);

    let mut v: Vec<f32> = raw
        .chunks_exact(4)
        .map(|c| {
            let n = u32::from_le_bytes([c[0], c[1], c[2], c[3]]);
            (f64::from(n) / f64::from(u32::MAX)) as f32
        })
        .collect();

    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

impl Embedder for MockEmbedder {
    fn dimension(&self) -> usize {
        self.dim
    }

    fn embed_image(&self, image: &[u8]) -> Result<Vec<f32>, EmbedError> {
        let text = String::from_utf8_lossy(image).into_owned();
        self.vector_for(&text)
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.vector_for(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_text_is_deterministic() {
        let embedder = MockEmbedder::new(8);
        let a = embedder.embed_text("airport at night").unwrap();
        let b = embedder.embed_text("airport at night").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
    }

    #[test]
    fn different_inputs_differ() {
        let embedder = MockEmbedder::new(8);
        let a = embedder.embed_text("airport").unwrap();
        let b = embedder.embed_text("kitchen").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn preset_substring_match() {
        let embedder = MockEmbedder::new(2).with_preset("airport", vec![1.0, 0.0]);
        let v = embedder.embed_text("a busy airport terminal").unwrap();
        assert_eq!(v, vec![1.0, 0.0]);
    }

    #[test]
    fn image_bytes_share_preset_table() {
        let embedder = MockEmbedder::new(2).with_preset("kitchen", vec![0.0, 1.0]);
        let v = embedder.embed_image(b"kitchen").unwrap();
        assert_eq!(v, vec![0.0, 1.0]);
    }

    #[test]
    fn fail_marker_triggers_error() {
        let embedder = MockEmbedder::new(2).with_fail_marker("CORRUPT");
        let err = embedder.embed_image(b"CORRUPT bytes").unwrap_err();
        assert!(matches!(err, EmbedError::Inference(_)));
    }

    #[test]
    fn calls_counted() {
        let embedder = MockEmbedder::new(2);
        let _ = embedder.embed_text("one");
        let _ = embedder.embed_image(b"two");
        assert_eq!(embedder.calls(), 2);
    }

    #[test]
    fn hash_vector_unit_norm() {
        let v = hash_vector(b"anything", 16);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
