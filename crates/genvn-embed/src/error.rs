#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("model loading failed: {0}")]
    ModelLoad(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("image decode failed: {0}")]
    Image(String),

    #[error("candle error: {0}")]
    Candle(#[from] candle_core::Error),
}
