use genvn_embed::EmbedError;
use genvn_llm::ChatError;
use genvn_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("embedding error: {0}")]
    Embed(#[from] EmbedError),

    #[error("chat error: {0}")]
    Chat(#[from] ChatError),

    #[error("asset unreadable: {0}")]
    Parse(String),

    #[error("blocking task failed: {0}")]
    Join(String),
}
