use genvn_llm::ChatError;

#[derive(Debug, thiserror::Error)]
pub enum StoryError {
    #[error("chat error: {0}")]
    Chat(#[from] ChatError),

    #[error("lore retrieval failed: {0}")]
    Retrieval(String),

    #[error("generation failed mid-stream: {0}")]
    Generation(String),

    #[error("malformed stream fragment: {0}")]
    Fragment(String),

    #[error("stream ended before the service signalled completion")]
    Truncated,
}
