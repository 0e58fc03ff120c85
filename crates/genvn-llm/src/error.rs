use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Network-level failure reaching the inference service. Retried with
    /// bounded backoff.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success status from the inference service. Never retried.
    #[error("inference service returned status {code}: {body}")]
    Status { code: u16, body: String },

    /// No data arrived on a live stream within the read timeout.
    #[error("stream read timed out after {0:?}")]
    Timeout(Duration),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("empty response from inference service")]
    EmptyResponse,
}

impl ChatError {
    /// Whether this error is transport-level (retry-eligible).
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}
