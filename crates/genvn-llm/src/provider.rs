use std::future::Future;
use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::message::Message;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Inference options forwarded verbatim to the service (temperature, seed,
/// context size, ...).
pub type ChatOptions = serde_json::Map<String, serde_json::Value>;

/// Raw protocol fragments from a streaming call.
///
/// Each item is one line of the service's newline-delimited JSON payload,
/// yielded opaque and unparsed; decoding text deltas out of it is the
/// caller's job. The sequence is finite but its length is unknown in
/// advance, and it is not restartable. Dropping the stream closes the
/// underlying connection and discards remaining server output without error.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>;

/// Aggregated non-streaming reply.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: ResponseMessage,
    #[serde(default)]
    pub done: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

/// Client for a chat-capable inference service.
///
/// Instances are constructed once and safe for concurrent read-only use.
/// Transport failures are retried with bounded backoff; non-success statuses
/// surface immediately as [`ChatError::Status`] and are never retried.
pub trait ChatModel: Send + Sync {
    /// Single-shot call: blocks until the service returns a complete message.
    ///
    /// `format` is the service-side output format constraint (e.g. `"json"`).
    fn chat_chunk<'a>(
        &'a self,
        messages: &'a [Message],
        options: &'a ChatOptions,
        format: Option<&'a str>,
    ) -> BoxFuture<'a, Result<ChatResponse, ChatError>>;

    /// Streaming call: opens one connection and returns a pull-based sequence
    /// of raw protocol fragments. The caller may stop pulling at any time.
    fn chat_stream<'a>(
        &'a self,
        messages: &'a [Message],
        options: &'a ChatOptions,
        format: Option<&'a str>,
    ) -> BoxFuture<'a, Result<FragmentStream, ChatError>>;
}
