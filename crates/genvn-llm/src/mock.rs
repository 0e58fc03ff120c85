//! Test-only mock chat model.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::ChatError;
use crate::message::Message;
use crate::provider::{
    BoxFuture, ChatModel, ChatOptions, ChatResponse, FragmentStream, ResponseMessage,
};

/// Scripted [`ChatModel`] for tests.
///
/// Blocking calls pop from the response queue (falling back to
/// `default_response`); streaming calls either replay scripted raw fragments
/// or synthesize word-by-word NDJSON lines from the next queued response.
pub struct MockChatModel {
    responses: Mutex<Vec<String>>,
    pub default_response: String,
    fragments: Mutex<Option<Vec<String>>>,
    fail_status: Option<u16>,
    chunk_calls: AtomicUsize,
    stream_calls: AtomicUsize,
}

impl std::fmt::Debug for MockChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockChatModel").finish_non_exhaustive()
    }
}

impl Default for MockChatModel {
    fn default() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            default_response: "mock response".into(),
            fragments: Mutex::new(None),
            fail_status: None,
            chunk_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
        }
    }
}

impl MockChatModel {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses),
            ..Self::default()
        }
    }

    /// Replay these raw NDJSON lines on the next streaming call instead of
    /// synthesizing them.
    #[must_use]
    pub fn with_fragments(self, fragments: Vec<String>) -> Self {
        *self.fragments.lock().unwrap() = Some(fragments);
        self
    }

    /// Every call fails with the given status.
    #[must_use]
    pub fn failing(status: u16) -> Self {
        Self {
            fail_status: Some(status),
            ..Self::default()
        }
    }

    pub fn chunk_calls(&self) -> usize {
        self.chunk_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> String {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            self.default_response.clone()
        } else {
            responses.remove(0)
        }
    }

    fn status_error(status: u16) -> ChatError {
        ChatError::Status {
            code: status,
            body: "mock failure".into(),
        }
    }
}

fn synthesize_fragments(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = text
        .split_inclusive(' ')
        .map(|word| {
            serde_json::json!({
                "message": {"role": "assistant", "content": word},
                "done": false
            })
            .to_string()
        })
        .collect();
    lines.push(
        serde_json::json!({
            "message": {"role": "assistant", "content": ""},
            "done": true
        })
        .to_string(),
    );
    lines
}

impl ChatModel for MockChatModel {
    fn chat_chunk<'a>(
        &'a self,
        _messages: &'a [Message],
        _options: &'a ChatOptions,
        _format: Option<&'a str>,
    ) -> BoxFuture<'a, Result<ChatResponse, ChatError>> {
        Box::pin(async move {
            self.chunk_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(status) = self.fail_status {
                return Err(Self::status_error(status));
            }
            Ok(ChatResponse {
                message: ResponseMessage {
                    role: "assistant".into(),
                    content: self.next_response(),
                },
                done: true,
            })
        })
    }

    fn chat_stream<'a>(
        &'a self,
        _messages: &'a [Message],
        _options: &'a ChatOptions,
        _format: Option<&'a str>,
    ) -> BoxFuture<'a, Result<FragmentStream, ChatError>> {
        Box::pin(async move {
            self.stream_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(status) = self.fail_status {
                return Err(Self::status_error(status));
            }
            let lines = self
                .fragments
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| synthesize_fragments(&self.next_response()));
            let items: Vec<Result<String, ChatError>> = lines.into_iter().map(Ok).collect();
            Ok(Box::pin(futures::stream::iter(items)) as FragmentStream)
        })
    }
}
