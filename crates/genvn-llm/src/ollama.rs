//! Ollama chat adapter over raw HTTP.
//!
//! Speaks the `/api/chat` JSON protocol directly: one POST per call,
//! `stream: true` responses arrive as newline-delimited JSON objects that are
//! passed through opaque (see [`FragmentStream`]).

use std::time::Duration;

use serde::Serialize;

use crate::error::ChatError;
use crate::lines::ndjson_lines;
use crate::message::Message;
use crate::provider::{BoxFuture, ChatModel, ChatOptions, ChatResponse, FragmentStream};
use crate::retry::send_with_retry;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_STREAM_READ_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone)]
pub struct OllamaAdapter {
    client: reqwest::Client,
    stream_client: reqwest::Client,
    base_url: String,
    model: String,
    vision_model: Option<String>,
    max_retries: u32,
    stream_read_timeout: Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    options: &'a ChatOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
}

impl OllamaAdapter {
    #[must_use]
    pub fn new(base_url: &str, model: String) -> Self {
        Self {
            client: crate::http::blocking_client(DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT),
            stream_client: crate::http::streaming_client(DEFAULT_CONNECT_TIMEOUT),
            base_url: base_url.trim_end_matches('/').to_owned(),
            model,
            vision_model: None,
            max_retries: DEFAULT_MAX_RETRIES,
            stream_read_timeout: DEFAULT_STREAM_READ_TIMEOUT,
        }
    }

    /// Model substituted when any message carries image attachments.
    #[must_use]
    pub fn with_vision_model(mut self, model: String) -> Self {
        self.vision_model = Some(model);
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Rebuild the HTTP clients with explicit timeouts.
    #[must_use]
    pub fn with_timeouts(
        mut self,
        connect_timeout: Duration,
        request_timeout: Duration,
        stream_read_timeout: Duration,
    ) -> Self {
        self.client = crate::http::blocking_client(connect_timeout, request_timeout);
        self.stream_client = crate::http::streaming_client(connect_timeout);
        self.stream_read_timeout = stream_read_timeout;
        self
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn model_for(&self, messages: &[Message]) -> &str {
        if messages.iter().any(Message::has_images) {
            self.vision_model.as_deref().unwrap_or(&self.model)
        } else {
            &self.model
        }
    }

    /// List model names known to the service. Doubles as a reachability
    /// check at startup.
    ///
    /// # Errors
    ///
    /// Returns a transport or status error if the service is unreachable or
    /// unhealthy.
    pub async fn list_models(&self) -> Result<Vec<String>, ChatError> {
        #[derive(serde::Deserialize)]
        struct Tags {
            #[serde(default)]
            models: Vec<TagModel>,
        }
        #[derive(serde::Deserialize)]
        struct TagModel {
            name: String,
        }

        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ChatError::Status {
                code: status.as_u16(),
                body: text,
            });
        }
        let tags: Tags = serde_json::from_str(&text)?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn send_chunk(
        &self,
        messages: &[Message],
        options: &ChatOptions,
        format: Option<&str>,
    ) -> Result<ChatResponse, ChatError> {
        let body = ChatRequest {
            model: self.model_for(messages),
            messages,
            stream: false,
            options,
            format,
        };
        let url = self.chat_url();

        let response = send_with_retry(self.max_retries, || {
            self.client.post(&url).json(&body).send()
        })
        .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            tracing::error!("chat request failed with status {status}");
            return Err(ChatError::Status {
                code: status.as_u16(),
                body: text,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text)?;
        Ok(parsed)
    }

    async fn send_stream(
        &self,
        messages: &[Message],
        options: &ChatOptions,
        format: Option<&str>,
    ) -> Result<FragmentStream, ChatError> {
        let body = ChatRequest {
            model: self.model_for(messages),
            messages,
            stream: true,
            options,
            format,
        };
        let url = self.chat_url();

        // Retry covers connection establishment only; a live stream is never
        // restarted.
        let response = send_with_retry(self.max_retries, || {
            self.stream_client.post(&url).json(&body).send()
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await?;
            tracing::error!("chat streaming request failed with status {status}");
            return Err(ChatError::Status {
                code: status.as_u16(),
                body: text,
            });
        }

        Ok(ndjson_lines(response, self.stream_read_timeout))
    }
}

impl ChatModel for OllamaAdapter {
    fn chat_chunk<'a>(
        &'a self,
        messages: &'a [Message],
        options: &'a ChatOptions,
        format: Option<&'a str>,
    ) -> BoxFuture<'a, Result<ChatResponse, ChatError>> {
        Box::pin(self.send_chunk(messages, options, format))
    }

    fn chat_stream<'a>(
        &'a self,
        messages: &'a [Message],
        options: &'a ChatOptions,
        format: Option<&'a str>,
    ) -> BoxFuture<'a, Result<FragmentStream, ChatError>> {
        Box::pin(self.send_stream(messages, options, format))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(url: &str) -> OllamaAdapter {
        OllamaAdapter::new(url, "gemma3".into()).with_max_retries(0)
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let a = OllamaAdapter::new("http://localhost:11434/", "m".into());
        assert_eq!(a.chat_url(), "http://localhost:11434/api/chat");
    }

    #[test]
    fn model_selection_switches_on_images() {
        let a = OllamaAdapter::new("http://localhost:11434", "gemma3".into())
            .with_vision_model("llava".into());
        let text_only = [Message::user("hi")];
        let with_image = [Message::user_with_image("look", &[1, 2, 3])];
        assert_eq!(a.model_for(&text_only), "gemma3");
        assert_eq!(a.model_for(&with_image), "llava");
    }

    #[test]
    fn model_selection_falls_back_without_vision_model() {
        let a = OllamaAdapter::new("http://localhost:11434", "gemma3".into());
        let with_image = [Message::user_with_image("look", &[1, 2, 3])];
        assert_eq!(a.model_for(&with_image), "gemma3");
    }

    #[test]
    fn request_serializes_format_only_when_set() {
        let options = ChatOptions::new();
        let messages = [Message::user("hi")];
        let without = serde_json::to_value(ChatRequest {
            model: "m",
            messages: &messages,
            stream: false,
            options: &options,
            format: None,
        })
        .unwrap();
        assert!(without.get("format").is_none());

        let with = serde_json::to_value(ChatRequest {
            model: "m",
            messages: &messages,
            stream: true,
            options: &options,
            format: Some("json"),
        })
        .unwrap();
        assert_eq!(with.get("format").unwrap(), "json");
        assert_eq!(with.get("stream").unwrap(), true);
    }

    #[tokio::test]
    async fn chat_chunk_parses_complete_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({"stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "gemma3",
                "message": {"role": "assistant", "content": "a dim hangar"},
                "done": true
            })))
            .mount(&server)
            .await;

        let response = adapter(&server.uri())
            .send_chunk(&[Message::user("caption this")], &ChatOptions::new(), None)
            .await
            .unwrap();
        assert_eq!(response.message.content, "a dim hangar");
        assert!(response.done);
    }

    #[tokio::test]
    async fn chat_chunk_non_success_surfaces_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model exploded"))
            .expect(1)
            .mount(&server)
            .await;

        let err = adapter(&server.uri())
            .send_chunk(&[Message::user("hi")], &ChatOptions::new(), None)
            .await
            .unwrap_err();
        match err {
            ChatError::Status { code, body } => {
                assert_eq!(code, 500);
                assert_eq!(body, "model exploded");
            }
            other => panic!("expected Status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_success_is_never_retried() {
        let server = MockServer::start().await;
        // expect(1) fails the test on a second (retried) request
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let a = OllamaAdapter::new(&server.uri(), "m".into()).with_max_retries(5);
        let err = a
            .send_chunk(&[Message::user("hi")], &ChatOptions::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Status { code: 503, .. }));
    }

    #[tokio::test]
    async fn chat_chunk_unreachable_is_transport() {
        let a = OllamaAdapter::new("http://127.0.0.1:1", "m".into()).with_max_retries(0);
        let err = a
            .send_chunk(&[Message::user("hi")], &ChatOptions::new(), None)
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn chat_stream_yields_raw_fragments() {
        let server = MockServer::start().await;
        let ndjson = concat!(
            r#"{"message":{"role":"assistant","content":"Once"},"done":false}"#,
            "\n",
            r#"{"message":{"role":"assistant","content":" upon"},"done":false}"#,
            "\n",
            r#"{"message":{"role":"assistant","content":""},"done":true}"#,
            "\n",
        );
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(ndjson, "application/x-ndjson"))
            .mount(&server)
            .await;

        let mut stream = adapter(&server.uri())
            .send_stream(&[Message::user("go")], &ChatOptions::new(), None)
            .await
            .unwrap();

        let mut fragments = Vec::new();
        while let Some(item) = stream.next().await {
            fragments.push(item.unwrap());
        }
        assert_eq!(fragments.len(), 3);
        // Fragments are opaque lines, not parsed values.
        assert!(fragments[0].starts_with('{'));
        assert!(fragments[2].contains("\"done\":true"));
    }

    #[tokio::test]
    async fn chat_stream_early_drop_is_clean() {
        let server = MockServer::start().await;
        let ndjson = concat!(
            r#"{"message":{"role":"assistant","content":"a"},"done":false}"#,
            "\n",
            r#"{"message":{"role":"assistant","content":"b"},"done":true}"#,
            "\n",
        );
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(ndjson, "application/x-ndjson"))
            .mount(&server)
            .await;

        let mut stream = adapter(&server.uri())
            .send_stream(&[Message::user("go")], &ChatOptions::new(), None)
            .await
            .unwrap();

        let first = stream.next().await.unwrap().unwrap();
        assert!(first.contains("\"a\""));
        // Dropping with fragments outstanding closes the connection quietly.
        drop(stream);
    }

    #[tokio::test]
    async fn chat_stream_non_success_surfaces_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such model"))
            .mount(&server)
            .await;

        let err = match adapter(&server.uri())
            .send_stream(&[Message::user("go")], &ChatOptions::new(), None)
            .await
        {
            Ok(_) => panic!("expected error"),
            Err(e) => e,
        };
        assert!(matches!(err, ChatError::Status { code: 404, .. }));
    }

    #[tokio::test]
    async fn list_models_parses_tags() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [{"name": "gemma3"}, {"name": "llava"}]
            })))
            .mount(&server)
            .await;

        let models = adapter(&server.uri()).list_models().await.unwrap();
        assert_eq!(models, vec!["gemma3", "llava"]);
    }

    #[tokio::test]
    async fn vision_request_carries_base64_images() {
        let server = MockServer::start().await;
        let image = [0xFFu8, 0xD8, 0xFF, 0xE0];
        let encoded = {
            use base64::{Engine, engine::general_purpose::STANDARD};
            STANDARD.encode(image)
        };
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({
                "messages": [{"role": "user", "content": "describe", "images": [encoded]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": {"role": "assistant", "content": "a jpeg header"},
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = adapter(&server.uri())
            .send_chunk(
                &[Message::user_with_image("describe", &image)],
                &ChatOptions::new(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(response.message.content, "a jpeg header");
    }

    #[tokio::test]
    #[ignore = "requires running Ollama instance"]
    async fn integration_chat_chunk() {
        let a = OllamaAdapter::new("http://localhost:11434", "gemma3".into());
        let response = a
            .send_chunk(
                &[Message::user("Reply with exactly: pong")],
                &ChatOptions::new(),
                None,
            )
            .await
            .unwrap();
        assert!(response.message.content.to_lowercase().contains("pong"));
    }
}
