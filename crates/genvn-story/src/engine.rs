//! Generation orchestration: retrieve lore, assemble the prompt, drive the
//! chat model, and decode its stream into story events.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde::Deserialize;

use genvn_llm::{ChatModel, ChatOptions, FragmentStream, Message};

use crate::error::StoryError;
use crate::memory::LoreRetriever;
use crate::prompt;
use crate::types::{StoryReply, StoryRequest};

/// One decoded item of a streaming generation.
///
/// A healthy stream is zero or more `Delta`s followed by exactly one `Done`.
/// A stream that errors terminates with `Err` instead of `Done`, so a
/// truncated stream is never mistaken for a complete answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoryEvent {
    Delta(String),
    Done,
}

pub type StoryStream =
    std::pin::Pin<Box<dyn Stream<Item = Result<StoryEvent, StoryError>> + Send>>;

#[derive(Clone, Copy, Debug)]
pub struct StoryConfig {
    /// Maximum lore fragments embedded into one prompt.
    pub lore_limit: usize,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self { lore_limit: 8 }
    }
}

pub struct StoryEngine {
    chat: Arc<dyn ChatModel>,
    lore: Arc<dyn LoreRetriever>,
    config: StoryConfig,
}

impl StoryEngine {
    #[must_use]
    pub fn new(
        chat: Arc<dyn ChatModel>,
        lore: Arc<dyn LoreRetriever>,
        config: StoryConfig,
    ) -> Self {
        Self { chat, lore, config }
    }

    /// Generate the next turn as one aggregated reply.
    ///
    /// # Errors
    ///
    /// Returns an error if lore retrieval or the chat call fails.
    pub async fn generate_chunk(
        &self,
        request: &StoryRequest,
        options: &ChatOptions,
    ) -> Result<StoryReply, StoryError> {
        let messages = self.assemble(request).await?;
        let response = self.chat.chat_chunk(&messages, options, None).await?;
        Ok(StoryReply {
            text: response.message.content,
        })
    }

    /// Generate the next turn as a pull-based stream of [`StoryEvent`]s.
    ///
    /// One connection is held for the lifetime of the returned stream;
    /// dropping it early closes the connection without error and persists
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if lore retrieval fails or the stream cannot be
    /// opened.
    pub async fn generate_stream(
        &self,
        request: &StoryRequest,
        options: &ChatOptions,
    ) -> Result<StoryStream, StoryError> {
        let messages = self.assemble(request).await?;
        let fragments = self.chat.chat_stream(&messages, options, None).await?;
        Ok(decode_fragments(fragments))
    }

    /// Retrieve lore and build the message list. Prompt construction itself
    /// is pure; the only side effect here is the retrieval call.
    async fn assemble(&self, request: &StoryRequest) -> Result<Vec<Message>, StoryError> {
        let mut lore = self
            .lore
            .retrieve(
                &request.scene_id,
                &request.context,
                &request.user_choice,
                &request.active_characters,
            )
            .await?;
        lore.truncate(self.config.lore_limit);
        tracing::debug!(
            scene_id = %request.scene_id,
            lore = lore.len(),
            history = request.history.len(),
            "assembling generation prompt"
        );

        let system = prompt::build_system_prompt(request, &lore);
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(Message::system(system));
        for turn in &request.history {
            messages.push(Message {
                role: turn.role,
                content: turn.content.clone(),
                images: Vec::new(),
            });
        }
        messages.push(Message::user(request.user_choice.clone()));
        Ok(messages)
    }
}

/// Wire shape of one streamed fragment from the inference service.
#[derive(Deserialize)]
struct WireFragment {
    #[serde(default)]
    message: Option<WireMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: String,
}

struct DecodeState {
    fragments: FragmentStream,
    pending_done: bool,
    terminated: bool,
}

/// Decode raw NDJSON fragments into story events.
///
/// Terminates with `Done` on the service's completion flag, or with a single
/// `Err` on a malformed fragment, a service-reported error, or an upstream
/// end without the completion flag.
fn decode_fragments(fragments: FragmentStream) -> StoryStream {
    let state = DecodeState {
        fragments,
        pending_done: false,
        terminated: false,
    };

    Box::pin(futures::stream::unfold(state, |mut st| async move {
        loop {
            if st.terminated {
                return None;
            }
            if st.pending_done {
                st.terminated = true;
                return Some((Ok(StoryEvent::Done), st));
            }

            match st.fragments.next().await {
                None => {
                    st.terminated = true;
                    return Some((Err(StoryError::Truncated), st));
                }
                Some(Err(e)) => {
                    st.terminated = true;
                    return Some((Err(StoryError::Chat(e)), st));
                }
                Some(Ok(line)) => {
                    let fragment: WireFragment = match serde_json::from_str(&line) {
                        Ok(fragment) => fragment,
                        Err(e) => {
                            st.terminated = true;
                            return Some((Err(StoryError::Fragment(e.to_string())), st));
                        }
                    };

                    if let Some(error) = fragment.error {
                        st.terminated = true;
                        return Some((Err(StoryError::Generation(error)), st));
                    }

                    let delta = fragment.message.map(|m| m.content).unwrap_or_default();
                    if fragment.done {
                        if delta.is_empty() {
                            st.terminated = true;
                            return Some((Ok(StoryEvent::Done), st));
                        }
                        st.pending_done = true;
                        return Some((Ok(StoryEvent::Delta(delta)), st));
                    }
                    if delta.is_empty() {
                        continue;
                    }
                    return Some((Ok(StoryEvent::Delta(delta)), st));
                }
            }
        }
    }))
}
