//! Chat-model adapter for GenVN.
//!
//! One concrete backend (Ollama over raw HTTP) behind the [`ChatModel`]
//! trait. Blocking calls return a parsed aggregated reply; streaming calls
//! return the service's newline-delimited JSON fragments opaque, leaving
//! delta extraction to the caller.

mod error;
mod http;
mod lines;
pub mod message;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod ollama;
pub mod provider;
mod retry;

pub use error::ChatError;
pub use message::{Message, Role};
pub use provider::{BoxFuture, ChatModel, ChatOptions, ChatResponse, FragmentStream, ResponseMessage};
