use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One conversation turn, optionally carrying base64-encoded image
/// attachments for vision-capable requests. Request-scoped, never persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl Message {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            images: Vec::new(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            images: Vec::new(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            images: Vec::new(),
        }
    }

    /// User turn with one attached image, base64-encoded for the wire.
    #[must_use]
    pub fn user_with_image(content: impl Into<String>, image: &[u8]) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            images: vec![STANDARD.encode(image)],
        }
    }

    #[must_use]
    pub fn has_images(&self) -> bool {
        !self.images.is_empty()
    }
}
