//! Normalized conversation messages
//!
//! The router and every provider adapter consume this shape. It serializes to
//! the OpenAI-style chat message format (`content` is either a string or a list
//! of typed parts).

use serde::{Deserialize, Serialize};

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Image reference already resolved to a provider-consumable form
///
/// Either a `data:` URL carrying inlined base64 bytes or a remote `http(s)` URL.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the reference is a form providers can fetch or decode themselves
    pub fn is_resolvable(url: &str) -> bool {
        url.starts_with("data:") || url.starts_with("http://") || url.starts_with("https://")
    }
}

impl From<&str> for ImageRef {
    fn from(url: &str) -> Self {
        Self(url.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// One element of a multi-part message
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

/// Message body: plain text, or parts when images are attached
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// First text part (or the whole text), empty if there is none
    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Parts(parts) => parts
                .iter()
                .find_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .unwrap_or(""),
        }
    }

    pub fn image_count(&self) -> usize {
        match self {
            Self::Text(_) => 0,
            Self::Parts(parts) => parts
                .iter()
                .filter(|part| matches!(part, ContentPart::ImageUrl { .. }))
                .count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NormalizedMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl NormalizedMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }

    /// User turn in parts form: the text first, then one part per image
    pub fn user_with_images(text: impl Into<String>, images: &[ImageRef]) -> Self {
        let mut parts = Vec::with_capacity(images.len() + 1);
        parts.push(ContentPart::Text { text: text.into() });
        parts.extend(images.iter().map(|image| ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: image.as_str().to_string(),
            },
        }));
        Self {
            role: Role::User,
            content: MessageContent::Parts(parts),
        }
    }
}
