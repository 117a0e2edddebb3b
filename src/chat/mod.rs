//! Chat turn preparation
//!
//! Turns stored history plus the incoming turn into the normalized message
//! list handed to the router.

pub mod store;

pub use store::{
    Attachment, Chat, ChatStore, ChatSummary, InMemoryChatStore, NewMessage, StoredMessage,
};

use crate::message::{ImageRef, NormalizedMessage, Role};

/// User text sent when a turn has neither text nor images
pub const DEFAULT_USER_TEXT: &str = "Hello";

/// User text sent alongside images when the turn has no text
pub const DEFAULT_IMAGE_PROMPT: &str = "Please analyze this image.";

/// Image references for the attachments a provider can see
///
/// Keeps attachments whose MIME type starts with `image/` and whose URL is a
/// `data:` or `http(s)` URL. Anything else is skipped with a warning.
pub fn image_refs(attachments: &[Attachment]) -> Vec<ImageRef> {
    attachments
        .iter()
        .filter(|att| att.is_image())
        .filter_map(|att| {
            if ImageRef::is_resolvable(&att.url) {
                Some(ImageRef::new(att.url.as_str()))
            } else {
                tracing::warn!(
                    filename = %att.filename,
                    "Skipping image attachment with unsupported URL scheme"
                );
                None
            }
        })
        .collect()
}

/// Build the message list for one turn
///
/// System prompt first, then prior turns as plain text, then the new user
/// turn. Prior turns with empty content (image-only messages) are dropped.
pub fn prepare_messages(
    system_prompt: &str,
    history: &[StoredMessage],
    text: &str,
    images: &[ImageRef],
) -> Vec<NormalizedMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(NormalizedMessage::system(system_prompt));

    messages.extend(
        history
            .iter()
            .filter(|m| !m.content.trim().is_empty())
            .filter_map(|m| match m.role {
                Role::User => Some(NormalizedMessage::user(m.content.as_str())),
                Role::Assistant => Some(NormalizedMessage::assistant(m.content.as_str())),
                Role::System => None,
            }),
    );

    let user_turn = if images.is_empty() {
        NormalizedMessage::user(if text.is_empty() { DEFAULT_USER_TEXT } else { text })
    } else {
        let prompt = if text.is_empty() {
            DEFAULT_IMAGE_PROMPT
        } else {
            text
        };
        NormalizedMessage::user_with_images(prompt, images)
    };
    messages.push(user_turn);

    messages
}
