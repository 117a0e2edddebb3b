//! Chat endpoint handler
//!
//! Handles POST /api/chat: stores the user turn, routes it to a model with
//! failover, stores the reply and returns both messages.

use crate::chat::store::{DEFAULT_CHAT_TITLE, title_from_message};
use crate::chat::{Attachment, NewMessage, StoredMessage, image_refs, prepare_messages};
use crate::error::{AppError, AppResult};
use crate::handlers::AppState;
use crate::middleware::{AuthUser, RequestId};
use crate::router::{ModelSelection, RouterOutcome, RouterRequest};
use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Serialize};

/// Maximum allowed message length in characters (100K chars)
const MAX_MESSAGE_LENGTH: usize = 100_000;

/// Prefix of the assistant message stored when no model could answer
pub const FAILURE_REPLY_PREFIX: &str = "Sorry, I encountered an error processing your request: ";

/// Chat request from client
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    chat_id: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    attachments: Vec<Attachment>,
    #[serde(default)]
    model: ModelSelection,
}

impl ChatRequest {
    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    /// Message text, empty when absent
    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn model(&self) -> &ModelSelection {
        &self.model
    }

    /// Reject turns with nothing to send and oversized messages
    pub fn validate(&self) -> AppResult<()> {
        if self.message().trim().is_empty() && self.attachments.is_empty() {
            return Err(AppError::Validation(
                "Message or attachment required".to_string(),
            ));
        }

        let char_count = self.message().chars().count();
        if char_count > MAX_MESSAGE_LENGTH {
            return Err(AppError::Validation(format!(
                "message exceeds maximum length of {} characters (got {})",
                MAX_MESSAGE_LENGTH, char_count
            )));
        }

        Ok(())
    }
}

/// Chat response to client
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub chat_id: String,
    pub user_message: StoredMessage,
    pub assistant_message: StoredMessage,
    /// Display name of the model that answered; absent on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
}

/// POST /api/chat handler
pub async fn handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    user: AuthUser,
    Json(request): Json<ChatRequest>,
) -> AppResult<Json<ChatResponse>> {
    request.validate()?;

    let store = state.store();
    let text = request.message();

    let chat = match request.chat_id() {
        Some(chat_id) => store
            .find_chat(user.id(), chat_id)
            .await?
            .ok_or(AppError::NotFound("Chat"))?,
        None => {
            store
                .create_chat(user.id(), &title_from_message(text))
                .await?
        }
    };

    let history = store.messages(&chat.id).await?;
    let user_message = store
        .append_message(
            &chat.id,
            NewMessage::user(text, request.attachments().to_vec()),
        )
        .await?;

    let images = image_refs(request.attachments());
    let messages = prepare_messages(
        &state.config().chat.system_prompt,
        &history,
        text,
        &images,
    );
    let routed = RouterRequest::new(messages, request.model().clone()).with_images(images);

    tracing::info!(
        request_id = %request_id,
        chat_id = %chat.id,
        selection = %request.model(),
        history_len = history.len(),
        image_count = routed.image_refs.len(),
        "Routing chat turn"
    );

    let (reply, model_used) = match state.router().route(&routed).await {
        Ok(RouterOutcome::Success {
            response,
            model_used,
        }) => (response, Some(model_used)),
        Ok(RouterOutcome::Failure { error }) => {
            tracing::warn!(
                request_id = %request_id,
                chat_id = %chat.id,
                error = %error,
                "No model produced a reply"
            );
            (format!("{}{}", FAILURE_REPLY_PREFIX, error), None)
        }
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                chat_id = %chat.id,
                error = %e,
                "Router is not configured"
            );
            (format!("{}{}", FAILURE_REPLY_PREFIX, e), None)
        }
    };

    let assistant_message = store
        .append_message(&chat.id, NewMessage::assistant(reply))
        .await?;

    let retitle = (chat.title == DEFAULT_CHAT_TITLE && !text.is_empty())
        .then(|| title_from_message(text));
    store.touch_chat(&chat.id, retitle.as_deref()).await?;

    tracing::info!(
        request_id = %request_id,
        chat_id = %chat.id,
        model_used = ?model_used,
        "Chat turn completed"
    );

    Ok(Json(ChatResponse {
        chat_id: chat.id,
        user_message,
        assistant_message,
        model_used,
    }))
}
