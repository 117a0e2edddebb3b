//! Chat history endpoints
//!
//! - GET /api/chats
//! - GET /api/chat/{chat_id}
//! - DELETE /api/chat/{chat_id}

use crate::chat::{Chat, ChatSummary, StoredMessage};
use crate::error::{AppError, AppResult};
use crate::handlers::AppState;
use crate::middleware::AuthUser;
use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;

/// A chat with all of its messages in creation order
#[derive(Debug, Serialize)]
pub struct ChatDetail {
    #[serde(flatten)]
    pub chat: Chat,
    pub messages: Vec<StoredMessage>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: &'static str,
}

/// GET /api/chats: the user's chats, most recently updated first
pub async fn list(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<Vec<ChatSummary>>> {
    let chats = state.store().list_chats(user.id()).await?;
    tracing::debug!(user_id = %user.id(), chat_count = chats.len(), "Listed chats");
    Ok(Json(chats))
}

/// GET /api/chat/{chat_id}
pub async fn get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(chat_id): Path<String>,
) -> AppResult<Json<ChatDetail>> {
    let chat = state
        .store()
        .find_chat(user.id(), &chat_id)
        .await?
        .ok_or(AppError::NotFound("Chat"))?;
    let messages = state.store().messages(&chat.id).await?;
    Ok(Json(ChatDetail { chat, messages }))
}

/// DELETE /api/chat/{chat_id}
///
/// Idempotent: deleting an unknown or foreign chat also succeeds.
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(chat_id): Path<String>,
) -> AppResult<Json<DeleteResponse>> {
    let deleted = state.store().delete_chat(user.id(), &chat_id).await?;
    tracing::info!(user_id = %user.id(), chat_id = %chat_id, deleted, "Chat delete requested");
    Ok(Json(DeleteResponse {
        message: "Chat deleted",
    }))
}
