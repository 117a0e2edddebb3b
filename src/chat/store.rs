//! Chat persistence
//!
//! The handlers only need a narrow interface: create and look up a user's
//! chats, append messages, bump a chat's recency, delete. [`InMemoryChatStore`]
//! is the implementation used by the binary and the tests; a database-backed
//! store plugs in behind the same trait.

use crate::error::{AppError, AppResult};
use crate::message::Role;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Title given to chats started without any text
pub const DEFAULT_CHAT_TITLE: &str = "New Chat";

/// Maximum title length, in characters
pub const TITLE_MAX_CHARS: usize = 50;

/// Derive a chat title from the first message
pub fn title_from_message(message: &str) -> String {
    let title: String = message.chars().take(TITLE_MAX_CHARS).collect();
    if title.is_empty() {
        DEFAULT_CHAT_TITLE.to_string()
    } else {
        title
    }
}

/// File attached to a user message
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Attachment {
    #[serde(default)]
    pub filename: String,
    pub url: String,
    /// MIME type, e.g. `image/png`
    #[serde(rename = "type", default)]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    #[serde(skip_serializing)]
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: String,
    pub chat_id: String,
    pub role: Role,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
}

/// Chat listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

/// Message to be appended
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
    pub attachments: Vec<Attachment>,
}

impl NewMessage {
    pub fn user(content: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            attachments,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            attachments: Vec::new(),
        }
    }
}

/// Storage for chats and their messages
///
/// Every lookup that takes a `user_id` only returns chats owned by that
/// user; another user's chat id behaves exactly like an unknown one.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn create_chat(&self, user_id: &str, title: &str) -> AppResult<Chat>;

    async fn find_chat(&self, user_id: &str, chat_id: &str) -> AppResult<Option<Chat>>;

    /// The user's chats, most recently updated first
    async fn list_chats(&self, user_id: &str) -> AppResult<Vec<ChatSummary>>;

    /// Messages of a chat in creation order
    async fn messages(&self, chat_id: &str) -> AppResult<Vec<StoredMessage>>;

    async fn append_message(&self, chat_id: &str, message: NewMessage) -> AppResult<StoredMessage>;

    /// Bump `updated_at`, optionally renaming the chat
    async fn touch_chat(&self, chat_id: &str, title: Option<&str>) -> AppResult<()>;

    /// Returns false if the chat did not exist for this user
    async fn delete_chat(&self, user_id: &str, chat_id: &str) -> AppResult<bool>;
}

#[derive(Debug, Default)]
struct StoreState {
    chats: HashMap<String, StoredChat>,
    messages: HashMap<String, Vec<StoredMessage>>,
    revision: u64,
}

#[derive(Debug)]
struct StoredChat {
    chat: Chat,
    /// Tie-breaker for chats touched within the same clock tick
    revision: u64,
}

impl StoreState {
    fn next_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }
}

/// Process-local chat store
#[derive(Debug, Default)]
pub struct InMemoryChatStore {
    state: RwLock<StoreState>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn create_chat(&self, user_id: &str, title: &str) -> AppResult<Chat> {
        let now = Utc::now();
        let chat = Chat {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };

        let mut state = self.state.write().await;
        let revision = state.next_revision();
        state.messages.insert(chat.id.clone(), Vec::new());
        state.chats.insert(
            chat.id.clone(),
            StoredChat {
                chat: chat.clone(),
                revision,
            },
        );

        tracing::debug!(chat_id = %chat.id, user_id = %user_id, "Chat created");
        Ok(chat)
    }

    async fn find_chat(&self, user_id: &str, chat_id: &str) -> AppResult<Option<Chat>> {
        let state = self.state.read().await;
        Ok(state
            .chats
            .get(chat_id)
            .filter(|stored| stored.chat.user_id == user_id)
            .map(|stored| stored.chat.clone()))
    }

    async fn list_chats(&self, user_id: &str) -> AppResult<Vec<ChatSummary>> {
        let state = self.state.read().await;
        let mut owned: Vec<&StoredChat> = state
            .chats
            .values()
            .filter(|stored| stored.chat.user_id == user_id)
            .collect();
        owned.sort_by(|a, b| {
            (b.chat.updated_at, b.revision).cmp(&(a.chat.updated_at, a.revision))
        });

        Ok(owned
            .into_iter()
            .map(|stored| ChatSummary {
                id: stored.chat.id.clone(),
                title: stored.chat.title.clone(),
                created_at: stored.chat.created_at,
                updated_at: stored.chat.updated_at,
                message_count: state.messages.get(&stored.chat.id).map_or(0, Vec::len),
            })
            .collect())
    }

    async fn messages(&self, chat_id: &str) -> AppResult<Vec<StoredMessage>> {
        let state = self.state.read().await;
        Ok(state.messages.get(chat_id).cloned().unwrap_or_default())
    }

    async fn append_message(&self, chat_id: &str, message: NewMessage) -> AppResult<StoredMessage> {
        let mut state = self.state.write().await;
        let messages = state
            .messages
            .get_mut(chat_id)
            .ok_or(AppError::NotFound("Chat"))?;

        let stored = StoredMessage {
            id: Uuid::new_v4().to_string(),
            chat_id: chat_id.to_string(),
            role: message.role,
            content: message.content,
            attachments: message.attachments,
            created_at: Utc::now(),
        };
        messages.push(stored.clone());
        Ok(stored)
    }

    async fn touch_chat(&self, chat_id: &str, title: Option<&str>) -> AppResult<()> {
        let mut state = self.state.write().await;
        let revision = state.next_revision();
        let stored = state
            .chats
            .get_mut(chat_id)
            .ok_or(AppError::NotFound("Chat"))?;

        stored.chat.updated_at = Utc::now();
        stored.revision = revision;
        if let Some(title) = title {
            stored.chat.title = title.to_string();
        }
        Ok(())
    }

    async fn delete_chat(&self, user_id: &str, chat_id: &str) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let owned = state
            .chats
            .get(chat_id)
            .is_some_and(|stored| stored.chat.user_id == user_id);
        if !owned {
            return Ok(false);
        }

        state.chats.remove(chat_id);
        state.messages.remove(chat_id);
        tracing::debug!(chat_id = %chat_id, user_id = %user_id, "Chat deleted");
        Ok(true)
    }
}
