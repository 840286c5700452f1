//! Message domain entity and conversation views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::UserSummary;

/// A direct message between two users.
///
/// Created on send; the only mutation the application performs is the
/// read-flag flip when the recipient opens the thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub sender: Uuid,
    pub recipient: Uuid,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Message with sender/recipient identity resolved
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: Uuid,
    pub sender: UserSummary,
    pub recipient: UserSummary,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl MessageResponse {
    pub fn new(message: Message, sender: UserSummary, recipient: UserSummary) -> Self {
        Self {
            id: message.id,
            sender,
            recipient,
            content: message.content,
            read: message.read,
            created_at: message.created_at,
        }
    }
}

/// The most recent message of a conversation
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

impl From<&Message> for LastMessage {
    fn from(message: &Message) -> Self {
        Self {
            content: message.content.clone(),
            created_at: message.created_at,
            read: message.read,
        }
    }
}

/// One entry per counterpart in the conversation overview
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub user: UserSummary,
    pub last_message: LastMessage,
    pub unread_count: u64,
}
