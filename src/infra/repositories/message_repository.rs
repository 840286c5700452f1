//! Message repository - data access for direct messages.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

use super::entities::message::{self, ActiveModel, Entity as MessageEntity};
use crate::domain::Message;
use crate::errors::{AppError, AppResult};

/// Message repository trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create(&self, sender: Uuid, recipient: Uuid, content: String) -> AppResult<Message>;

    /// All messages the user sent or received, newest first
    async fn list_involving(&self, user: Uuid) -> AppResult<Vec<Message>>;

    /// The thread between two users, oldest first
    async fn between(&self, a: Uuid, b: Uuid) -> AppResult<Vec<Message>>;

    /// Flip read=true on unread messages from `sender` to `recipient`;
    /// returns the number flipped
    async fn mark_read(&self, recipient: Uuid, sender: Uuid) -> AppResult<u64>;
}

/// SeaORM-backed implementation of [`MessageRepository`].
pub struct MessageStore {
    db: DatabaseConnection,
}

impl MessageStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MessageRepository for MessageStore {
    async fn create(&self, sender: Uuid, recipient: Uuid, content: String) -> AppResult<Message> {
        let active_model = ActiveModel {
            id: Set(Uuid::new_v4()),
            sender_id: Set(sender),
            recipient_id: Set(recipient),
            content: Set(content),
            read: Set(false),
            created_at: Set(Utc::now()),
        };

        let model = active_model.insert(&self.db).await.map_err(AppError::from)?;

        Ok(Message::from(model))
    }

    async fn list_involving(&self, user: Uuid) -> AppResult<Vec<Message>> {
        let models = MessageEntity::find()
            .filter(
                Condition::any()
                    .add(message::Column::SenderId.eq(user))
                    .add(message::Column::RecipientId.eq(user)),
            )
            .order_by_desc(message::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(models.into_iter().map(Message::from).collect())
    }

    async fn between(&self, a: Uuid, b: Uuid) -> AppResult<Vec<Message>> {
        let models = MessageEntity::find()
            .filter(
                Condition::any()
                    .add(
                        Condition::all()
                            .add(message::Column::SenderId.eq(a))
                            .add(message::Column::RecipientId.eq(b)),
                    )
                    .add(
                        Condition::all()
                            .add(message::Column::SenderId.eq(b))
                            .add(message::Column::RecipientId.eq(a)),
                    ),
            )
            .order_by_asc(message::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(models.into_iter().map(Message::from).collect())
    }

    async fn mark_read(&self, recipient: Uuid, sender: Uuid) -> AppResult<u64> {
        let result = MessageEntity::update_many()
            .col_expr(message::Column::Read, Expr::value(true))
            .filter(message::Column::RecipientId.eq(recipient))
            .filter(message::Column::SenderId.eq(sender))
            .filter(message::Column::Read.eq(false))
            .exec(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(result.rows_affected)
    }
}
