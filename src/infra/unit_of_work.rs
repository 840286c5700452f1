//! Unit of Work pattern implementation.
//!
//! Centralizes repository access and manages transaction lifecycle
//! (begin, commit, rollback). The only operation that needs
//! multi-record atomicity is completion settlement: the status flip,
//! both credit adjustments and the rating recompute must commit or
//! roll back together.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    AccessMode, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, IsolationLevel,
    QueryFilter, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

use super::repositories::entities::{service, user};
use super::repositories::{
    MessageRepository, MessageStore, ServiceRepository, ServiceStore, UserRepository, UserStore,
};
use crate::domain::{Feedback, ServiceStatus};
use crate::errors::{AppError, AppResult};

/// Unit of Work trait for dependency injection.
///
/// Provides centralized access to all repositories and transaction
/// management. Note: the generic transaction method is not mockable;
/// for testing, mock at the repository level.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Get user repository
    fn users(&self) -> Arc<dyn UserRepository>;

    /// Get service repository
    fn services(&self) -> Arc<dyn ServiceRepository>;

    /// Get message repository
    fn messages(&self) -> Arc<dyn MessageRepository>;

    /// Execute a closure within a transaction.
    ///
    /// The transaction is automatically committed on success or rolled
    /// back on error. Uses ReadCommitted isolation.
    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(
                TransactionContext<'a>,
            ) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = AppResult<T>> + Send + 'a>,
            > + Send,
        T: Send;
}

/// Transaction context providing repository access within a transaction.
pub struct TransactionContext<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TransactionContext<'a> {
    fn new(txn: &'a DatabaseTransaction) -> Self {
        Self { txn }
    }

    /// User writes scoped to this transaction
    pub fn users(&self) -> TxUserRepository<'_> {
        TxUserRepository::new(self.txn)
    }

    /// Service writes scoped to this transaction
    pub fn services(&self) -> TxServiceRepository<'_> {
        TxServiceRepository::new(self.txn)
    }
}

/// Concrete implementation of UnitOfWork
pub struct Persistence {
    db: DatabaseConnection,
    user_repo: Arc<UserStore>,
    service_repo: Arc<ServiceStore>,
    message_repo: Arc<MessageStore>,
}

impl Persistence {
    /// Create new UnitOfWork instance
    pub fn new(db: DatabaseConnection) -> Self {
        let user_repo = Arc::new(UserStore::new(db.clone()));
        let service_repo = Arc::new(ServiceStore::new(db.clone()));
        let message_repo = Arc::new(MessageStore::new(db.clone()));
        Self {
            db,
            user_repo,
            service_repo,
            message_repo,
        }
    }
}

#[async_trait]
impl UnitOfWork for Persistence {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.user_repo.clone()
    }

    fn services(&self) -> Arc<dyn ServiceRepository> {
        self.service_repo.clone()
    }

    fn messages(&self) -> Arc<dyn MessageRepository> {
        self.message_repo.clone()
    }

    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(
                TransactionContext<'a>,
            ) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = AppResult<T>> + Send + 'a>,
            > + Send,
        T: Send,
    {
        let txn = self
            .db
            .begin_with_config(
                Some(IsolationLevel::ReadCommitted),
                Some(AccessMode::ReadWrite),
            )
            .await
            .map_err(AppError::from)?;

        let ctx = TransactionContext::new(&txn);

        match f(ctx).await {
            Ok(result) => {
                txn.commit().await.map_err(AppError::from)?;
                Ok(result)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::error!("Transaction rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}

/// Transaction-aware user repository.
///
/// Carries only the writes the settlement transaction needs; general
/// user access goes through [`UserRepository`].
pub struct TxUserRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TxUserRepository<'a> {
    fn new(txn: &'a DatabaseTransaction) -> Self {
        Self { txn }
    }

    /// Add `delta` (possibly negative) to the user's credit balance.
    ///
    /// Balances are allowed to go negative: the requester side of a
    /// settlement is a debt ledger, not a floored wallet.
    pub async fn adjust_credits(&self, id: Uuid, delta: i64) -> AppResult<()> {
        let result = user::Entity::update_many()
            .col_expr(
                user::Column::Credits,
                Expr::col(user::Column::Credits).add(delta),
            )
            .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(user::Column::Id.eq(id))
            .exec(self.txn)
            .await
            .map_err(AppError::from)?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    /// Overwrite the user's derived rating.
    pub async fn set_rating(&self, id: Uuid, rating: f64) -> AppResult<()> {
        let result = user::Entity::update_many()
            .col_expr(user::Column::Rating, Expr::value(rating))
            .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(user::Column::Id.eq(id))
            .exec(self.txn)
            .await
            .map_err(AppError::from)?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}

/// Transaction-aware service repository.
pub struct TxServiceRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TxServiceRepository<'a> {
    fn new(txn: &'a DatabaseTransaction) -> Self {
        Self { txn }
    }

    /// Conditionally move `from` -> `to` inside the transaction.
    ///
    /// Re-checks the current status in the write itself; zero rows
    /// affected means a concurrent caller got there first and the
    /// settlement must abort.
    pub async fn transition(
        &self,
        id: Uuid,
        from: ServiceStatus,
        to: ServiceStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> AppResult<u64> {
        let mut update = service::Entity::update_many()
            .col_expr(service::Column::Status, Expr::value(to.as_str()))
            .col_expr(service::Column::UpdatedAt, Expr::value(Utc::now()));

        if let Some(completed_at) = completed_at {
            update = update.col_expr(service::Column::CompletedAt, Expr::value(completed_at));
        }

        let result = update
            .filter(service::Column::Id.eq(id))
            .filter(service::Column::Status.eq(from.as_str()))
            .exec(self.txn)
            .await
            .map_err(AppError::from)?;

        Ok(result.rows_affected)
    }

    /// Requester ratings over the provider's completed services,
    /// read inside the transaction so the rating recompute sees the
    /// just-settled state.
    pub async fn completed_ratings(&self, provider: Uuid) -> AppResult<Vec<f64>> {
        let models = service::Entity::find()
            .filter(service::Column::ProviderId.eq(provider))
            .filter(service::Column::Status.eq(ServiceStatus::Completed.as_str()))
            .all(self.txn)
            .await
            .map_err(AppError::from)?;

        Ok(models
            .into_iter()
            .filter_map(|model| {
                let feedback: Feedback = serde_json::from_value(model.feedback).ok()?;
                feedback.from_requester.map(|entry| f64::from(entry.rating))
            })
            .collect())
    }
}
