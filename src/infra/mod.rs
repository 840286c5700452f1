//! Infrastructure layer - External systems integration
//!
//! This module handles all external system concerns:
//! - Database connections and repositories
//! - Caching (Redis)
//! - Background job storage
//! - Unit of Work for transaction management

pub mod cache;
pub mod db;
pub mod jobs;
pub mod repositories;
pub mod unit_of_work;

pub use cache::Cache;
pub use db::{Database, Migrator};
pub use jobs::JobQueue;
pub use repositories::{
    MessageRepository, MessageStore, NewService, NewUser, ProfileChanges, ServiceChanges,
    ServiceFilter, ServiceRepository, ServiceSort, ServiceStore, UserRepository, UserSearch,
    UserStore,
};
pub use unit_of_work::{
    Persistence, TransactionContext, TxServiceRepository, TxUserRepository, UnitOfWork,
};

#[cfg(any(test, feature = "test-utils"))]
pub use repositories::{MockMessageRepository, MockServiceRepository, MockUserRepository};
