//! Repository layer - Data access abstraction
//!
//! Repositories provide an abstraction over data persistence,
//! following the Repository pattern for clean separation of concerns.

pub(crate) mod entities;
mod message_repository;
mod service_repository;
mod user_repository;

pub use message_repository::{MessageRepository, MessageStore};
pub use service_repository::{
    NewService, ServiceChanges, ServiceFilter, ServiceRepository, ServiceSort, ServiceStore,
};
pub use user_repository::{NewUser, ProfileChanges, UserRepository, UserSearch, UserStore};

// Export mocks for tests (both unit and integration)
#[cfg(any(test, feature = "test-utils"))]
pub use message_repository::MockMessageRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use service_repository::MockServiceRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use user_repository::MockUserRepository;
