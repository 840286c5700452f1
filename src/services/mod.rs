//! Application services layer - Use cases and business logic.
//!
//! Services orchestrate domain logic and infrastructure to fulfill
//! application use cases. They depend on abstractions (traits) for
//! dependency inversion, and use the Unit of Work for repository
//! access and transaction management.

mod auth_service;
pub mod container;
mod lifecycle_service;
mod message_service;
mod user_service;

// Service Container
pub use container::{ServiceContainer, Services};

// Service traits and implementations
pub use auth_service::{AuthService, Authenticator, Claims, RegisteredUser, TokenResponse};
pub use lifecycle_service::{
    CompletionReceipt, EngagedService, LifecycleManager, ServiceLifecycle,
};
pub use message_service::{MessageService, Messenger};
pub use user_service::{
    Activity, ActivityKind, DashboardStats, PortfolioChanges, UserManager, UserService, UserStats,
};

// Parallel execution utilities
pub use container::parallel;

#[cfg(any(test, feature = "test-utils"))]
pub use container::MockServiceContainer;
