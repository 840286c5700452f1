//! Application state - Dependency injection container.
//!
//! Provides centralized access to all application services and
//! infrastructure for the HTTP layer.

use std::sync::Arc;

use crate::config::Config;
use crate::infra::{Cache, Database, JobQueue};
use crate::realtime::{Hub, Notifier};
use crate::services::{
    AuthService, MessageService, ServiceContainer, ServiceLifecycle, Services, UserService,
};

/// Application state containing all services (DI container).
#[derive(Clone)]
pub struct AppState {
    /// Authentication service
    pub auth_service: Arc<dyn AuthService>,
    /// User service
    pub user_service: Arc<dyn UserService>,
    /// Service lifecycle
    pub lifecycle: Arc<dyn ServiceLifecycle>,
    /// Messaging service
    pub message_service: Arc<dyn MessageService>,
    /// Realtime notification hub (WebSocket rooms)
    pub hub: Arc<Hub>,
    /// Redis cache
    pub cache: Arc<Cache>,
    /// Database connection
    pub database: Arc<Database>,
}

impl AppState {
    /// Create application state from infrastructure and config.
    ///
    /// Builds the full service graph with the hub injected as the
    /// notification collaborator.
    pub fn from_config(
        database: Arc<Database>,
        cache: Arc<Cache>,
        hub: Arc<Hub>,
        jobs: Option<Arc<JobQueue>>,
        config: Config,
    ) -> Self {
        let notifier: Arc<dyn Notifier> = hub.clone();
        let container = Services::from_connection(
            database.get_connection(),
            config,
            notifier,
            Some(cache.clone()),
            jobs,
        );

        Self {
            auth_service: container.auth(),
            user_service: container.users(),
            lifecycle: container.lifecycle(),
            message_service: container.messages(),
            hub,
            cache,
            database,
        }
    }

    /// Create application state with manually injected services.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        auth_service: Arc<dyn AuthService>,
        user_service: Arc<dyn UserService>,
        lifecycle: Arc<dyn ServiceLifecycle>,
        message_service: Arc<dyn MessageService>,
        hub: Arc<Hub>,
        cache: Arc<Cache>,
        database: Arc<Database>,
    ) -> Self {
        Self {
            auth_service,
            user_service,
            lifecycle,
            message_service,
            hub,
            cache,
            database,
        }
    }
}
