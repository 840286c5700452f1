//! Service container - centralized service construction and access.
//!
//! Builds the service graph over one Unit of Work, with the realtime
//! notifier injected explicitly rather than reached for ambiently.

use std::future::Future;
use std::sync::Arc;

use super::{
    AuthService, Authenticator, LifecycleManager, MessageService, Messenger, ServiceLifecycle,
    UserManager, UserService,
};
use crate::config::Config;
use crate::errors::AppResult;
use crate::infra::{Cache, JobQueue, Persistence};
use crate::realtime::Notifier;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Service container trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
pub trait ServiceContainer: Send + Sync {
    /// Get authentication service
    fn auth(&self) -> Arc<dyn AuthService>;

    /// Get user service
    fn users(&self) -> Arc<dyn UserService>;

    /// Get service lifecycle
    fn lifecycle(&self) -> Arc<dyn ServiceLifecycle>;

    /// Get messaging service
    fn messages(&self) -> Arc<dyn MessageService>;
}

/// Concrete implementation of ServiceContainer
pub struct Services {
    auth_service: Arc<dyn AuthService>,
    user_service: Arc<dyn UserService>,
    lifecycle_service: Arc<dyn ServiceLifecycle>,
    message_service: Arc<dyn MessageService>,
}

impl Services {
    /// Create a new service container from pre-built services
    pub fn new(
        auth_service: Arc<dyn AuthService>,
        user_service: Arc<dyn UserService>,
        lifecycle_service: Arc<dyn ServiceLifecycle>,
        message_service: Arc<dyn MessageService>,
    ) -> Self {
        Self {
            auth_service,
            user_service,
            lifecycle_service,
            message_service,
        }
    }

    /// Build the full service graph from a database connection
    pub fn from_connection(
        db: sea_orm::DatabaseConnection,
        config: Config,
        notifier: Arc<dyn Notifier>,
        cache: Option<Arc<Cache>>,
        jobs: Option<Arc<JobQueue>>,
    ) -> Self {
        let uow = Arc::new(Persistence::new(db));

        let mut authenticator = Authenticator::new(uow.clone(), config);
        if let Some(jobs) = jobs {
            authenticator = authenticator.with_job_queue(jobs);
        }

        let mut user_manager = UserManager::new(uow.clone());
        if let Some(cache) = cache {
            user_manager = user_manager.with_cache(cache);
        }

        let lifecycle = LifecycleManager::new(uow.clone(), notifier.clone());
        let messenger = Messenger::new(uow, notifier);

        Self {
            auth_service: Arc::new(authenticator),
            user_service: Arc::new(user_manager),
            lifecycle_service: Arc::new(lifecycle),
            message_service: Arc::new(messenger),
        }
    }
}

impl ServiceContainer for Services {
    fn auth(&self) -> Arc<dyn AuthService> {
        self.auth_service.clone()
    }

    fn users(&self) -> Arc<dyn UserService> {
        self.user_service.clone()
    }

    fn lifecycle(&self) -> Arc<dyn ServiceLifecycle> {
        self.lifecycle_service.clone()
    }

    fn messages(&self) -> Arc<dyn MessageService> {
        self.message_service.clone()
    }
}

/// Parallel execution utilities for independent operations.
///
/// Used where the original request fans several independent queries
/// out at once (listing pages, dashboard counters).
pub mod parallel {
    use super::*;
    use tokio::try_join;

    /// Execute two independent async operations in parallel.
    pub async fn join2<F1, F2, T1, T2>(f1: F1, f2: F2) -> AppResult<(T1, T2)>
    where
        F1: Future<Output = AppResult<T1>>,
        F2: Future<Output = AppResult<T2>>,
    {
        try_join!(f1, f2)
    }

    /// Execute three independent async operations in parallel.
    pub async fn join3<F1, F2, F3, T1, T2, T3>(f1: F1, f2: F2, f3: F3) -> AppResult<(T1, T2, T3)>
    where
        F1: Future<Output = AppResult<T1>>,
        F2: Future<Output = AppResult<T2>>,
        F3: Future<Output = AppResult<T3>>,
    {
        try_join!(f1, f2, f3)
    }

    /// Execute four independent async operations in parallel.
    pub async fn join4<F1, F2, F3, F4, T1, T2, T3, T4>(
        f1: F1,
        f2: F2,
        f3: F3,
        f4: F4,
    ) -> AppResult<(T1, T2, T3, T4)>
    where
        F1: Future<Output = AppResult<T1>>,
        F2: Future<Output = AppResult<T2>>,
        F3: Future<Output = AppResult<T3>>,
        F4: Future<Output = AppResult<T4>>,
    {
        try_join!(f1, f2, f3, f4)
    }

    /// Execute five independent async operations in parallel.
    pub async fn join5<F1, F2, F3, F4, F5, T1, T2, T3, T4, T5>(
        f1: F1,
        f2: F2,
        f3: F3,
        f4: F4,
        f5: F5,
    ) -> AppResult<(T1, T2, T3, T4, T5)>
    where
        F1: Future<Output = AppResult<T1>>,
        F2: Future<Output = AppResult<T2>>,
        F3: Future<Output = AppResult<T3>>,
        F4: Future<Output = AppResult<T4>>,
        F5: Future<Output = AppResult<T5>>,
    {
        try_join!(f1, f2, f3, f4, f5)
    }

    /// Execute a collection of homogeneous async operations in parallel.
    ///
    /// Results are returned in the same order as the input futures.
    pub async fn join_all<F, T>(futures: Vec<F>) -> AppResult<Vec<T>>
    where
        F: Future<Output = AppResult<T>>,
    {
        let results = futures::future::join_all(futures).await;
        results.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parallel_join2_returns_both_results() {
        async fn op1() -> AppResult<i32> {
            Ok(1)
        }
        async fn op2() -> AppResult<i32> {
            Ok(2)
        }

        let (a, b) = parallel::join2(op1(), op2()).await.unwrap();
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[tokio::test]
    async fn parallel_join2_propagates_errors() {
        async fn ok_op() -> AppResult<i32> {
            Ok(1)
        }
        async fn failing_op() -> AppResult<i32> {
            Err(crate::errors::AppError::NotFound)
        }

        assert!(parallel::join2(ok_op(), failing_op()).await.is_err());
    }

    #[tokio::test]
    async fn parallel_join_all_preserves_order() {
        let futures: Vec<_> = (0..5)
            .map(|i| async move { Ok(i) as AppResult<i32> })
            .collect();
        let results = parallel::join_all(futures).await.unwrap();
        assert_eq!(results, vec![0, 1, 2, 3, 4]);
    }
}
