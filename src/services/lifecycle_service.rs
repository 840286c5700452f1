//! Service lifecycle - the exchange state machine and its settlement.
//!
//! Orchestrates every status transition, assigns and clears providers,
//! and performs the one multi-record atomic operation in the system:
//! completion settlement (status flip + credit transfer + rating
//! recompute inside a single transaction). Realtime notifications are
//! emitted best-effort through the injected notifier and never affect
//! the underlying state change.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::{
    MAX_FEEDBACK_RATING, MIN_FEEDBACK_RATING, MIN_SERVICE_CREDITS, RECENT_SERVICES_LIMIT,
};
use crate::domain::{
    average_rating, Feedback, FeedbackEntry, ParticipantRole, Service, ServiceResponse,
    ServiceStatus, UserSummary,
};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::{NewService, ServiceChanges, ServiceFilter, UnitOfWork};
use crate::realtime::{Event, Notifier};
use crate::types::{Paginated, PaginationParams};

/// A service annotated with the caller's side of the exchange
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EngagedService {
    #[serde(flatten)]
    pub service: ServiceResponse,
    pub role: ParticipantRole,
}

/// Outcome of a confirmed completion
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompletionReceipt {
    pub service: ServiceResponse,
    pub provider_credits: i64,
    pub provider_rating: f64,
}

/// Service lifecycle trait for dependency injection.
#[async_trait]
pub trait ServiceLifecycle: Send + Sync {
    /// Post a new service request (status=available, no provider)
    async fn create(&self, input: NewService) -> AppResult<ServiceResponse>;

    async fn get(&self, id: Uuid) -> AppResult<ServiceResponse>;

    async fn list(
        &self,
        filter: ServiceFilter,
        pagination: PaginationParams,
    ) -> AppResult<Paginated<ServiceResponse>>;

    async fn recent(&self) -> AppResult<Vec<ServiceResponse>>;

    /// The caller's engaged services (in-progress or completed, either role)
    async fn accepted(&self, caller: Uuid) -> AppResult<Vec<EngagedService>>;

    /// Claim an available service as its provider
    async fn accept(&self, id: Uuid, caller: Uuid) -> AppResult<ServiceResponse>;

    /// Provider signals the work is done (in-progress -> pending-confirmation)
    async fn mark_complete(&self, id: Uuid, caller: Uuid) -> AppResult<ServiceResponse>;

    /// Requester acknowledges completion; settles credits and rating atomically
    async fn confirm_completion(&self, id: Uuid, caller: Uuid) -> AppResult<CompletionReceipt>;

    /// Leave feedback on a completed exchange (overwrites per role)
    async fn add_feedback(
        &self,
        id: Uuid,
        caller: Uuid,
        rating: u8,
        comment: Option<String>,
    ) -> AppResult<ServiceResponse>;

    /// Generic transition entry point, validated against the table
    async fn update_status(
        &self,
        id: Uuid,
        caller: Uuid,
        new_status: ServiceStatus,
    ) -> AppResult<ServiceResponse>;

    /// Requester edits of an unengaged service
    async fn update(
        &self,
        id: Uuid,
        caller: Uuid,
        changes: ServiceChanges,
    ) -> AppResult<ServiceResponse>;

    /// Provider flips a milestone's completed flag
    async fn update_milestone(
        &self,
        id: Uuid,
        milestone_id: Uuid,
        caller: Uuid,
        completed: bool,
    ) -> AppResult<ServiceResponse>;

    async fn delete(&self, id: Uuid, caller: Uuid) -> AppResult<()>;
}

/// Concrete implementation of ServiceLifecycle using Unit of Work.
pub struct LifecycleManager<U: UnitOfWork> {
    uow: Arc<U>,
    notifier: Arc<dyn Notifier>,
}

impl<U: UnitOfWork> LifecycleManager<U> {
    /// Create new lifecycle service with its notification collaborator
    pub fn new(uow: Arc<U>, notifier: Arc<dyn Notifier>) -> Self {
        Self { uow, notifier }
    }

    /// Resolve participant summaries for a batch of services
    async fn summaries(&self, ids: Vec<Uuid>) -> AppResult<HashMap<Uuid, UserSummary>> {
        let mut unique = ids;
        unique.sort();
        unique.dedup();

        let users = self.uow.users().find_many(unique).await?;
        Ok(users
            .into_iter()
            .map(|user| (user.id, UserSummary::from(user)))
            .collect())
    }

    async fn hydrate_many(&self, services: Vec<Service>) -> AppResult<Vec<ServiceResponse>> {
        let ids = services
            .iter()
            .flat_map(|s| [Some(s.requester), s.provider])
            .flatten()
            .collect();
        let map = self.summaries(ids).await?;

        Ok(services
            .into_iter()
            .map(|service| {
                let requester = summary_or_unknown(&map, service.requester);
                let provider = service.provider.map(|id| summary_or_unknown(&map, id));
                ServiceResponse::new(service, requester, provider)
            })
            .collect())
    }

    async fn hydrate(&self, service: Service) -> AppResult<ServiceResponse> {
        let ids = [Some(service.requester), service.provider]
            .into_iter()
            .flatten()
            .collect();
        let map = self.summaries(ids).await?;

        let requester = summary_or_unknown(&map, service.requester);
        let provider = service.provider.map(|id| summary_or_unknown(&map, id));
        Ok(ServiceResponse::new(service, requester, provider))
    }

    async fn fetch(&self, id: Uuid) -> AppResult<Service> {
        self.uow.services().find_by_id(id).await?.ok_or_not_found()
    }

    /// Settle a completion: flip `from` -> completed, move credits and
    /// recompute the provider's rating, all in one transaction. The
    /// flip is conditional on the service still being in `from`, so a
    /// repeated or racing settlement aborts with zero rows and nothing
    /// is transferred twice. Returns the recomputed rating, if any.
    async fn settle(
        &self,
        service_id: Uuid,
        from: ServiceStatus,
        provider: Uuid,
        requester: Uuid,
        credits: i64,
    ) -> AppResult<Option<f64>> {
        let completed_at = Utc::now();

        self.uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let flipped = ctx
                        .services()
                        .transition(service_id, from, ServiceStatus::Completed, Some(completed_at))
                        .await?;
                    if flipped == 0 {
                        return Err(AppError::conflict(
                            "Service must be in pending-confirmation status",
                        ));
                    }

                    ctx.users().adjust_credits(provider, credits).await?;
                    ctx.users().adjust_credits(requester, -credits).await?;

                    let ratings = ctx.services().completed_ratings(provider).await?;
                    let new_rating = average_rating(&ratings);
                    if let Some(rating) = new_rating {
                        ctx.users().set_rating(provider, rating).await?;
                    }

                    Ok(new_rating)
                })
            })
            .await
    }

    fn notify_status_changed(&self, service: &ServiceResponse) {
        let recipients = [
            Some(service.requester.id),
            service.provider.as_ref().map(|p| p.id),
        ];
        for recipient in recipients.into_iter().flatten() {
            self.notifier.notify(
                recipient,
                Event::ServiceStatusChanged {
                    service_id: service.id,
                    status: service.status,
                    completed_at: service.completed_at,
                },
            );
        }
    }
}

fn summary_or_unknown(map: &HashMap<Uuid, UserSummary>, id: Uuid) -> UserSummary {
    map.get(&id).cloned().unwrap_or_else(|| {
        tracing::warn!(user = %id, "Participant could not be resolved");
        UserSummary {
            id,
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
        }
    })
}

#[async_trait]
impl<U: UnitOfWork> ServiceLifecycle for LifecycleManager<U> {
    async fn create(&self, input: NewService) -> AppResult<ServiceResponse> {
        let missing = [
            ("title", &input.title),
            ("description", &input.description),
            ("category", &input.category),
            ("duration", &input.duration),
            ("location", &input.location),
        ]
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect::<Vec<_>>();

        if !missing.is_empty() {
            return Err(AppError::validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }
        if input.credits < MIN_SERVICE_CREDITS {
            return Err(AppError::validation(format!(
                "Credits must be at least {}",
                MIN_SERVICE_CREDITS
            )));
        }

        let service = self.uow.services().create(input).await?;
        self.hydrate(service).await
    }

    async fn get(&self, id: Uuid) -> AppResult<ServiceResponse> {
        let service = self.fetch(id).await?;
        self.hydrate(service).await
    }

    async fn list(
        &self,
        filter: ServiceFilter,
        pagination: PaginationParams,
    ) -> AppResult<Paginated<ServiceResponse>> {
        let (services, total) = self
            .uow
            .services()
            .list(filter, pagination.page, pagination.limit())
            .await?;

        let data = self.hydrate_many(services).await?;
        Ok(Paginated::new(
            data,
            pagination.page,
            pagination.limit(),
            total,
        ))
    }

    async fn recent(&self) -> AppResult<Vec<ServiceResponse>> {
        let services = self.uow.services().recent(RECENT_SERVICES_LIMIT).await?;
        self.hydrate_many(services).await
    }

    async fn accepted(&self, caller: Uuid) -> AppResult<Vec<EngagedService>> {
        let services = self
            .uow
            .services()
            .engaged(
                caller,
                vec![ServiceStatus::InProgress, ServiceStatus::Completed],
            )
            .await?;

        let roles: Vec<ParticipantRole> = services
            .iter()
            .map(|s| {
                if s.provider == Some(caller) {
                    ParticipantRole::Provider
                } else {
                    ParticipantRole::Requester
                }
            })
            .collect();

        let hydrated = self.hydrate_many(services).await?;
        Ok(hydrated
            .into_iter()
            .zip(roles)
            .map(|(service, role)| EngagedService { service, role })
            .collect())
    }

    async fn accept(&self, id: Uuid, caller: Uuid) -> AppResult<ServiceResponse> {
        let service = self.fetch(id).await?;
        service.ensure_can_accept(caller)?;

        // Conditional claim: of two racing accepts exactly one wins
        let claimed = self.uow.services().claim(id, caller).await?;
        if claimed == 0 {
            return Err(AppError::conflict("Service already has a provider"));
        }

        let service = self.fetch(id).await?;
        let response = self.hydrate(service).await?;

        if let Some(provider) = response.provider.clone() {
            self.notifier.notify(
                response.requester.id,
                Event::ServiceAccepted {
                    service_id: response.id,
                    title: response.title.clone(),
                    provider,
                },
            );
        }

        Ok(response)
    }

    async fn mark_complete(&self, id: Uuid, caller: Uuid) -> AppResult<ServiceResponse> {
        let service = self.fetch(id).await?;
        service.ensure_can_mark_complete(caller)?;

        let flipped = self
            .uow
            .services()
            .transition(
                id,
                ServiceStatus::InProgress,
                ServiceStatus::PendingConfirmation,
                None,
            )
            .await?;
        if flipped == 0 {
            return Err(AppError::conflict(
                "Service must be in progress to be marked as completed",
            ));
        }

        let service = self.fetch(id).await?;
        let response = self.hydrate(service).await?;

        if let Some(provider) = response.provider.clone() {
            self.notifier.notify(
                response.requester.id,
                Event::ServicePendingConfirmation {
                    service_id: response.id,
                    title: response.title.clone(),
                    provider,
                },
            );
        }

        Ok(response)
    }

    async fn confirm_completion(&self, id: Uuid, caller: Uuid) -> AppResult<CompletionReceipt> {
        let service = self.fetch(id).await?;
        service.ensure_can_confirm(caller)?;

        let provider = service.provider.ok_or_else(|| {
            AppError::internal("Service awaiting confirmation has no provider")
        })?;

        let new_rating = self
            .settle(
                id,
                ServiceStatus::PendingConfirmation,
                provider,
                service.requester,
                service.credits,
            )
            .await?;

        let settled = self.fetch(id).await?;
        let response = self.hydrate(settled).await?;

        let provider_user = self
            .uow
            .users()
            .find_by_id(provider)
            .await?
            .ok_or(AppError::NotFound)?;

        self.notifier.notify(
            provider,
            Event::ServiceCompleted {
                service_id: response.id,
                title: response.title.clone(),
                credits: response.credits,
                new_rating,
            },
        );
        self.notifier.notify(
            response.requester.id,
            Event::ServiceCompleted {
                service_id: response.id,
                title: response.title.clone(),
                credits: response.credits,
                new_rating: None,
            },
        );

        Ok(CompletionReceipt {
            service: response,
            provider_credits: provider_user.credits,
            provider_rating: provider_user.rating,
        })
    }

    async fn add_feedback(
        &self,
        id: Uuid,
        caller: Uuid,
        rating: u8,
        comment: Option<String>,
    ) -> AppResult<ServiceResponse> {
        if !(MIN_FEEDBACK_RATING..=MAX_FEEDBACK_RATING).contains(&rating) {
            return Err(AppError::validation(format!(
                "Rating must be between {} and {}",
                MIN_FEEDBACK_RATING, MAX_FEEDBACK_RATING
            )));
        }

        let service = self.fetch(id).await?;
        let role = service.ensure_feedback_allowed(caller)?;

        let entry = FeedbackEntry {
            rating,
            comment,
            created_at: Utc::now(),
        };

        let mut feedback: Feedback = service.feedback.clone();
        match role {
            ParticipantRole::Requester => feedback.from_requester = Some(entry),
            ParticipantRole::Provider => feedback.from_provider = Some(entry),
        }

        let service = self.uow.services().set_feedback(id, feedback).await?;
        self.hydrate(service).await
    }

    async fn update_status(
        &self,
        id: Uuid,
        caller: Uuid,
        new_status: ServiceStatus,
    ) -> AppResult<ServiceResponse> {
        let service = self.fetch(id).await?;
        let role = service.participant_role(caller).ok_or(AppError::Forbidden)?;
        service.ensure_transition(new_status)?;

        if new_status == ServiceStatus::Completed {
            // Completion always settles: only the requester may trigger
            // it, and the credit transfer runs with the flip. A bare
            // flip-to-completed without settlement does not exist.
            if role != ParticipantRole::Requester {
                return Err(AppError::Forbidden);
            }
            let provider = service
                .provider
                .ok_or_else(|| AppError::conflict("Service has no provider to settle with"))?;

            self.settle(id, service.status, provider, service.requester, service.credits)
                .await?;
        } else {
            let flipped = self
                .uow
                .services()
                .transition(id, service.status, new_status, None)
                .await?;
            if flipped == 0 {
                return Err(AppError::conflict("Service status changed concurrently"));
            }
        }

        let service = self.fetch(id).await?;
        let response = self.hydrate(service).await?;
        self.notify_status_changed(&response);

        Ok(response)
    }

    async fn update(
        &self,
        id: Uuid,
        caller: Uuid,
        changes: ServiceChanges,
    ) -> AppResult<ServiceResponse> {
        let service = self.fetch(id).await?;
        service.ensure_editable_by(caller)?;

        if let Some(credits) = changes.credits {
            if credits < MIN_SERVICE_CREDITS {
                return Err(AppError::validation(format!(
                    "Credits must be at least {}",
                    MIN_SERVICE_CREDITS
                )));
            }
        }

        let service = self.uow.services().update_fields(id, changes).await?;
        self.hydrate(service).await
    }

    async fn update_milestone(
        &self,
        id: Uuid,
        milestone_id: Uuid,
        caller: Uuid,
        completed: bool,
    ) -> AppResult<ServiceResponse> {
        let service = self.fetch(id).await?;
        if service.provider != Some(caller) {
            return Err(AppError::Forbidden);
        }

        let mut milestones = service.milestones.clone();
        let milestone = milestones
            .iter_mut()
            .find(|m| m.id == milestone_id)
            .ok_or(AppError::NotFound)?;
        milestone.completed = completed;

        let service = self.uow.services().set_milestones(id, milestones).await?;
        self.hydrate(service).await
    }

    async fn delete(&self, id: Uuid, caller: Uuid) -> AppResult<()> {
        let service = self.fetch(id).await?;
        if service.requester != caller {
            return Err(AppError::Forbidden);
        }

        self.uow.services().delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::domain::{Agreement, User};
    use crate::infra::{
        MessageRepository, MockMessageRepository, MockServiceRepository, MockUserRepository,
        ServiceRepository, TransactionContext, UserRepository,
    };
    use crate::realtime::NoopNotifier;

    /// Unit-of-work double over mocked repositories. The transaction
    /// combinator is not mockable; settlement paths are exercised at
    /// the guard level here and end-to-end against a real database.
    struct TestUnitOfWork {
        users: Arc<MockUserRepository>,
        services: Arc<MockServiceRepository>,
        messages: Arc<MockMessageRepository>,
    }

    impl TestUnitOfWork {
        fn new(users: MockUserRepository, services: MockServiceRepository) -> Self {
            Self {
                users: Arc::new(users),
                services: Arc::new(services),
                messages: Arc::new(MockMessageRepository::new()),
            }
        }
    }

    #[async_trait]
    impl UnitOfWork for TestUnitOfWork {
        fn users(&self) -> Arc<dyn UserRepository> {
            self.users.clone()
        }

        fn services(&self) -> Arc<dyn ServiceRepository> {
            self.services.clone()
        }

        fn messages(&self) -> Arc<dyn MessageRepository> {
            self.messages.clone()
        }

        async fn transaction<F, T>(&self, _f: F) -> AppResult<T>
        where
            F: for<'a> FnOnce(
                    TransactionContext<'a>,
                ) -> std::pin::Pin<
                    Box<dyn std::future::Future<Output = AppResult<T>> + Send + 'a>,
                > + Send,
            T: Send,
        {
            Err(AppError::internal("Transactions not supported in test mock"))
        }
    }

    /// Notifier double that records deliveries
    #[derive(Default)]
    struct RecordingNotifier {
        deliveries: Mutex<Vec<(Uuid, Event)>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, recipient: Uuid, event: Event) {
            self.deliveries
                .lock()
                .expect("notifier lock")
                .push((recipient, event));
        }
    }

    fn test_user(id: Uuid) -> User {
        let now = Utc::now();
        User {
            id,
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            email: format!("{}@example.com", id.simple()),
            password_hash: "hashed".to_string(),
            bio: None,
            avatar_url: None,
            github_profile: None,
            linkedin_profile: None,
            skills: vec![],
            portfolio: vec![],
            credits: 0,
            rating: 0.0,
            reset_password_token: None,
            reset_password_expires: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn test_service(status: ServiceStatus, requester: Uuid, provider: Option<Uuid>) -> Service {
        let now = Utc::now();
        Service {
            id: Uuid::new_v4(),
            title: "Logo design".to_string(),
            description: "Design a logo".to_string(),
            category: "Design".to_string(),
            location: "Remote".to_string(),
            duration: "1 week".to_string(),
            credits: 5,
            requester,
            provider,
            status,
            skills_required: vec![],
            skills_offered: vec![],
            milestones: vec![],
            agreement: Agreement::default(),
            feedback: Feedback::default(),
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn resolve_users(users: &mut MockUserRepository) {
        users
            .expect_find_many()
            .returning(|ids| Ok(ids.into_iter().map(test_user).collect()));
    }

    fn manager(
        users: MockUserRepository,
        services: MockServiceRepository,
    ) -> LifecycleManager<TestUnitOfWork> {
        LifecycleManager::new(
            Arc::new(TestUnitOfWork::new(users, services)),
            Arc::new(NoopNotifier),
        )
    }

    #[tokio::test]
    async fn accept_assigns_provider_and_moves_to_in_progress() {
        let requester = Uuid::new_v4();
        let provider = Uuid::new_v4();
        let open = test_service(ServiceStatus::Available, requester, None);
        let id = open.id;

        let mut claimed = open.clone();
        claimed.status = ServiceStatus::InProgress;
        claimed.provider = Some(provider);

        let mut services = MockServiceRepository::new();
        let guard_view = open.clone();
        services
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(guard_view.clone())));
        services
            .expect_claim()
            .times(1)
            .returning(|_, _| Ok(1));
        services
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(claimed.clone())));

        let mut users = MockUserRepository::new();
        resolve_users(&mut users);

        let result = manager(users, services).accept(id, provider).await.unwrap();

        assert_eq!(result.status, ServiceStatus::InProgress);
        assert_eq!(result.provider.unwrap().id, provider);
    }

    #[tokio::test]
    async fn accept_notifies_the_requester() {
        let requester = Uuid::new_v4();
        let provider = Uuid::new_v4();
        let open = test_service(ServiceStatus::Available, requester, None);
        let id = open.id;

        let mut claimed = open.clone();
        claimed.status = ServiceStatus::InProgress;
        claimed.provider = Some(provider);

        let mut services = MockServiceRepository::new();
        let guard_view = open.clone();
        services
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(guard_view.clone())));
        services.expect_claim().returning(|_, _| Ok(1));
        services
            .expect_find_by_id()
            .returning(move |_| Ok(Some(claimed.clone())));

        let mut users = MockUserRepository::new();
        resolve_users(&mut users);

        let notifier = Arc::new(RecordingNotifier::default());
        let lifecycle = LifecycleManager::new(
            Arc::new(TestUnitOfWork::new(users, services)),
            notifier.clone(),
        );

        lifecycle.accept(id, provider).await.unwrap();

        let deliveries = notifier.deliveries.lock().unwrap();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].0, requester);
        assert!(matches!(deliveries[0].1, Event::ServiceAccepted { .. }));
    }

    #[tokio::test]
    async fn accept_own_service_is_forbidden() {
        let requester = Uuid::new_v4();
        let open = test_service(ServiceStatus::Available, requester, None);
        let id = open.id;

        let mut services = MockServiceRepository::new();
        services
            .expect_find_by_id()
            .returning(move |_| Ok(Some(open.clone())));

        let result = manager(MockUserRepository::new(), services)
            .accept(id, requester)
            .await;

        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn accept_losing_the_race_is_a_conflict() {
        let open = test_service(ServiceStatus::Available, Uuid::new_v4(), None);
        let id = open.id;

        let mut services = MockServiceRepository::new();
        services
            .expect_find_by_id()
            .returning(move |_| Ok(Some(open.clone())));
        // Another caller claimed the service between read and write
        services.expect_claim().returning(|_, _| Ok(0));

        let result = manager(MockUserRepository::new(), services)
            .accept(id, Uuid::new_v4())
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn accept_missing_service_is_not_found() {
        let mut services = MockServiceRepository::new();
        services.expect_find_by_id().returning(|_| Ok(None));

        let result = manager(MockUserRepository::new(), services)
            .accept(Uuid::new_v4(), Uuid::new_v4())
            .await;

        assert!(matches!(result, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn mark_complete_requires_the_provider() {
        let requester = Uuid::new_v4();
        let provider = Uuid::new_v4();
        let engaged = test_service(ServiceStatus::InProgress, requester, Some(provider));
        let id = engaged.id;

        let mut services = MockServiceRepository::new();
        services
            .expect_find_by_id()
            .returning(move |_| Ok(Some(engaged.clone())));

        let result = manager(MockUserRepository::new(), services)
            .mark_complete(id, requester)
            .await;

        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn mark_complete_moves_to_pending_confirmation() {
        let requester = Uuid::new_v4();
        let provider = Uuid::new_v4();
        let engaged = test_service(ServiceStatus::InProgress, requester, Some(provider));
        let id = engaged.id;

        let mut awaiting = engaged.clone();
        awaiting.status = ServiceStatus::PendingConfirmation;

        let mut services = MockServiceRepository::new();
        let guard_view = engaged.clone();
        services
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(guard_view.clone())));
        services
            .expect_transition()
            .withf(|_, from, to, completed_at| {
                *from == ServiceStatus::InProgress
                    && *to == ServiceStatus::PendingConfirmation
                    && completed_at.is_none()
            })
            .returning(|_, _, _, _| Ok(1));
        services
            .expect_find_by_id()
            .returning(move |_| Ok(Some(awaiting.clone())));

        let mut users = MockUserRepository::new();
        resolve_users(&mut users);

        let result = manager(users, services)
            .mark_complete(id, provider)
            .await
            .unwrap();

        assert_eq!(result.status, ServiceStatus::PendingConfirmation);
    }

    #[tokio::test]
    async fn confirm_by_provider_is_forbidden() {
        let requester = Uuid::new_v4();
        let provider = Uuid::new_v4();
        let awaiting = test_service(ServiceStatus::PendingConfirmation, requester, Some(provider));
        let id = awaiting.id;

        let mut services = MockServiceRepository::new();
        services
            .expect_find_by_id()
            .returning(move |_| Ok(Some(awaiting.clone())));

        let result = manager(MockUserRepository::new(), services)
            .confirm_completion(id, provider)
            .await;

        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn confirm_outside_pending_confirmation_is_a_conflict() {
        let requester = Uuid::new_v4();
        let engaged = test_service(ServiceStatus::InProgress, requester, Some(Uuid::new_v4()));
        let id = engaged.id;

        let mut services = MockServiceRepository::new();
        services
            .expect_find_by_id()
            .returning(move |_| Ok(Some(engaged.clone())));

        let result = manager(MockUserRepository::new(), services)
            .confirm_completion(id, requester)
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn feedback_lands_in_the_callers_slot() {
        let requester = Uuid::new_v4();
        let provider = Uuid::new_v4();
        let done = test_service(ServiceStatus::Completed, requester, Some(provider));
        let id = done.id;

        let mut services = MockServiceRepository::new();
        let guard_view = done.clone();
        services
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(guard_view.clone())));
        services
            .expect_set_feedback()
            .withf(|_, feedback| {
                feedback
                    .from_requester
                    .as_ref()
                    .is_some_and(|entry| entry.rating == 4)
                    && feedback.from_provider.is_none()
            })
            .returning(move |_, feedback| {
                let mut updated = done.clone();
                updated.feedback = feedback;
                Ok(updated)
            });

        let mut users = MockUserRepository::new();
        resolve_users(&mut users);

        let result = manager(users, services)
            .add_feedback(id, requester, 4, Some("great work".to_string()))
            .await
            .unwrap();

        assert_eq!(result.feedback.from_requester.unwrap().rating, 4);
    }

    #[tokio::test]
    async fn feedback_on_unfinished_service_is_a_conflict() {
        let requester = Uuid::new_v4();
        let engaged = test_service(ServiceStatus::InProgress, requester, Some(Uuid::new_v4()));
        let id = engaged.id;

        let mut services = MockServiceRepository::new();
        services
            .expect_find_by_id()
            .returning(move |_| Ok(Some(engaged.clone())));

        let result = manager(MockUserRepository::new(), services)
            .add_feedback(id, requester, 5, None)
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn feedback_rating_out_of_bounds_is_rejected() {
        let services = MockServiceRepository::new();

        let result = manager(MockUserRepository::new(), services)
            .add_feedback(Uuid::new_v4(), Uuid::new_v4(), 6, None)
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn update_status_rejects_transitions_missing_from_the_table() {
        let requester = Uuid::new_v4();
        let done = test_service(ServiceStatus::Completed, requester, Some(Uuid::new_v4()));
        let id = done.id;

        let mut services = MockServiceRepository::new();
        services
            .expect_find_by_id()
            .returning(move |_| Ok(Some(done.clone())));

        let result = manager(MockUserRepository::new(), services)
            .update_status(id, requester, ServiceStatus::InProgress)
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn update_status_rejects_non_participants() {
        let service = test_service(ServiceStatus::Available, Uuid::new_v4(), None);
        let id = service.id;

        let mut services = MockServiceRepository::new();
        services
            .expect_find_by_id()
            .returning(move |_| Ok(Some(service.clone())));

        let result = manager(MockUserRepository::new(), services)
            .update_status(id, Uuid::new_v4(), ServiceStatus::Cancelled)
            .await;

        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn update_status_cancels_an_in_progress_service() {
        let requester = Uuid::new_v4();
        let provider = Uuid::new_v4();
        let engaged = test_service(ServiceStatus::InProgress, requester, Some(provider));
        let id = engaged.id;

        let mut cancelled = engaged.clone();
        cancelled.status = ServiceStatus::Cancelled;

        let mut services = MockServiceRepository::new();
        let guard_view = engaged.clone();
        services
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(guard_view.clone())));
        services
            .expect_transition()
            .withf(|_, from, to, _| {
                *from == ServiceStatus::InProgress && *to == ServiceStatus::Cancelled
            })
            .returning(|_, _, _, _| Ok(1));
        services
            .expect_find_by_id()
            .returning(move |_| Ok(Some(cancelled.clone())));

        let mut users = MockUserRepository::new();
        resolve_users(&mut users);

        let result = manager(users, services)
            .update_status(id, provider, ServiceStatus::Cancelled)
            .await
            .unwrap();

        assert_eq!(result.status, ServiceStatus::Cancelled);
        // The cancelled service keeps its stale provider reference
        assert!(result.provider.is_some());
    }

    #[tokio::test]
    async fn generic_completion_by_provider_is_forbidden() {
        let requester = Uuid::new_v4();
        let provider = Uuid::new_v4();
        let engaged = test_service(ServiceStatus::InProgress, requester, Some(provider));
        let id = engaged.id;

        let mut services = MockServiceRepository::new();
        services
            .expect_find_by_id()
            .returning(move |_| Ok(Some(engaged.clone())));

        // in-progress -> completed is in the table, but settlement is
        // the requester's act
        let result = manager(MockUserRepository::new(), services)
            .update_status(id, provider, ServiceStatus::Completed)
            .await;

        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn create_rejects_sub_minimum_credits() {
        let mut input = NewService {
            requester: Uuid::new_v4(),
            title: "Logo".to_string(),
            description: "Design".to_string(),
            category: "Design".to_string(),
            location: "Remote".to_string(),
            duration: "1 week".to_string(),
            credits: 0,
            skills_required: vec![],
            skills_offered: vec![],
            milestones: vec![],
        };

        let result = manager(MockUserRepository::new(), MockServiceRepository::new())
            .create(input.clone())
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        input.title = String::new();
        input.credits = 5;
        let result = manager(MockUserRepository::new(), MockServiceRepository::new())
            .create(input)
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn delete_requires_the_requester() {
        let service = test_service(ServiceStatus::Available, Uuid::new_v4(), None);
        let id = service.id;

        let mut services = MockServiceRepository::new();
        services
            .expect_find_by_id()
            .returning(move |_| Ok(Some(service.clone())));

        let result = manager(MockUserRepository::new(), services)
            .delete(id, Uuid::new_v4())
            .await;

        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn update_of_engaged_service_is_a_conflict() {
        let requester = Uuid::new_v4();
        let engaged = test_service(ServiceStatus::InProgress, requester, Some(Uuid::new_v4()));
        let id = engaged.id;

        let mut services = MockServiceRepository::new();
        services
            .expect_find_by_id()
            .returning(move |_| Ok(Some(engaged.clone())));

        let result = manager(MockUserRepository::new(), services)
            .update(id, requester, ServiceChanges::default())
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn milestone_update_requires_the_provider() {
        let requester = Uuid::new_v4();
        let engaged = test_service(ServiceStatus::InProgress, requester, Some(Uuid::new_v4()));
        let id = engaged.id;

        let mut services = MockServiceRepository::new();
        services
            .expect_find_by_id()
            .returning(move |_| Ok(Some(engaged.clone())));

        let result = manager(MockUserRepository::new(), services)
            .update_milestone(id, Uuid::new_v4(), requester, true)
            .await;

        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn accepted_annotates_the_callers_role() {
        let caller = Uuid::new_v4();
        let as_provider = test_service(ServiceStatus::InProgress, Uuid::new_v4(), Some(caller));
        let as_requester = test_service(ServiceStatus::Completed, caller, Some(Uuid::new_v4()));

        let mut services = MockServiceRepository::new();
        let engaged = vec![as_provider, as_requester];
        services
            .expect_engaged()
            .returning(move |_, _| Ok(engaged.clone()));

        let mut users = MockUserRepository::new();
        resolve_users(&mut users);

        let result = manager(users, services).accepted(caller).await.unwrap();

        assert_eq!(result.len(), 2);
        assert!(matches!(result[0].role, ParticipantRole::Provider));
        assert!(matches!(result[1].role, ParticipantRole::Requester));
    }
}
