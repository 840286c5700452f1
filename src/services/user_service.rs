//! User service - profiles, skills, portfolio and activity views.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::parallel;
use crate::config::CACHE_KEY_SKILL_CATALOGUE;
use crate::domain::{
    average_rating, PortfolioItem, ServiceStatus, Skill, SkillLevel, UserResponse,
};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::{Cache, ProfileChanges, UnitOfWork, UserSearch};
use crate::types::{Paginated, PaginationParams};

/// Partial update of a portfolio entry
#[derive(Debug, Clone, Default)]
pub struct PortfolioChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub link: Option<String>,
    pub github_link: Option<String>,
    pub technologies: Option<Vec<String>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Per-user exchange statistics
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub credits: i64,
    pub services_provided: u64,
    pub services_received: u64,
    pub average_rating: f64,
}

/// Dashboard counters for the signed-in user
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_services: u64,
    pub active_services: u64,
    pub completed_services: u64,
    pub pending_requests: u64,
    pub requested_services: u64,
    pub rating: f64,
    pub credits: i64,
}

/// Which side of an exchange an activity entry reflects
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Requested,
    Provided,
}

/// One row in the recent-activity feed
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub title: String,
    pub status: ServiceStatus,
    pub date: DateTime<Utc>,
    /// Display name of the counterpart, when one is assigned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with: Option<String>,
    pub credits: i64,
}

/// User service trait for dependency injection.
#[async_trait]
pub trait UserService: Send + Sync {
    async fn get_user(&self, id: Uuid) -> AppResult<UserResponse>;

    /// Partial profile update; a changed email must stay unique
    async fn update_profile(&self, caller: Uuid, changes: ProfileChanges)
        -> AppResult<UserResponse>;

    async fn add_skill(&self, caller: Uuid, name: String, level: SkillLevel)
        -> AppResult<Vec<Skill>>;

    async fn update_skill(
        &self,
        caller: Uuid,
        skill_id: Uuid,
        name: Option<String>,
        level: Option<SkillLevel>,
    ) -> AppResult<Vec<Skill>>;

    async fn remove_skill(&self, caller: Uuid, skill_id: Uuid) -> AppResult<Vec<Skill>>;

    /// Mark a named skill on the given user as verified
    async fn verify_skill(&self, user_id: Uuid, skill_name: String) -> AppResult<UserResponse>;

    async fn add_portfolio_item(
        &self,
        caller: Uuid,
        item: PortfolioItem,
    ) -> AppResult<Vec<PortfolioItem>>;

    async fn update_portfolio_item(
        &self,
        caller: Uuid,
        item_id: Uuid,
        changes: PortfolioChanges,
    ) -> AppResult<Vec<PortfolioItem>>;

    async fn remove_portfolio_item(
        &self,
        caller: Uuid,
        item_id: Uuid,
    ) -> AppResult<Vec<PortfolioItem>>;

    /// Distinct skill names across all users, cached with a TTL
    async fn skill_catalogue(&self) -> AppResult<Vec<String>>;

    async fn users_with_skill(&self, name: String) -> AppResult<Vec<UserResponse>>;

    async fn search(&self, search: UserSearch) -> AppResult<Vec<UserResponse>>;

    async fn stats(&self, caller: Uuid) -> AppResult<UserStats>;

    async fn activities(
        &self,
        caller: Uuid,
        pagination: PaginationParams,
    ) -> AppResult<Paginated<Activity>>;

    async fn dashboard(&self, caller: Uuid) -> AppResult<DashboardStats>;
}

/// Concrete implementation of UserService using Unit of Work.
pub struct UserManager<U: UnitOfWork> {
    uow: Arc<U>,
    cache: Option<Arc<Cache>>,
}

impl<U: UnitOfWork> UserManager<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow, cache: None }
    }

    /// Attach the cache used for the skill catalogue
    pub fn with_cache(mut self, cache: Arc<Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    async fn load_user(&self, id: Uuid) -> AppResult<crate::domain::User> {
        self.uow.users().find_by_id(id).await?.ok_or_not_found()
    }

    /// Skill writes invalidate the cached catalogue
    async fn invalidate_catalogue(&self) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.delete(CACHE_KEY_SKILL_CATALOGUE).await {
                tracing::warn!("Failed to invalidate skill catalogue cache: {}", e);
            }
        }
    }
}

#[async_trait]
impl<U: UnitOfWork> UserService for UserManager<U> {
    async fn get_user(&self, id: Uuid) -> AppResult<UserResponse> {
        self.load_user(id).await.map(UserResponse::from)
    }

    async fn update_profile(
        &self,
        caller: Uuid,
        changes: ProfileChanges,
    ) -> AppResult<UserResponse> {
        if let Some(ref email) = changes.email {
            if let Some(existing) = self.uow.users().find_by_email(email).await? {
                if existing.id != caller {
                    return Err(AppError::conflict("Email already in use"));
                }
            }
        }

        let user = self.uow.users().update_profile(caller, changes).await?;
        Ok(UserResponse::from(user))
    }

    async fn add_skill(
        &self,
        caller: Uuid,
        name: String,
        level: SkillLevel,
    ) -> AppResult<Vec<Skill>> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::validation("Skill name is required"));
        }

        let user = self.load_user(caller).await?;
        let mut skills = user.skills;
        skills.push(Skill::new(name, level));

        let user = self.uow.users().save_skills(caller, skills).await?;
        self.invalidate_catalogue().await;
        Ok(user.skills)
    }

    async fn update_skill(
        &self,
        caller: Uuid,
        skill_id: Uuid,
        name: Option<String>,
        level: Option<SkillLevel>,
    ) -> AppResult<Vec<Skill>> {
        let user = self.load_user(caller).await?;
        let mut skills = user.skills;

        let skill = skills
            .iter_mut()
            .find(|s| s.id == skill_id)
            .ok_or(AppError::NotFound)?;
        if let Some(name) = name {
            skill.name = name;
        }
        if let Some(level) = level {
            skill.level = level;
        }

        let user = self.uow.users().save_skills(caller, skills).await?;
        self.invalidate_catalogue().await;
        Ok(user.skills)
    }

    async fn remove_skill(&self, caller: Uuid, skill_id: Uuid) -> AppResult<Vec<Skill>> {
        let user = self.load_user(caller).await?;
        let mut skills = user.skills;

        let before = skills.len();
        skills.retain(|s| s.id != skill_id);
        if skills.len() == before {
            return Err(AppError::NotFound);
        }

        let user = self.uow.users().save_skills(caller, skills).await?;
        self.invalidate_catalogue().await;
        Ok(user.skills)
    }

    async fn verify_skill(&self, user_id: Uuid, skill_name: String) -> AppResult<UserResponse> {
        let user = self.load_user(user_id).await?;
        let mut skills = user.skills;

        let skill = skills
            .iter_mut()
            .find(|s| s.name == skill_name)
            .ok_or(AppError::NotFound)?;
        skill.verified = true;

        let user = self.uow.users().save_skills(user_id, skills).await?;
        Ok(UserResponse::from(user))
    }

    async fn add_portfolio_item(
        &self,
        caller: Uuid,
        item: PortfolioItem,
    ) -> AppResult<Vec<PortfolioItem>> {
        if item.title.trim().is_empty() {
            return Err(AppError::validation("Portfolio title is required"));
        }

        let user = self.load_user(caller).await?;
        let mut portfolio = user.portfolio;
        portfolio.push(item);

        let user = self.uow.users().save_portfolio(caller, portfolio).await?;
        Ok(user.portfolio)
    }

    async fn update_portfolio_item(
        &self,
        caller: Uuid,
        item_id: Uuid,
        changes: PortfolioChanges,
    ) -> AppResult<Vec<PortfolioItem>> {
        let user = self.load_user(caller).await?;
        let mut portfolio = user.portfolio;

        let item = portfolio
            .iter_mut()
            .find(|p| p.id == item_id)
            .ok_or(AppError::NotFound)?;

        if let Some(title) = changes.title {
            item.title = title;
        }
        if let Some(description) = changes.description {
            item.description = Some(description);
        }
        if let Some(image_url) = changes.image_url {
            item.image_url = Some(image_url);
        }
        if let Some(link) = changes.link {
            item.link = Some(link);
        }
        if let Some(github_link) = changes.github_link {
            item.github_link = Some(github_link);
        }
        if let Some(technologies) = changes.technologies {
            item.technologies = technologies;
        }
        if let Some(start_date) = changes.start_date {
            item.start_date = Some(start_date);
        }
        if let Some(end_date) = changes.end_date {
            item.end_date = Some(end_date);
        }

        let user = self.uow.users().save_portfolio(caller, portfolio).await?;
        Ok(user.portfolio)
    }

    async fn remove_portfolio_item(
        &self,
        caller: Uuid,
        item_id: Uuid,
    ) -> AppResult<Vec<PortfolioItem>> {
        let user = self.load_user(caller).await?;
        let mut portfolio = user.portfolio;

        let before = portfolio.len();
        portfolio.retain(|p| p.id != item_id);
        if portfolio.len() == before {
            return Err(AppError::NotFound);
        }

        let user = self.uow.users().save_portfolio(caller, portfolio).await?;
        Ok(user.portfolio)
    }

    async fn skill_catalogue(&self) -> AppResult<Vec<String>> {
        if let Some(cache) = &self.cache {
            match cache.get::<Vec<String>>(CACHE_KEY_SKILL_CATALOGUE).await {
                Ok(Some(names)) => return Ok(names),
                Ok(None) => {}
                Err(e) => tracing::warn!("Skill catalogue cache read failed: {}", e),
            }
        }

        let names = self.uow.users().distinct_skill_names().await?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(CACHE_KEY_SKILL_CATALOGUE, &names).await {
                tracing::warn!("Skill catalogue cache write failed: {}", e);
            }
        }

        Ok(names)
    }

    async fn users_with_skill(&self, name: String) -> AppResult<Vec<UserResponse>> {
        let users = self.uow.users().find_by_skill(&name).await?;
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    async fn search(&self, search: UserSearch) -> AppResult<Vec<UserResponse>> {
        let users = self.uow.users().search(search).await?;
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    async fn stats(&self, caller: Uuid) -> AppResult<UserStats> {
        let services = self.uow.services();
        let users = self.uow.users();

        let (provided, received, ratings, user) = parallel::join4(
            services.count_for_provider(caller, Some(ServiceStatus::Completed)),
            services.count_for_requester(caller, Some(ServiceStatus::Completed)),
            services.completed_ratings(caller),
            async { users.find_by_id(caller).await?.ok_or(AppError::NotFound) },
        )
        .await?;

        Ok(UserStats {
            credits: user.credits,
            services_provided: provided,
            services_received: received,
            average_rating: average_rating(&ratings).unwrap_or(user.rating),
        })
    }

    async fn activities(
        &self,
        caller: Uuid,
        pagination: PaginationParams,
    ) -> AppResult<Paginated<Activity>> {
        let (services, total) = self
            .uow
            .services()
            .involving(caller, pagination.offset(), pagination.limit())
            .await?;

        // Resolve counterpart display names in one batch
        let counterpart_ids: Vec<Uuid> = services
            .iter()
            .filter_map(|s| {
                if s.requester == caller {
                    s.provider
                } else {
                    Some(s.requester)
                }
            })
            .collect();
        let counterparts: HashMap<Uuid, String> = self
            .uow
            .users()
            .find_many(counterpart_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u.display_name()))
            .collect();

        let activities = services
            .into_iter()
            .map(|service| {
                let (kind, other) = if service.requester == caller {
                    (ActivityKind::Requested, service.provider)
                } else {
                    (ActivityKind::Provided, Some(service.requester))
                };

                Activity {
                    id: service.id,
                    kind,
                    title: service.title,
                    status: service.status,
                    date: service.created_at,
                    with: other.and_then(|id| counterparts.get(&id).cloned()),
                    credits: service.credits,
                }
            })
            .collect();

        Ok(Paginated::new(
            activities,
            pagination.page,
            pagination.limit(),
            total,
        ))
    }

    async fn dashboard(&self, caller: Uuid) -> AppResult<DashboardStats> {
        let services = self.uow.services();
        let users = self.uow.users();

        // Independent counts run concurrently
        let (total, active, completed, pending, requested) = parallel::join5(
            services.count_involving(caller, None),
            services.count_involving(caller, Some(ServiceStatus::InProgress)),
            services.count_involving(caller, Some(ServiceStatus::Completed)),
            services.count_involving(caller, Some(ServiceStatus::Pending)),
            services.count_for_requester(caller, None),
        )
        .await?;

        let (user, ratings) = parallel::join2(
            async { users.find_by_id(caller).await?.ok_or(AppError::NotFound) },
            services.completed_ratings(caller),
        )
        .await?;

        Ok(DashboardStats {
            total_services: total,
            active_services: active,
            completed_services: completed,
            pending_requests: pending,
            requested_services: requested,
            rating: average_rating(&ratings).unwrap_or(user.rating),
            credits: user.credits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::domain::User;
    use crate::infra::{
        MessageRepository, MockMessageRepository, MockServiceRepository, MockUserRepository,
        ServiceRepository, TransactionContext, UserRepository,
    };

    struct TestUnitOfWork {
        users: Arc<MockUserRepository>,
        services: Arc<MockServiceRepository>,
    }

    impl TestUnitOfWork {
        fn new(users: MockUserRepository, services: MockServiceRepository) -> Self {
            Self {
                users: Arc::new(users),
                services: Arc::new(services),
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
            Arc::new(MockMessageRepository::new())
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

    fn service(users: MockUserRepository, services: MockServiceRepository) -> UserManager<TestUnitOfWork> {
        UserManager::new(Arc::new(TestUnitOfWork::new(users, services)))
    }

    #[tokio::test]
    async fn add_skill_appends_to_the_list() {
        let caller = Uuid::new_v4();

        let mut users = MockUserRepository::new();
        let mut existing = test_user(caller);
        existing.skills = vec![Skill::new("Rust".to_string(), SkillLevel::Expert)];
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(existing.clone())));
        users
            .expect_save_skills()
            .withf(|_, skills| {
                skills.len() == 2 && skills[1].name == "Go" && !skills[1].verified
            })
            .returning(move |id, skills| {
                let mut user = test_user(id);
                user.skills = skills;
                Ok(user)
            });

        let result = service(users, MockServiceRepository::new())
            .add_skill(caller, "Go".to_string(), SkillLevel::Beginner)
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn add_skill_rejects_blank_names() {
        let result = service(MockUserRepository::new(), MockServiceRepository::new())
            .add_skill(Uuid::new_v4(), "  ".to_string(), SkillLevel::Beginner)
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn remove_unknown_skill_is_not_found() {
        let caller = Uuid::new_v4();

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |id| Ok(Some(test_user(id))));

        let result = service(users, MockServiceRepository::new())
            .remove_skill(caller, Uuid::new_v4())
            .await;

        assert!(matches!(result, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn verify_skill_flips_the_flag() {
        let target = Uuid::new_v4();

        let mut users = MockUserRepository::new();
        let mut existing = test_user(target);
        existing.skills = vec![Skill::new("Rust".to_string(), SkillLevel::Expert)];
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(existing.clone())));
        users
            .expect_save_skills()
            .withf(|_, skills| skills[0].verified)
            .returning(move |id, skills| {
                let mut user = test_user(id);
                user.skills = skills;
                Ok(user)
            });

        let result = service(users, MockServiceRepository::new())
            .verify_skill(target, "Rust".to_string())
            .await
            .unwrap();

        assert!(result.skills[0].verified);
    }

    #[tokio::test]
    async fn update_profile_rejects_taken_emails() {
        let caller = Uuid::new_v4();
        let someone_else = Uuid::new_v4();

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_email()
            .returning(move |_| Ok(Some(test_user(someone_else))));

        let result = service(users, MockServiceRepository::new())
            .update_profile(
                caller,
                ProfileChanges {
                    email: Some("taken@example.com".to_string()),
                    ..ProfileChanges::default()
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn stats_average_falls_back_to_stored_rating() {
        let caller = Uuid::new_v4();

        let mut services = MockServiceRepository::new();
        services
            .expect_count_for_provider()
            .returning(|_, _| Ok(3));
        services
            .expect_count_for_requester()
            .returning(|_, _| Ok(2));
        services.expect_completed_ratings().returning(|_| Ok(vec![]));

        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(move |id| {
            let mut user = test_user(id);
            user.credits = 10;
            user.rating = 4.2;
            Ok(Some(user))
        });

        let stats = service(users, services).stats(caller).await.unwrap();

        assert_eq!(stats.credits, 10);
        assert_eq!(stats.services_provided, 3);
        assert_eq!(stats.services_received, 2);
        // No rated services: the stored rating stands
        assert!((stats.average_rating - 4.2).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn stats_average_is_the_mean_of_requester_ratings() {
        let caller = Uuid::new_v4();

        let mut services = MockServiceRepository::new();
        services
            .expect_count_for_provider()
            .returning(|_, _| Ok(2));
        services
            .expect_count_for_requester()
            .returning(|_, _| Ok(0));
        services
            .expect_completed_ratings()
            .returning(|_| Ok(vec![4.0, 5.0]));

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |id| Ok(Some(test_user(id))));

        let stats = service(users, services).stats(caller).await.unwrap();

        assert!((stats.average_rating - 4.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn dashboard_collects_all_counters() {
        let caller = Uuid::new_v4();

        let mut services = MockServiceRepository::new();
        services
            .expect_count_involving()
            .returning(|_, status| match status {
                None => Ok(9),
                Some(ServiceStatus::InProgress) => Ok(3),
                Some(ServiceStatus::Completed) => Ok(4),
                Some(ServiceStatus::Pending) => Ok(1),
                Some(_) => Ok(0),
            });
        services
            .expect_count_for_requester()
            .returning(|_, _| Ok(5));
        services
            .expect_completed_ratings()
            .returning(|_| Ok(vec![5.0]));

        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(move |id| {
            let mut user = test_user(id);
            user.credits = 7;
            Ok(Some(user))
        });

        let stats = service(users, services).dashboard(caller).await.unwrap();

        assert_eq!(stats.total_services, 9);
        assert_eq!(stats.active_services, 3);
        assert_eq!(stats.completed_services, 4);
        assert_eq!(stats.pending_requests, 1);
        assert_eq!(stats.requested_services, 5);
        assert_eq!(stats.credits, 7);
        assert!((stats.rating - 5.0).abs() < f64::EPSILON);
    }
}
