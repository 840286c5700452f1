//! Service repository - data access for the exchange lifecycle.
//!
//! Status flips (`claim`, `transition`) are conditional updates that
//! re-check the expected current state in the write itself, so two
//! racing callers cannot both succeed off a stale pre-read.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

use super::entities::service::{self, ActiveModel, Entity as ServiceEntity};
use super::entities::to_json;
use crate::domain::{Feedback, Milestone, Service, ServiceStatus};
use crate::errors::{AppError, AppResult};

/// Fields required to post a service
#[derive(Debug, Clone)]
pub struct NewService {
    pub requester: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub duration: String,
    pub credits: i64,
    pub skills_required: Vec<String>,
    pub skills_offered: Vec<String>,
    pub milestones: Vec<Milestone>,
}

/// Partial service update; absent fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct ServiceChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub duration: Option<String>,
    pub credits: Option<i64>,
    pub skills_required: Option<Vec<String>>,
    pub skills_offered: Option<Vec<String>>,
    pub agreement_terms: Option<String>,
}

/// Sort orders for service listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ServiceSort {
    #[default]
    Newest,
    Oldest,
    CreditsHigh,
    CreditsLow,
}

/// Filters for service listings
#[derive(Debug, Clone, Default)]
pub struct ServiceFilter {
    pub status: Option<ServiceStatus>,
    pub category: Option<String>,
    /// Free-text match over title, description and skill tags
    pub search: Option<String>,
    pub sort: ServiceSort,
}

/// Service repository trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ServiceRepository: Send + Sync {
    async fn create(&self, new_service: NewService) -> AppResult<Service>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Service>>;

    /// Filtered, sorted page plus total count
    async fn list(
        &self,
        filter: ServiceFilter,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<Service>, u64)>;

    async fn recent(&self, limit: u64) -> AppResult<Vec<Service>>;

    /// Services the user participates in (either role) with one of the
    /// given statuses, most recently updated first
    async fn engaged(&self, user: Uuid, statuses: Vec<ServiceStatus>) -> AppResult<Vec<Service>>;

    /// Page of services the user participates in, newest first
    async fn involving(&self, user: Uuid, offset: u64, limit: u64)
        -> AppResult<(Vec<Service>, u64)>;

    async fn update_fields(&self, id: Uuid, changes: ServiceChanges) -> AppResult<Service>;

    async fn set_milestones(&self, id: Uuid, milestones: Vec<Milestone>) -> AppResult<Service>;

    async fn set_feedback(&self, id: Uuid, feedback: Feedback) -> AppResult<Service>;

    async fn delete(&self, id: Uuid) -> AppResult<()>;

    /// Assign the provider and move available -> in-progress in one
    /// conditional write. Returns the number of rows affected: zero
    /// means another caller claimed the service first.
    async fn claim(&self, id: Uuid, provider: Uuid) -> AppResult<u64>;

    /// Conditionally move `from` -> `to`, setting `completed_at` when
    /// given. Returns rows affected; zero means the service was no
    /// longer in `from`.
    async fn transition(
        &self,
        id: Uuid,
        from: ServiceStatus,
        to: ServiceStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> AppResult<u64>;

    /// Requester ratings over the provider's completed services
    async fn completed_ratings(&self, provider: Uuid) -> AppResult<Vec<f64>>;

    async fn count_involving(&self, user: Uuid, status: Option<ServiceStatus>) -> AppResult<u64>;

    async fn count_for_requester(
        &self,
        user: Uuid,
        status: Option<ServiceStatus>,
    ) -> AppResult<u64>;

    async fn count_for_provider(
        &self,
        user: Uuid,
        status: Option<ServiceStatus>,
    ) -> AppResult<u64>;
}

/// SeaORM-backed implementation of [`ServiceRepository`].
pub struct ServiceStore {
    db: DatabaseConnection,
}

impl ServiceStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn involving_condition(user: Uuid) -> Condition {
    Condition::any()
        .add(service::Column::RequesterId.eq(user))
        .add(service::Column::ProviderId.eq(user))
}

#[async_trait]
impl ServiceRepository for ServiceStore {
    async fn create(&self, new_service: NewService) -> AppResult<Service> {
        let now = Utc::now();
        let active_model = ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(new_service.title),
            description: Set(new_service.description),
            category: Set(new_service.category),
            location: Set(new_service.location),
            duration: Set(new_service.duration),
            credits: Set(new_service.credits),
            requester_id: Set(new_service.requester),
            provider_id: Set(None),
            status: Set(ServiceStatus::Available.as_str().to_string()),
            skills_required: Set(to_json(&new_service.skills_required)),
            skills_offered: Set(to_json(&new_service.skills_offered)),
            milestones: Set(to_json(&new_service.milestones)),
            agreement: Set(to_json(&crate::domain::Agreement::default())),
            feedback: Set(to_json(&Feedback::default())),
            completed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = active_model.insert(&self.db).await.map_err(AppError::from)?;

        Ok(Service::from(model))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Service>> {
        let result = ServiceEntity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(result.map(Service::from))
    }

    async fn list(
        &self,
        filter: ServiceFilter,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<Service>, u64)> {
        let mut query = ServiceEntity::find();

        if let Some(status) = filter.status {
            query = query.filter(service::Column::Status.eq(status.as_str()));
        }
        if let Some(category) = filter.category {
            query = query.filter(service::Column::Category.eq(category));
        }
        if let Some(ref term) = filter.search {
            let pattern = format!("%{}%", term.to_lowercase());
            query = query.filter(
                Condition::any()
                    .add(Expr::cust_with_values(
                        "LOWER(title) LIKE ?",
                        [pattern.clone()],
                    ))
                    .add(Expr::cust_with_values(
                        "LOWER(description) LIKE ?",
                        [pattern.clone()],
                    ))
                    .add(Expr::cust_with_values(
                        "LOWER(skills_required::text) LIKE ?",
                        [pattern.clone()],
                    ))
                    .add(Expr::cust_with_values(
                        "LOWER(skills_offered::text) LIKE ?",
                        [pattern],
                    )),
            );
        }

        query = match filter.sort {
            ServiceSort::Newest => query.order_by_desc(service::Column::CreatedAt),
            ServiceSort::Oldest => query.order_by_asc(service::Column::CreatedAt),
            ServiceSort::CreditsHigh => query.order_by_desc(service::Column::Credits),
            ServiceSort::CreditsLow => query.order_by_asc(service::Column::Credits),
        };

        let paginator = query.paginate(&self.db, per_page.max(1));
        let total = paginator.num_items().await.map_err(AppError::from)?;
        let models = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(AppError::from)?;

        Ok((models.into_iter().map(Service::from).collect(), total))
    }

    async fn recent(&self, limit: u64) -> AppResult<Vec<Service>> {
        let models = ServiceEntity::find()
            .order_by_desc(service::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(models.into_iter().map(Service::from).collect())
    }

    async fn engaged(&self, user: Uuid, statuses: Vec<ServiceStatus>) -> AppResult<Vec<Service>> {
        let status_strings: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();

        let models = ServiceEntity::find()
            .filter(involving_condition(user))
            .filter(service::Column::Status.is_in(status_strings))
            .order_by_desc(service::Column::UpdatedAt)
            .all(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(models.into_iter().map(Service::from).collect())
    }

    async fn involving(
        &self,
        user: Uuid,
        offset: u64,
        limit: u64,
    ) -> AppResult<(Vec<Service>, u64)> {
        let total = ServiceEntity::find()
            .filter(involving_condition(user))
            .count(&self.db)
            .await
            .map_err(AppError::from)?;

        let models = ServiceEntity::find()
            .filter(involving_condition(user))
            .order_by_desc(service::Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok((models.into_iter().map(Service::from).collect(), total))
    }

    async fn update_fields(&self, id: Uuid, changes: ServiceChanges) -> AppResult<Service> {
        let model = ServiceEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        // Agreement terms live inside the JSONB document
        let mut agreement: crate::domain::Agreement =
            serde_json::from_value(model.agreement.clone()).unwrap_or_default();

        let mut active: ActiveModel = model.into();

        if let Some(title) = changes.title {
            active.title = Set(title);
        }
        if let Some(description) = changes.description {
            active.description = Set(description);
        }
        if let Some(category) = changes.category {
            active.category = Set(category);
        }
        if let Some(location) = changes.location {
            active.location = Set(location);
        }
        if let Some(duration) = changes.duration {
            active.duration = Set(duration);
        }
        if let Some(credits) = changes.credits {
            active.credits = Set(credits);
        }
        if let Some(skills_required) = changes.skills_required {
            active.skills_required = Set(to_json(&skills_required));
        }
        if let Some(skills_offered) = changes.skills_offered {
            active.skills_offered = Set(to_json(&skills_offered));
        }
        if let Some(terms) = changes.agreement_terms {
            agreement.terms = Some(terms);
            active.agreement = Set(to_json(&agreement));
        }
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await.map_err(AppError::from)?;
        Ok(Service::from(model))
    }

    async fn set_milestones(&self, id: Uuid, milestones: Vec<Milestone>) -> AppResult<Service> {
        let model = ServiceEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ActiveModel = model.into();
        active.milestones = Set(to_json(&milestones));
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await.map_err(AppError::from)?;
        Ok(Service::from(model))
    }

    async fn set_feedback(&self, id: Uuid, feedback: Feedback) -> AppResult<Service> {
        let model = ServiceEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ActiveModel = model.into();
        active.feedback = Set(to_json(&feedback));
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await.map_err(AppError::from)?;
        Ok(Service::from(model))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = ServiceEntity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(AppError::from)?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }

    async fn claim(&self, id: Uuid, provider: Uuid) -> AppResult<u64> {
        let result = ServiceEntity::update_many()
            .col_expr(service::Column::ProviderId, Expr::value(provider))
            .col_expr(
                service::Column::Status,
                Expr::value(ServiceStatus::InProgress.as_str()),
            )
            .col_expr(service::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(service::Column::Id.eq(id))
            .filter(service::Column::Status.eq(ServiceStatus::Available.as_str()))
            .filter(service::Column::ProviderId.is_null())
            .exec(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(result.rows_affected)
    }

    async fn transition(
        &self,
        id: Uuid,
        from: ServiceStatus,
        to: ServiceStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> AppResult<u64> {
        let mut update = ServiceEntity::update_many()
            .col_expr(service::Column::Status, Expr::value(to.as_str()))
            .col_expr(service::Column::UpdatedAt, Expr::value(Utc::now()));

        if let Some(completed_at) = completed_at {
            update = update.col_expr(service::Column::CompletedAt, Expr::value(completed_at));
        }

        let result = update
            .filter(service::Column::Id.eq(id))
            .filter(service::Column::Status.eq(from.as_str()))
            .exec(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(result.rows_affected)
    }

    async fn completed_ratings(&self, provider: Uuid) -> AppResult<Vec<f64>> {
        let models = ServiceEntity::find()
            .filter(service::Column::ProviderId.eq(provider))
            .filter(service::Column::Status.eq(ServiceStatus::Completed.as_str()))
            .all(&self.db)
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

    async fn count_involving(&self, user: Uuid, status: Option<ServiceStatus>) -> AppResult<u64> {
        let mut query = ServiceEntity::find().filter(involving_condition(user));
        if let Some(status) = status {
            query = query.filter(service::Column::Status.eq(status.as_str()));
        }
        query.count(&self.db).await.map_err(AppError::from)
    }

    async fn count_for_requester(
        &self,
        user: Uuid,
        status: Option<ServiceStatus>,
    ) -> AppResult<u64> {
        let mut query = ServiceEntity::find().filter(service::Column::RequesterId.eq(user));
        if let Some(status) = status {
            query = query.filter(service::Column::Status.eq(status.as_str()));
        }
        query.count(&self.db).await.map_err(AppError::from)
    }

    async fn count_for_provider(
        &self,
        user: Uuid,
        status: Option<ServiceStatus>,
    ) -> AppResult<u64> {
        let mut query = ServiceEntity::find().filter(service::Column::ProviderId.eq(user));
        if let Some(status) = status {
            query = query.filter(service::Column::Status.eq(status.as_str()));
        }
        query.count(&self.db).await.map_err(AppError::from)
    }
}
