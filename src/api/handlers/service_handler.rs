//! Service lifecycle handlers.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, patch, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::domain::{Milestone, ServiceResponse, ServiceStatus};
use crate::errors::AppResult;
use crate::infra::{NewService, ServiceChanges, ServiceFilter, ServiceSort};
use crate::services::{CompletionReceipt, EngagedService};
use crate::types::{ApiResponse, Created, Paginated, PaginationParams};

/// Listing query parameters
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceListQuery {
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub per_page: Option<u64>,
    /// Status filter; omit or pass "all" for every status
    pub status: Option<String>,
    /// Category filter; omit or pass "all" for every category
    pub category: Option<String>,
    /// Free-text search over title, description and skill tags
    pub search: Option<String>,
    /// One of "newest" (default), "oldest", "credits", "credits-low"
    pub sort_by: Option<String>,
}

impl ServiceListQuery {
    fn into_parts(self) -> AppResult<(ServiceFilter, PaginationParams)> {
        let status = match self.status.as_deref() {
            None | Some("all") => None,
            Some(value) => Some(value.parse::<ServiceStatus>()?),
        };

        let category = self.category.filter(|c| c != "all");

        let sort = match self.sort_by.as_deref() {
            Some("oldest") => ServiceSort::Oldest,
            Some("credits") => ServiceSort::CreditsHigh,
            Some("credits-low") => ServiceSort::CreditsLow,
            _ => ServiceSort::Newest,
        };

        let mut pagination = PaginationParams::default();
        if let Some(page) = self.page {
            pagination.page = page.max(1);
        }
        if let Some(per_page) = self.per_page {
            pagination.per_page = per_page;
        }

        Ok((
            ServiceFilter {
                status,
                category,
                search: self.search,
                sort,
            },
            pagination,
        ))
    }
}

/// Milestone payload inside a service request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneRequest {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

impl From<MilestoneRequest> for Milestone {
    fn from(request: MilestoneRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: request.title,
            description: request.description,
            completed: false,
            due_date: request.due_date,
        }
    }
}

/// Service creation request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceRequest {
    #[validate(length(min = 1, message = "Title is required"))]
    #[schema(example = "Design a logo")]
    pub title: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[validate(length(min = 1, message = "Category is required"))]
    #[schema(example = "Design")]
    pub category: String,
    #[validate(length(min = 1, message = "Location is required"))]
    #[schema(example = "Remote")]
    pub location: String,
    #[validate(length(min = 1, message = "Duration is required"))]
    #[schema(example = "1 week")]
    pub duration: String,
    /// Price in credits (minimum 1)
    #[validate(range(min = 1, message = "Credits must be at least 1"))]
    #[schema(example = 5, minimum = 1)]
    pub credits: i64,
    #[serde(default)]
    pub skills_required: Vec<String>,
    #[serde(default)]
    pub skills_offered: Vec<String>,
    #[serde(default)]
    pub milestones: Vec<MilestoneRequest>,
}

/// Partial service update (requester only, unengaged services only)
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateServiceRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub duration: Option<String>,
    #[validate(range(min = 1, message = "Credits must be at least 1"))]
    pub credits: Option<i64>,
    pub skills_required: Option<Vec<String>>,
    pub skills_offered: Option<Vec<String>>,
    /// Replaces the agreement terms text
    pub agreement_terms: Option<String>,
}

/// Generic status transition request
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    /// Target status, validated against the transition table
    #[schema(example = "cancelled")]
    pub status: String,
}

/// Feedback request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    /// Rating from 1 to 5
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    #[schema(minimum = 1, maximum = 5)]
    pub rating: u8,
    pub comment: Option<String>,
}

/// Milestone completion flag update
#[derive(Debug, Deserialize, ToSchema)]
pub struct MilestoneUpdateRequest {
    pub completed: bool,
}

/// Create service routes
pub fn service_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_services).post(create_service))
        .route("/recent", get(recent_services))
        .route("/accepted", get(accepted_services))
        .route(
            "/:id",
            get(get_service).put(update_service).delete(delete_service),
        )
        .route("/:id/accept", post(accept_service))
        .route("/:id/complete", put(complete_service))
        .route("/:id/confirm-completion", post(confirm_completion))
        .route("/:id/feedback", post(add_feedback))
        .route("/:id/status", patch(update_status))
        .route("/:id/milestones/:milestone_id", put(update_milestone))
}

/// List services with filtering, sorting and pagination
#[utoipa::path(
    get,
    path = "/services",
    tag = "Services",
    responses(
        (status = 200, description = "Page of services"),
        (status = 400, description = "Unknown status filter")
    )
)]
pub async fn list_services(
    State(state): State<AppState>,
    Query(query): Query<ServiceListQuery>,
) -> AppResult<Json<Paginated<ServiceResponse>>> {
    let (filter, pagination) = query.into_parts()?;
    let page = state.lifecycle.list(filter, pagination).await?;

    Ok(Json(page))
}

/// Most recently posted services
#[utoipa::path(
    get,
    path = "/services/recent",
    tag = "Services",
    responses((status = 200, description = "Recent services", body = [ServiceResponse]))
)]
pub async fn recent_services(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ServiceResponse>>> {
    let services = state.lifecycle.recent().await?;
    Ok(Json(services))
}

/// The caller's engaged services, annotated with their role
#[utoipa::path(
    get,
    path = "/services/accepted",
    tag = "Services",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Engaged services", body = [EngagedService]),
        (status = 401, description = "Unauthenticated")
    )
)]
pub async fn accepted_services(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<EngagedService>>> {
    let services = state.lifecycle.accepted(user.id).await?;
    Ok(Json(services))
}

/// Fetch one service
#[utoipa::path(
    get,
    path = "/services/{id}",
    tag = "Services",
    params(("id" = Uuid, Path, description = "Service id")),
    responses(
        (status = 200, description = "The service", body = ServiceResponse),
        (status = 404, description = "Service not found")
    )
)]
pub async fn get_service(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ServiceResponse>> {
    let service = state.lifecycle.get(id).await?;
    Ok(Json(service))
}

/// Post a new service request
#[utoipa::path(
    post,
    path = "/services",
    tag = "Services",
    security(("bearer_auth" = [])),
    request_body = CreateServiceRequest,
    responses(
        (status = 201, description = "Service created", body = ServiceResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthenticated")
    )
)]
pub async fn create_service(
    State(state): State<AppState>,
    user: CurrentUser,
    ValidatedJson(payload): ValidatedJson<CreateServiceRequest>,
) -> AppResult<Created<ServiceResponse>> {
    let service = state
        .lifecycle
        .create(NewService {
            requester: user.id,
            title: payload.title,
            description: payload.description,
            category: payload.category,
            location: payload.location,
            duration: payload.duration,
            credits: payload.credits,
            skills_required: payload.skills_required,
            skills_offered: payload.skills_offered,
            milestones: payload.milestones.into_iter().map(Milestone::from).collect(),
        })
        .await?;

    Ok(Created(service))
}

/// Edit a service (requester only, before engagement)
#[utoipa::path(
    put,
    path = "/services/{id}",
    tag = "Services",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Service id")),
    request_body = UpdateServiceRequest,
    responses(
        (status = 200, description = "Updated service", body = ServiceResponse),
        (status = 403, description = "Caller is not the requester"),
        (status = 404, description = "Service not found"),
        (status = 409, description = "Service already engaged")
    )
)]
pub async fn update_service(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
    ValidatedJson(payload): ValidatedJson<UpdateServiceRequest>,
) -> AppResult<Json<ServiceResponse>> {
    let changes = ServiceChanges {
        title: payload.title,
        description: payload.description,
        category: payload.category,
        location: payload.location,
        duration: payload.duration,
        credits: payload.credits,
        skills_required: payload.skills_required,
        skills_offered: payload.skills_offered,
        agreement_terms: payload.agreement_terms,
    };

    let service = state.lifecycle.update(id, user.id, changes).await?;
    Ok(Json(service))
}

/// Delete a service (requester only)
#[utoipa::path(
    delete,
    path = "/services/{id}",
    tag = "Services",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Service id")),
    responses(
        (status = 200, description = "Service deleted"),
        (status = 403, description = "Caller is not the requester"),
        (status = 404, description = "Service not found")
    )
)]
pub async fn delete_service(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<()>>> {
    state.lifecycle.delete(id, user.id).await?;
    Ok(Json(ApiResponse::message("Service deleted successfully")))
}

/// Accept an available service as its provider
#[utoipa::path(
    post,
    path = "/services/{id}/accept",
    tag = "Services",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Service id")),
    responses(
        (status = 200, description = "Service accepted", body = ServiceResponse),
        (status = 403, description = "Cannot accept your own service"),
        (status = 404, description = "Service not found"),
        (status = 409, description = "Service is not available or already claimed")
    )
)]
pub async fn accept_service(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
) -> AppResult<Json<ServiceResponse>> {
    let service = state.lifecycle.accept(id, user.id).await?;
    Ok(Json(service))
}

/// Provider marks the work done (awaiting requester confirmation)
#[utoipa::path(
    put,
    path = "/services/{id}/complete",
    tag = "Services",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Service id")),
    responses(
        (status = 200, description = "Awaiting confirmation", body = ServiceResponse),
        (status = 403, description = "Caller is not the provider"),
        (status = 404, description = "Service not found"),
        (status = 409, description = "Service is not in progress")
    )
)]
pub async fn complete_service(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
) -> AppResult<Json<ServiceResponse>> {
    let service = state.lifecycle.mark_complete(id, user.id).await?;
    Ok(Json(service))
}

/// Requester confirms completion; transfers credits and updates rating
#[utoipa::path(
    post,
    path = "/services/{id}/confirm-completion",
    tag = "Services",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Service id")),
    responses(
        (status = 200, description = "Completion settled", body = CompletionReceipt),
        (status = 403, description = "Caller is not the requester"),
        (status = 404, description = "Service not found"),
        (status = 409, description = "Service is not awaiting confirmation")
    )
)]
pub async fn confirm_completion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
) -> AppResult<Json<CompletionReceipt>> {
    let receipt = state.lifecycle.confirm_completion(id, user.id).await?;
    Ok(Json(receipt))
}

/// Leave feedback on a completed service
#[utoipa::path(
    post,
    path = "/services/{id}/feedback",
    tag = "Services",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Service id")),
    request_body = FeedbackRequest,
    responses(
        (status = 200, description = "Feedback stored", body = ServiceResponse),
        (status = 403, description = "Caller is not a participant"),
        (status = 404, description = "Service not found"),
        (status = 409, description = "Service is not completed")
    )
)]
pub async fn add_feedback(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
    ValidatedJson(payload): ValidatedJson<FeedbackRequest>,
) -> AppResult<Json<ServiceResponse>> {
    let service = state
        .lifecycle
        .add_feedback(id, user.id, payload.rating, payload.comment)
        .await?;
    Ok(Json(service))
}

/// Generic status transition, validated against the table
#[utoipa::path(
    patch,
    path = "/services/{id}/status",
    tag = "Services",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Service id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ServiceResponse),
        (status = 400, description = "Unknown status"),
        (status = 403, description = "Caller is not a participant"),
        (status = 404, description = "Service not found"),
        (status = 409, description = "Transition not allowed")
    )
)]
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
    Json(payload): Json<UpdateStatusRequest>,
) -> AppResult<Json<ServiceResponse>> {
    let new_status = payload.status.parse::<ServiceStatus>()?;
    let service = state.lifecycle.update_status(id, user.id, new_status).await?;
    Ok(Json(service))
}

/// Provider flips a milestone's completed flag
#[utoipa::path(
    put,
    path = "/services/{id}/milestones/{milestone_id}",
    tag = "Services",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Service id"),
        ("milestone_id" = Uuid, Path, description = "Milestone id")
    ),
    request_body = MilestoneUpdateRequest,
    responses(
        (status = 200, description = "Milestone updated", body = ServiceResponse),
        (status = 403, description = "Caller is not the provider"),
        (status = 404, description = "Service or milestone not found")
    )
)]
pub async fn update_milestone(
    State(state): State<AppState>,
    Path((id, milestone_id)): Path<(Uuid, Uuid)>,
    user: CurrentUser,
    Json(payload): Json<MilestoneUpdateRequest>,
) -> AppResult<Json<ServiceResponse>> {
    let service = state
        .lifecycle
        .update_milestone(id, milestone_id, user.id, payload.completed)
        .await?;
    Ok(Json(service))
}
