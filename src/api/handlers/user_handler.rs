//! User profile, skills, portfolio and activity handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
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
use crate::domain::{PortfolioItem, Skill, SkillLevel, UserResponse};
use crate::errors::AppResult;
use crate::infra::{ProfileChanges, UserSearch};
use crate::services::{Activity, PortfolioChanges, UserStats};
use crate::types::{ApiResponse, Paginated, PaginationParams};

/// Profile update request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub github_profile: Option<String>,
    pub linkedin_profile: Option<String>,
}

/// New skill request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddSkillRequest {
    #[validate(length(min = 1, message = "Skill name is required"))]
    #[schema(example = "Rust")]
    pub name: String,
    pub level: SkillLevel,
}

/// Skill update request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSkillRequest {
    pub name: Option<String>,
    pub level: Option<SkillLevel>,
}

/// New portfolio entry request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioItemRequest {
    #[validate(length(min = 1, message = "Portfolio title is required"))]
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub link: Option<String>,
    pub github_link: Option<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Portfolio entry update request
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePortfolioItemRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub link: Option<String>,
    pub github_link: Option<String>,
    pub technologies: Option<Vec<String>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// People-directory search parameters
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSearchQuery {
    /// Free-text match on name and bio
    pub search: Option<String>,
    /// Comma-separated skill names
    pub skills: Option<String>,
    /// Minimum rating
    pub rating: Option<f64>,
}

/// Create user routes
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/skills", post(add_skill))
        .route("/skills/:skill_id", put(update_skill).delete(remove_skill))
        .route("/portfolio", post(add_portfolio_item))
        .route(
            "/portfolio/:item_id",
            put(update_portfolio_item).delete(remove_portfolio_item),
        )
        .route("/stats", get(get_stats))
        .route("/search", get(search_users))
        .route("/activities", get(get_activities))
        .route("/:id", get(get_user))
}

/// The caller's own profile
#[utoipa::path(
    get,
    path = "/users/profile",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user profile", body = UserResponse),
        (status = 401, description = "Unauthenticated")
    )
)]
pub async fn get_profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<UserResponse>> {
    let profile = state.user_service.get_user(user.id).await?;
    Ok(Json(profile))
}

/// Update the caller's profile
#[utoipa::path(
    put,
    path = "/users/profile",
    tag = "Users",
    security(("bearer_auth" = [])),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserResponse),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    ValidatedJson(payload): ValidatedJson<UpdateProfileRequest>,
) -> AppResult<Json<UserResponse>> {
    let changes = ProfileChanges {
        first_name: payload.first_name,
        last_name: payload.last_name,
        email: payload.email,
        bio: payload.bio,
        avatar_url: payload.avatar_url,
        github_profile: payload.github_profile,
        linkedin_profile: payload.linkedin_profile,
    };

    let profile = state.user_service.update_profile(user.id, changes).await?;
    Ok(Json(profile))
}

/// Declare a new skill
#[utoipa::path(
    post,
    path = "/users/skills",
    tag = "Users",
    security(("bearer_auth" = [])),
    request_body = AddSkillRequest,
    responses((status = 201, description = "Skill added"))
)]
pub async fn add_skill(
    State(state): State<AppState>,
    user: CurrentUser,
    ValidatedJson(payload): ValidatedJson<AddSkillRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Vec<Skill>>>)> {
    let skills = state
        .user_service
        .add_skill(user.id, payload.name, payload.level)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(skills, "Skill added successfully")),
    ))
}

/// Update a declared skill
#[utoipa::path(
    put,
    path = "/users/skills/{skill_id}",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(("skill_id" = Uuid, Path, description = "Skill id")),
    request_body = UpdateSkillRequest,
    responses(
        (status = 200, description = "Skill updated"),
        (status = 404, description = "Skill not found")
    )
)]
pub async fn update_skill(
    State(state): State<AppState>,
    Path(skill_id): Path<Uuid>,
    user: CurrentUser,
    Json(payload): Json<UpdateSkillRequest>,
) -> AppResult<Json<ApiResponse<Vec<Skill>>>> {
    let skills = state
        .user_service
        .update_skill(user.id, skill_id, payload.name, payload.level)
        .await?;

    Ok(Json(ApiResponse::with_message(
        skills,
        "Skill updated successfully",
    )))
}

/// Remove a declared skill
#[utoipa::path(
    delete,
    path = "/users/skills/{skill_id}",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(("skill_id" = Uuid, Path, description = "Skill id")),
    responses(
        (status = 200, description = "Skill removed"),
        (status = 404, description = "Skill not found")
    )
)]
pub async fn remove_skill(
    State(state): State<AppState>,
    Path(skill_id): Path<Uuid>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<Vec<Skill>>>> {
    let skills = state.user_service.remove_skill(user.id, skill_id).await?;

    Ok(Json(ApiResponse::with_message(
        skills,
        "Skill deleted successfully",
    )))
}

/// Add a portfolio entry
#[utoipa::path(
    post,
    path = "/users/portfolio",
    tag = "Users",
    security(("bearer_auth" = [])),
    request_body = PortfolioItemRequest,
    responses((status = 201, description = "Portfolio entry added"))
)]
pub async fn add_portfolio_item(
    State(state): State<AppState>,
    user: CurrentUser,
    ValidatedJson(payload): ValidatedJson<PortfolioItemRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Vec<PortfolioItem>>>)> {
    let item = PortfolioItem {
        id: Uuid::new_v4(),
        title: payload.title,
        description: payload.description,
        image_url: payload.image_url,
        link: payload.link,
        github_link: payload.github_link,
        technologies: payload.technologies,
        start_date: payload.start_date,
        end_date: payload.end_date,
    };

    let portfolio = state.user_service.add_portfolio_item(user.id, item).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            portfolio,
            "Portfolio item added successfully",
        )),
    ))
}

/// Update a portfolio entry
#[utoipa::path(
    put,
    path = "/users/portfolio/{item_id}",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(("item_id" = Uuid, Path, description = "Portfolio item id")),
    request_body = UpdatePortfolioItemRequest,
    responses(
        (status = 200, description = "Portfolio entry updated"),
        (status = 404, description = "Portfolio item not found")
    )
)]
pub async fn update_portfolio_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    user: CurrentUser,
    Json(payload): Json<UpdatePortfolioItemRequest>,
) -> AppResult<Json<ApiResponse<Vec<PortfolioItem>>>> {
    let changes = PortfolioChanges {
        title: payload.title,
        description: payload.description,
        image_url: payload.image_url,
        link: payload.link,
        github_link: payload.github_link,
        technologies: payload.technologies,
        start_date: payload.start_date,
        end_date: payload.end_date,
    };

    let portfolio = state
        .user_service
        .update_portfolio_item(user.id, item_id, changes)
        .await?;

    Ok(Json(ApiResponse::with_message(
        portfolio,
        "Portfolio item updated successfully",
    )))
}

/// Remove a portfolio entry
#[utoipa::path(
    delete,
    path = "/users/portfolio/{item_id}",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(("item_id" = Uuid, Path, description = "Portfolio item id")),
    responses(
        (status = 200, description = "Portfolio entry removed"),
        (status = 404, description = "Portfolio item not found")
    )
)]
pub async fn remove_portfolio_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<Vec<PortfolioItem>>>> {
    let portfolio = state
        .user_service
        .remove_portfolio_item(user.id, item_id)
        .await?;

    Ok(Json(ApiResponse::with_message(
        portfolio,
        "Portfolio item deleted successfully",
    )))
}

/// The caller's exchange statistics
#[utoipa::path(
    get,
    path = "/users/stats",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "User statistics", body = UserStats))
)]
pub async fn get_stats(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<UserStats>> {
    let stats = state.user_service.stats(user.id).await?;
    Ok(Json(stats))
}

/// Search the people directory
#[utoipa::path(
    get,
    path = "/users/search",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Matching users", body = [UserResponse]))
)]
pub async fn search_users(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<UserSearchQuery>,
) -> AppResult<Json<Vec<UserResponse>>> {
    let skills = query
        .skills
        .map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let results = state
        .user_service
        .search(UserSearch {
            text: query.search,
            skills,
            min_rating: query.rating.filter(|r| *r > 0.0),
            exclude: Some(user.id),
        })
        .await?;

    Ok(Json(results))
}

/// The caller's recent activity feed
#[utoipa::path(
    get,
    path = "/users/activities",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Page of activities"))
)]
pub async fn get_activities(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(pagination): Query<PaginationParams>,
) -> AppResult<Json<Paginated<Activity>>> {
    let page = state.user_service.activities(user.id, pagination).await?;
    Ok(Json(page))
}

/// Fetch a user's public profile
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User profile", body = UserResponse),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: CurrentUser,
) -> AppResult<Json<UserResponse>> {
    let profile = state.user_service.get_user(id).await?;
    Ok(Json(profile))
}
