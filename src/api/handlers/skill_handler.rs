//! Global skill catalogue handlers.

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::domain::UserResponse;
use crate::errors::AppResult;

/// Skill verification request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifySkillRequest {
    /// The user whose skill is being verified
    pub user_id: Uuid,
}

/// Create skill routes
pub fn skill_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_skills))
        .route("/:name/users", get(users_by_skill))
        .route("/:name/verify", post(verify_skill))
}

/// Distinct skill names across all users
#[utoipa::path(
    get,
    path = "/skills",
    tag = "Skills",
    responses((status = 200, description = "Skill catalogue", body = [String]))
)]
pub async fn list_skills(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    let names = state.user_service.skill_catalogue().await?;
    Ok(Json(names))
}

/// Users declaring the named skill
#[utoipa::path(
    get,
    path = "/skills/{name}/users",
    tag = "Skills",
    params(("name" = String, Path, description = "Skill name")),
    responses((status = 200, description = "Users with the skill", body = [UserResponse]))
)]
pub async fn users_by_skill(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<Vec<UserResponse>>> {
    let users = state.user_service.users_with_skill(name).await?;
    Ok(Json(users))
}

/// Mark a user's skill as verified
#[utoipa::path(
    post,
    path = "/skills/{name}/verify",
    tag = "Skills",
    security(("bearer_auth" = [])),
    params(("name" = String, Path, description = "Skill name")),
    request_body = VerifySkillRequest,
    responses(
        (status = 200, description = "Skill verified", body = UserResponse),
        (status = 404, description = "User or skill not found")
    )
)]
pub async fn verify_skill(
    State(state): State<AppState>,
    Path(name): Path<String>,
    _user: CurrentUser,
    Json(payload): Json<VerifySkillRequest>,
) -> AppResult<Json<UserResponse>> {
    let user = state
        .user_service
        .verify_skill(payload.user_id, name)
        .await?;
    Ok(Json(user))
}
