//! Dashboard handlers.

use axum::{extract::State, response::Json, routing::get, Router};

use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::errors::AppResult;
use crate::services::DashboardStats;

/// Create dashboard routes
pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/stats", get(dashboard_stats))
}

/// Exchange counters for the caller's dashboard
#[utoipa::path(
    get,
    path = "/dashboard/stats",
    tag = "Dashboard",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard statistics", body = DashboardStats),
        (status = 401, description = "Unauthenticated")
    )
)]
pub async fn dashboard_stats(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<DashboardStats>> {
    let stats = state.user_service.dashboard(user.id).await?;
    Ok(Json(stats))
}
