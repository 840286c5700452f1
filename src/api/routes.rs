//! Application route configuration.

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::handlers::{
    auth_routes, dashboard_routes, message_routes, service_routes, skill_routes, user_routes,
    ws_upgrade,
};
use super::middleware::{rate_limit_auth_middleware, rate_limit_middleware};
use super::openapi::ApiDoc;
use super::AppState;
use crate::config::Config;

/// Create the application router with all routes configured
pub fn create_router(state: AppState, config: &Config) -> Router {
    let limiter_state = state.clone();
    let rate_limited = move |router: Router<AppState>| {
        router.route_layer(middleware::from_fn_with_state(
            limiter_state.clone(),
            rate_limit_middleware,
        ))
    };

    Router::new()
        // Health check endpoints (no rate limiting)
        .route("/", get(root))
        .route("/health", get(health))
        // OpenAPI Swagger UI documentation
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Authentication routes (stricter rate limiting)
        .nest(
            "/auth",
            auth_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit_auth_middleware,
            )),
        )
        // Resource routes; authentication is enforced per handler via
        // the CurrentUser extractor since several resources mix public
        // and protected endpoints
        .nest("/services", rate_limited(service_routes()))
        .nest("/users", rate_limited(user_routes()))
        .nest("/skills", rate_limited(skill_routes()))
        .nest("/messages", rate_limited(message_routes()))
        .nest("/dashboard", rate_limited(dashboard_routes()))
        // Realtime notifications
        .route("/ws", get(ws_upgrade))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(config))
        .with_state(state)
}

/// CORS for the SPA frontend
fn cors_layer(config: &Config) -> CorsLayer {
    let origin = config
        .client_url
        .parse::<HeaderValue>()
        .unwrap_or_else(|_| HeaderValue::from_static("http://localhost:3000"));

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Root endpoint
async fn root() -> &'static str {
    "SkillSwap API"
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    services: ServiceHealth,
}

/// Individual component health status
#[derive(Serialize)]
struct ServiceHealth {
    database: ComponentStatus,
    redis: ComponentStatus,
}

/// Component status
#[derive(Serialize)]
struct ComponentStatus {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Health check endpoint with database and Redis connectivity check
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let db_status = match state.database.ping().await {
        Ok(_) => ComponentStatus {
            status: "healthy",
            error: None,
        },
        Err(e) => ComponentStatus {
            status: "unhealthy",
            error: Some(e.to_string()),
        },
    };

    let redis_status = match state.cache.exists("health:ping").await {
        Ok(_) => ComponentStatus {
            status: "healthy",
            error: None,
        },
        Err(e) => ComponentStatus {
            status: "unhealthy",
            error: Some(e.to_string()),
        },
    };

    let all_healthy = db_status.status == "healthy" && redis_status.status == "healthy";

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" },
        services: ServiceHealth {
            database: db_status,
            redis: redis_status,
        },
    };

    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
