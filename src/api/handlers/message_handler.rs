//! Messaging handlers.

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::domain::{ConversationSummary, MessageResponse};
use crate::errors::AppResult;
use crate::types::{ApiResponse, Created};

/// New message request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    /// Recipient user id
    pub recipient: Uuid,
    /// Message text; must be non-empty after trimming
    #[validate(length(min = 1, message = "Message content is required"))]
    pub content: String,
}

/// Create message routes
pub fn message_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_messages).post(send_message))
        .route("/conversations", get(conversations))
        .route("/conversation/:user_id", get(conversation))
        .route("/read/:user_id", put(mark_read))
}

/// All messages involving the caller, newest first
#[utoipa::path(
    get,
    path = "/messages",
    tag = "Messages",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Messages", body = [MessageResponse]),
        (status = 401, description = "Unauthenticated")
    )
)]
pub async fn list_messages(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<MessageResponse>>> {
    let messages = state.message_service.list_for_user(user.id).await?;
    Ok(Json(messages))
}

/// Send a message
#[utoipa::path(
    post,
    path = "/messages",
    tag = "Messages",
    security(("bearer_auth" = [])),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message sent", body = MessageResponse),
        (status = 400, description = "Empty content or self-addressed"),
        (status = 404, description = "Recipient not found")
    )
)]
pub async fn send_message(
    State(state): State<AppState>,
    user: CurrentUser,
    ValidatedJson(payload): ValidatedJson<SendMessageRequest>,
) -> AppResult<Created<MessageResponse>> {
    let message = state
        .message_service
        .send(user.id, payload.recipient, payload.content)
        .await?;

    Ok(Created(message))
}

/// Conversation overview, one entry per counterpart
#[utoipa::path(
    get,
    path = "/messages/conversations",
    tag = "Messages",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Conversations", body = [ConversationSummary]))
)]
pub async fn conversations(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<ConversationSummary>>> {
    let conversations = state.message_service.conversations(user.id).await?;
    Ok(Json(conversations))
}

/// The thread with one counterpart; marks their messages read
#[utoipa::path(
    get,
    path = "/messages/conversation/{user_id}",
    tag = "Messages",
    security(("bearer_auth" = [])),
    params(("user_id" = Uuid, Path, description = "Counterpart user id")),
    responses(
        (status = 200, description = "Thread messages", body = [MessageResponse]),
        (status = 404, description = "Counterpart not found")
    )
)]
pub async fn conversation(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    user: CurrentUser,
) -> AppResult<Json<Vec<MessageResponse>>> {
    let messages = state.message_service.conversation(user.id, user_id).await?;
    Ok(Json(messages))
}

/// Mark all messages from the counterpart as read
#[utoipa::path(
    put,
    path = "/messages/read/{user_id}",
    tag = "Messages",
    security(("bearer_auth" = [])),
    params(("user_id" = Uuid, Path, description = "Counterpart user id")),
    responses((status = 200, description = "Messages marked read"))
)]
pub async fn mark_read(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<()>>> {
    state.message_service.mark_read(user.id, user_id).await?;
    Ok(Json(ApiResponse::message("Messages marked as read")))
}
