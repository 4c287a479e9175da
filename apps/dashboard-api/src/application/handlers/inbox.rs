use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use core_lib::domain::inbox::{Conversation, ConversationFilter, ConversationStatus, Message};
use serde::Deserialize;
use uuid::Uuid;

use crate::application::authz::require_tenant;
use crate::application::middleware::Authenticated;
use crate::application::{ApiJson, ApiResult};
use crate::AppState;

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: ConversationStatus,
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

pub async fn handle_list_conversations(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
    Query(filter): Query<ConversationFilter>,
) -> ApiResult<Json<Vec<Conversation>>> {
    let conversations = app_state
        .inbox
        .list_conversations(session.context.tenant(), &filter)
        .await?;
    Ok(Json(conversations))
}

pub async fn handle_set_status(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> ApiResult<Json<Conversation>> {
    let tenant = require_tenant(&session.context)?;
    Ok(Json(app_state.inbox.set_status(tenant, id, body.status).await?))
}

pub async fn handle_mark_read(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Conversation>> {
    let tenant = require_tenant(&session.context)?;
    Ok(Json(app_state.inbox.mark_read(tenant, id).await?))
}

pub async fn handle_list_messages(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Message>>> {
    Ok(Json(app_state.inbox.list_messages(session.context.tenant(), id).await?))
}

pub async fn handle_send_message(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<SendMessageRequest>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    let tenant = require_tenant(&session.context)?;
    let message = app_state.inbox.send_message(tenant, id, &body.content).await?;
    Ok((StatusCode::CREATED, Json(message)))
}
