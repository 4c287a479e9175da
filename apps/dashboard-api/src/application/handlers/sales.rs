use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use core_lib::domain::sales::{Deal, Lead, LeadFilter, LeadSource, NewDeal, SequenceAction};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::application::authz::require_tenant;
use crate::application::middleware::Authenticated;
use crate::application::{ApiJson, ApiResult};
use crate::AppState;

#[derive(Deserialize)]
pub struct GenerateLeadsRequest {
    pub source: LeadSource,
    #[serde(default)]
    pub criteria: Value,
}

#[derive(Deserialize)]
pub struct SequenceRequest {
    pub action: SequenceAction,
}

#[derive(Deserialize)]
pub struct StageRequest {
    pub stage: String,
}

pub async fn handle_list_leads(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
    Query(filter): Query<LeadFilter>,
) -> ApiResult<Json<Vec<Lead>>> {
    Ok(Json(app_state.sales.list_leads(session.context.tenant(), &filter).await?))
}

pub async fn handle_generate_leads(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
    ApiJson(body): ApiJson<GenerateLeadsRequest>,
) -> ApiResult<Json<Value>> {
    let tenant = require_tenant(&session.context)?;
    let data = app_state
        .sales
        .generate_leads(tenant, body.source, body.criteria)
        .await?;
    Ok(Json(data))
}

pub async fn handle_control_sequence(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<SequenceRequest>,
) -> ApiResult<Json<Lead>> {
    let tenant = require_tenant(&session.context)?;
    Ok(Json(app_state.sales.control_sequence(tenant, id, body.action).await?))
}

pub async fn handle_list_deals(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
) -> ApiResult<Json<Vec<Deal>>> {
    Ok(Json(app_state.sales.list_deals(session.context.tenant()).await?))
}

pub async fn handle_create_deal(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
    ApiJson(draft): ApiJson<NewDeal>,
) -> ApiResult<(StatusCode, Json<Deal>)> {
    let tenant = require_tenant(&session.context)?;
    let deal = app_state.sales.create_deal(tenant, draft).await?;
    Ok((StatusCode::CREATED, Json(deal)))
}

pub async fn handle_move_deal(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<StageRequest>,
) -> ApiResult<Json<Deal>> {
    let tenant = require_tenant(&session.context)?;
    Ok(Json(app_state.sales.move_deal_stage(tenant, id, &body.stage).await?))
}
