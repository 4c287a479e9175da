use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use core_lib::domain::marketing::{Campaign, CampaignFilter, CampaignStatus, Template, TemplateBrief};
use core_lib::domain::wizard::CampaignForm;
use core_lib::CoreError;
use serde::Deserialize;
use uuid::Uuid;

use crate::application::authz::require_tenant;
use crate::application::middleware::Authenticated;
use crate::application::{ApiJson, ApiResult};
use crate::AppState;

#[derive(Deserialize)]
pub struct CampaignStatusRequest {
    pub status: CampaignStatus,
}

#[derive(Deserialize)]
pub struct TestEmailRequest {
    pub to: String,
}

pub async fn handle_list_campaigns(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
    Query(filter): Query<CampaignFilter>,
) -> ApiResult<Json<Vec<Campaign>>> {
    Ok(Json(app_state.marketing.list_campaigns(session.context.tenant(), &filter).await?))
}

/// Takes the campaign wizard's final form and creates the campaign.
pub async fn handle_create_campaign(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
    ApiJson(form): ApiJson<CampaignForm>,
) -> ApiResult<(StatusCode, Json<Campaign>)> {
    let tenant = require_tenant(&session.context)?;
    let submission = form.to_submission().map_err(CoreError::from)?;
    let campaign = app_state.marketing.create_campaign(tenant, submission).await?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

pub async fn handle_send_campaign(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Campaign>> {
    let tenant = require_tenant(&session.context)?;
    Ok(Json(app_state.marketing.send_campaign(tenant, id).await?))
}

pub async fn handle_set_campaign_status(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<CampaignStatusRequest>,
) -> ApiResult<Json<Campaign>> {
    let tenant = require_tenant(&session.context)?;
    Ok(Json(app_state.marketing.set_campaign_status(tenant, id, body.status).await?))
}

pub async fn handle_list_templates(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
) -> ApiResult<Json<Vec<Template>>> {
    Ok(Json(app_state.marketing.list_templates(session.context.tenant()).await?))
}

pub async fn handle_generate_template(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
    ApiJson(brief): ApiJson<TemplateBrief>,
) -> ApiResult<(StatusCode, Json<Template>)> {
    let tenant = require_tenant(&session.context)?;
    let template = app_state.marketing.generate_template(tenant, brief).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn handle_send_test_email(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<TestEmailRequest>,
) -> ApiResult<StatusCode> {
    let tenant = require_tenant(&session.context)?;
    app_state.marketing.send_test_email(tenant, id, &body.to).await?;
    Ok(StatusCode::ACCEPTED)
}
