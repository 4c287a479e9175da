use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use core_lib::domain::context::AppContext;
use core_lib::domain::tenant::{TenantConfig, TenantId};
use core_lib::domain::wizard::TenantForm;
use core_lib::services::onboarding::OnboardingReport;
use core_lib::CoreError;
use serde::Deserialize;

use crate::application::authz::require_master_admin;
use crate::application::middleware::Authenticated;
use crate::application::{ApiJson, ApiResult};
use crate::AppState;

#[derive(Deserialize)]
pub struct ImpersonateRequest {
    pub tenant_id: TenantId,
}

pub async fn handle_list_tenants(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
) -> ApiResult<Json<Vec<TenantConfig>>> {
    require_master_admin(&session.context)?;
    Ok(Json(app_state.admin.list_tenants().await?))
}

/// Runs the "add tenant" wizard's submission. Partial failures come back in
/// the report with 201; only a failed tenant write is an error.
pub async fn handle_create_tenant(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
    ApiJson(form): ApiJson<TenantForm>,
) -> ApiResult<(StatusCode, Json<OnboardingReport>)> {
    require_master_admin(&session.context)?;
    let report = app_state.onboarding.run(form).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn handle_suspend_tenant(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
    Path(tenant_id): Path<String>,
) -> ApiResult<Json<TenantConfig>> {
    require_master_admin(&session.context)?;
    let tenant = TenantId::parse(&tenant_id).map_err(CoreError::from)?;
    Ok(Json(app_state.admin.suspend_tenant(&tenant).await?))
}

pub async fn handle_impersonate(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
    ApiJson(body): ApiJson<ImpersonateRequest>,
) -> ApiResult<Json<AppContext>> {
    Ok(Json(app_state.auth.impersonate(&session.token, body.tenant_id).await?))
}

pub async fn handle_end_impersonation(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
) -> ApiResult<Json<AppContext>> {
    Ok(Json(app_state.auth.end_impersonation(&session.token).await?))
}
