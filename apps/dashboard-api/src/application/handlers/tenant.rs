use axum::{extract::State, Extension, Json};
use core_lib::domain::tenant::TenantConfig;
use core_lib::services::admin::SettingsPatch;
use core_lib::services::dashboard::DashboardSummary;

use crate::application::authz::{require_tenant, require_tenant_admin};
use crate::application::middleware::Authenticated;
use crate::application::{ApiJson, ApiResult};
use crate::AppState;

pub async fn handle_get_tenant(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
) -> ApiResult<Json<TenantConfig>> {
    let tenant = require_tenant(&session.context)?;
    Ok(Json(app_state.resources.tenant_config(tenant).await?))
}

pub async fn handle_update_settings(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
    ApiJson(patch): ApiJson<SettingsPatch>,
) -> ApiResult<Json<TenantConfig>> {
    require_tenant_admin(&session.context)?;
    let tenant = require_tenant(&session.context)?;
    Ok(Json(app_state.admin.update_settings(tenant, patch).await?))
}

pub async fn handle_dashboard(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
) -> ApiResult<Json<DashboardSummary>> {
    let tenant = require_tenant(&session.context)?;
    Ok(Json(app_state.dashboards.summary(tenant).await?))
}
