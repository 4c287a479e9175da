use axum::{extract::State, Extension, Json};
use core_lib::services::dashboard::HrDashboard;

use crate::application::authz::require_tenant;
use crate::application::middleware::Authenticated;
use crate::application::ApiResult;
use crate::AppState;

pub async fn handle_hr_dashboard(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
) -> ApiResult<Json<HrDashboard>> {
    let tenant = require_tenant(&session.context)?;
    Ok(Json(app_state.dashboards.hr_dashboard(tenant).await?))
}
