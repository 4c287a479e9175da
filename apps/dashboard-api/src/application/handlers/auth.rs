use axum::{extract::State, http::StatusCode, Extension, Json};
use core_lib::domain::context::AppContext;
use core_lib::domain::user::{SignUp, UserProfile};
use core_lib::services::auth::Session;
use serde::Deserialize;

use crate::application::authz::{require_tenant, require_tenant_admin};
use crate::application::middleware::Authenticated;
use crate::application::{ApiJson, ApiResult};
use crate::AppState;

#[derive(Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Team sign-up: a tenant admin registers a manager or staff member into
/// the active tenant.
pub async fn handle_sign_up(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
    ApiJson(form): ApiJson<SignUp>,
) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    require_tenant_admin(&session.context)?;
    let tenant = require_tenant(&session.context)?;
    let profile = app_state.auth.add_member(tenant, form).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn handle_sign_in(
    State(app_state): State<AppState>,
    ApiJson(body): ApiJson<SignInRequest>,
) -> ApiResult<Json<Session>> {
    let session = app_state.auth.sign_in(&body.email, &body.password).await?;
    Ok(Json(session))
}

pub async fn handle_sign_out(
    State(app_state): State<AppState>,
    Extension(session): Extension<Authenticated>,
) -> ApiResult<StatusCode> {
    app_state.auth.sign_out(&session.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn handle_me(Extension(session): Extension<Authenticated>) -> Json<AppContext> {
    Json(session.context)
}
