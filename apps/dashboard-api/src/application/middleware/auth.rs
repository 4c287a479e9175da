use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use core_lib::domain::context::AppContext;
use tracing::debug;

use crate::application::ApplicationError;
use crate::AppState;

/// The signed-in session, attached to the request by [`session_auth`].
#[derive(Clone, Debug)]
pub struct Authenticated {
    pub token: String,
    pub context: AppContext,
}

/// Reads `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Resolves the session token into the stored [`AppContext`].
pub async fn session_auth(
    State(app_state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApplicationError> {
    let token = bearer_token(req.headers())
        .ok_or_else(|| ApplicationError::Unauthorized("Missing bearer token".into()))?;
    let context = app_state.auth.resolve(&token).await?;
    debug!(user_id = %context.user_id, tenant = ?context.active_tenant, "Session authenticated");
    req.extensions_mut().insert(Authenticated { token, context });
    Ok(next.run(req).await)
}
