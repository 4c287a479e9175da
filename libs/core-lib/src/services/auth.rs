use rand::{distr::Alphanumeric, Rng};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::context::AppContext;
use crate::domain::tenant::TenantId;
use crate::domain::user::{normalize_email, Role, SignUp, UserProfile};
use crate::resource::parse_row;
use crate::services::Resources;
use crate::store::{SelectQuery, Table};
use crate::{AuthProvider, Cache, CoreError};

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const SESSION_TOKEN_LEN: usize = 48;

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub context: AppContext,
}

fn session_key(token: &str) -> String {
    format!("sess:{}", token)
}

fn new_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Sign-up, sign-in and the session-held [`AppContext`].
#[derive(Clone)]
pub struct AuthService {
    auth: Arc<dyn AuthProvider>,
    sessions: Arc<dyn Cache>,
    resources: Resources,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        sessions: Arc<dyn Cache>,
        resources: Resources,
        session_ttl: Duration,
    ) -> Self {
        Self {
            auth,
            sessions,
            resources,
            session_ttl,
        }
    }

    pub async fn sign_up(&self, form: SignUp) -> Result<UserProfile, CoreError> {
        form.validate()?;
        if let Some(tenant) = &form.tenant_id {
            self.resources
                .tenant_config(tenant)
                .await
                .map_err(|_| CoreError::Validation(format!("Unknown tenant: {}", tenant)))?;
        }

        let identity = self.auth.sign_up(&form.email, &form.password).await?;
        let full_name = form
            .full_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let profile = UserProfile::new(identity.id, &identity.email, full_name, form.role, form.tenant_id);

        let created = match &profile.tenant_id {
            Some(tenant) => self.resources.users.insert(tenant, &profile).await?,
            // platform operators have no tenant to scope the write to
            None => {
                let row = serde_json::to_value(&profile)
                    .map_err(|e| CoreError::Serialization(e.to_string()))?;
                parse_row(Table::Users, self.resources.store().insert(Table::Users, row).await?)?
            }
        };
        info!(user_id = %created.id, role = created.role.as_str(), "User signed up");
        Ok(created)
    }

    /// Adds a manager or staff member to `tenant`. Tenant admins only come
    /// from onboarding and master admins are provisioned out of band.
    pub async fn add_member(&self, tenant: &TenantId, mut form: SignUp) -> Result<UserProfile, CoreError> {
        if !matches!(form.role, Role::Manager | Role::Staff) {
            return Err(CoreError::Forbidden(format!(
                "Cannot add a {} through team management",
                form.role.as_str()
            )));
        }
        match &form.tenant_id {
            Some(requested) if requested != tenant => {
                return Err(CoreError::Forbidden(
                    "Users can only be added to your own tenant".into(),
                ));
            }
            _ => form.tenant_id = Some(tenant.clone()),
        }
        self.sign_up(form).await
    }

    async fn profile(&self, user_id: uuid::Uuid) -> Result<Option<UserProfile>, CoreError> {
        let query = SelectQuery::new().eq("id", user_id.to_string()).limit(1);
        self.resources
            .store()
            .select(Table::Users, &query)
            .await?
            .into_iter()
            .next()
            .map(|row| parse_row(Table::Users, row))
            .transpose()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, CoreError> {
        let email = normalize_email(email);
        let identity = self.auth.sign_in(&email, password).await?;
        let profile = self
            .profile(identity.id)
            .await?
            .ok_or_else(|| CoreError::Unauthorized("No profile for this account".into()))?;

        if let Some(tenant) = &profile.tenant_id {
            let config = self.resources.tenant_config(tenant).await?;
            config.ensure_active()?;
        }

        let context = AppContext::for_profile(&profile);
        let token = new_token();
        self.store_context(&token, &context).await?;
        info!(user_id = %context.user_id, "User signed in");
        Ok(Session { token, context })
    }

    pub async fn sign_out(&self, token: &str) -> Result<(), CoreError> {
        self.sessions.delete(&session_key(token)).await
    }

    /// Loads the session context. Sessions of a suspended tenant stop
    /// working immediately, except for master admins.
    pub async fn resolve(&self, token: &str) -> Result<AppContext, CoreError> {
        let context: AppContext = match self.sessions.get(&session_key(token)).await? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                warn!("Discarding unreadable session: {}", e);
                CoreError::Unauthorized("Session is invalid".into())
            })?,
            None => return Err(CoreError::Unauthorized("Session expired or signed out".into())),
        };
        if !context.is_master_admin() {
            if let Some(tenant) = context.tenant() {
                let config = self.resources.tenant_config(tenant).await.map_err(|e| match e {
                    CoreError::NotFound(_) => CoreError::Unauthorized("Tenant no longer exists".into()),
                    other => other,
                })?;
                config.ensure_active()?;
            }
        }
        Ok(context)
    }

    /// Switches a master admin's session onto `tenant`.
    pub async fn impersonate(&self, token: &str, tenant: TenantId) -> Result<AppContext, CoreError> {
        let current = self.resolve(token).await?;
        let next = current.impersonate(tenant.clone())?;
        self.resources.tenant_config(&tenant).await?;
        self.store_context(token, &next).await?;
        info!(user_id = %next.user_id, tenant = %tenant, "Impersonation started");
        Ok(next)
    }

    pub async fn end_impersonation(&self, token: &str) -> Result<AppContext, CoreError> {
        let current = self.resolve(token).await?;
        let next = current.end_impersonation();
        self.store_context(token, &next).await?;
        info!(user_id = %next.user_id, "Impersonation ended");
        Ok(next)
    }

    async fn store_context(&self, token: &str, context: &AppContext) -> Result<(), CoreError> {
        let bytes = serde_json::to_vec(context).map_err(|e| CoreError::Serialization(e.to_string()))?;
        self.sessions
            .set(&session_key(token), &bytes, Some(self.session_ttl.as_secs()))
            .await
    }
}
