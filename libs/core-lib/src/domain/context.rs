use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tenant::TenantId;
use super::user::{Role, UserError, UserProfile};

/// Who is signed in and which tenant the dashboard is rendering.
///
/// Built once at sign-in and stored under the session token. Sign-in,
/// sign-out and impersonation replace it wholesale; nothing mutates a stored
/// context in place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppContext {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub home_tenant: Option<TenantId>,
    pub active_tenant: Option<TenantId>,
}

impl AppContext {
    pub fn for_profile(profile: &UserProfile) -> Self {
        Self {
            user_id: profile.id,
            email: profile.email.clone(),
            role: profile.role,
            home_tenant: profile.tenant_id.clone(),
            active_tenant: profile.tenant_id.clone(),
        }
    }

    pub fn tenant(&self) -> Option<&TenantId> {
        self.active_tenant.as_ref()
    }

    pub fn is_master_admin(&self) -> bool {
        self.role == Role::MasterAdmin
    }

    pub fn is_impersonating(&self) -> bool {
        self.active_tenant.is_some() && self.active_tenant != self.home_tenant
    }

    /// Returns a new context rendering `tenant`. Only master admins may do this.
    pub fn impersonate(&self, tenant: TenantId) -> Result<AppContext, UserError> {
        if !self.is_master_admin() {
            return Err(UserError::NotPermitted(
                "Only master admins can switch tenants".into(),
            ));
        }
        Ok(AppContext {
            active_tenant: Some(tenant),
            ..self.clone()
        })
    }

    /// Returns a new context back on the user's home tenant.
    pub fn end_impersonation(&self) -> AppContext {
        AppContext {
            active_tenant: self.home_tenant.clone(),
            ..self.clone()
        }
    }
}
