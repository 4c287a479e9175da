use core_lib::domain::context::AppContext;
use core_lib::domain::tenant::TenantId;

use super::ApplicationError;

pub fn require_master_admin(ctx: &AppContext) -> Result<(), ApplicationError> {
    if ctx.is_master_admin() {
        Ok(())
    } else {
        Err(ApplicationError::Forbidden("Master admin access required".into()))
    }
}

/// Settings and team management: tenant admins, and master admins.
pub fn require_tenant_admin(ctx: &AppContext) -> Result<(), ApplicationError> {
    if ctx.role.can_administer_tenant() {
        Ok(())
    } else {
        Err(ApplicationError::Forbidden("Tenant admin access required".into()))
    }
}

/// The tenant a write applies to. Reads take `ctx.tenant()` directly and
/// return nothing when it is absent.
pub fn require_tenant(ctx: &AppContext) -> Result<&TenantId, ApplicationError> {
    ctx.tenant()
        .ok_or_else(|| ApplicationError::Validation("No tenant selected".into()))
}
