//! Page-level operations composed from tenant-scoped resources and webhook calls.

pub mod admin;
pub mod auth;
pub mod dashboard;
pub mod inbox;
pub mod marketing;
pub mod onboarding;
pub mod sales;

use std::sync::Arc;

use crate::domain::inbox::{Conversation, Message};
use crate::domain::marketing::{Campaign, Template};
use crate::domain::sales::{Deal, Lead};
use crate::domain::tenant::{Organization, TenantConfig, TenantId};
use crate::domain::user::UserProfile;
use crate::query_cache::QueryCache;
use crate::resource::{Resource, TenantScoped};
use crate::{CoreError, EventPublisher, TableStore};

fn scoped<R: Resource>(
    store: &Arc<dyn TableStore>,
    cache: &QueryCache,
    publisher: &Arc<dyn EventPublisher>,
) -> TenantScoped<R> {
    TenantScoped::new(store.clone(), cache.clone(), publisher.clone())
}

/// One tenant-scoped handle per backend table the dashboard touches.
#[derive(Clone)]
pub struct Resources {
    store: Arc<dyn TableStore>,
    cache: QueryCache,
    pub tenants: TenantScoped<TenantConfig>,
    pub organizations: TenantScoped<Organization>,
    pub users: TenantScoped<UserProfile>,
    pub conversations: TenantScoped<Conversation>,
    pub messages: TenantScoped<Message>,
    pub leads: TenantScoped<Lead>,
    pub deals: TenantScoped<Deal>,
    pub campaigns: TenantScoped<Campaign>,
    pub templates: TenantScoped<Template>,
}

impl Resources {
    pub fn new(store: Arc<dyn TableStore>, cache: QueryCache, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            tenants: scoped(&store, &cache, &publisher),
            organizations: scoped(&store, &cache, &publisher),
            users: scoped(&store, &cache, &publisher),
            conversations: scoped(&store, &cache, &publisher),
            messages: scoped(&store, &cache, &publisher),
            leads: scoped(&store, &cache, &publisher),
            deals: scoped(&store, &cache, &publisher),
            campaigns: scoped(&store, &cache, &publisher),
            templates: scoped(&store, &cache, &publisher),
            store,
            cache,
        }
    }

    /// Unscoped table access. Only explicit cross-tenant operations use this.
    pub(crate) fn store(&self) -> &Arc<dyn TableStore> {
        &self.store
    }

    pub fn query_cache(&self) -> &QueryCache {
        &self.cache
    }

    pub async fn tenant_config(&self, tenant: &TenantId) -> Result<TenantConfig, CoreError> {
        self.tenants
            .oldest(tenant)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Tenant {} not found", tenant)))
    }
}
