use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::domain::tenant::{is_hex_color, validate_pipeline_stages, ChannelFlags, ModuleFlags, TenantConfig, TenantId, TenantStatus};
use crate::resource::parse_row;
use crate::services::Resources;
use crate::store::{SelectQuery, Table};
use crate::CoreError;

/// Partial update of a tenant's settings page. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    pub company_name: Option<String>,
    pub brand_color: Option<String>,
    pub channels: Option<ChannelFlags>,
    pub modules: Option<ModuleFlags>,
    pub pipeline_stages: Option<Vec<String>>,
}

impl SettingsPatch {
    fn into_json(self) -> Result<Value, CoreError> {
        let mut patch = Map::new();
        if let Some(name) = self.company_name {
            let name = name.trim();
            if name.is_empty() {
                return Err(CoreError::Validation("Company name cannot be empty".into()));
            }
            patch.insert("company_name".into(), Value::String(name.to_string()));
        }
        if let Some(color) = self.brand_color {
            let color = color.trim();
            if !is_hex_color(color) {
                return Err(CoreError::Validation(format!(
                    "Brand color must be a hex color: {}",
                    color
                )));
            }
            patch.insert("brand_color".into(), Value::String(color.to_string()));
        }
        if let Some(channels) = self.channels {
            patch.insert("channels".into(), serde_json::to_value(channels)?);
        }
        if let Some(modules) = self.modules {
            patch.insert("modules".into(), serde_json::to_value(modules)?);
        }
        if let Some(stages) = self.pipeline_stages {
            let stages: Vec<String> = stages.into_iter().map(|s| s.trim().to_string()).collect();
            validate_pipeline_stages(&stages)?;
            patch.insert("pipeline_stages".into(), serde_json::to_value(stages)?);
        }
        Ok(Value::Object(patch))
    }
}

/// Platform administration. Callers check the master-admin role first.
#[derive(Clone)]
pub struct AdminService {
    resources: Resources,
}

impl AdminService {
    pub fn new(resources: Resources) -> Self {
        Self { resources }
    }

    /// Every tenant on the platform, newest first. Read live, never cached.
    pub async fn list_tenants(&self) -> Result<Vec<TenantConfig>, CoreError> {
        let query = SelectQuery::new().order_desc("created_at");
        self.resources
            .store()
            .select(Table::TenantConfig, &query)
            .await?
            .into_iter()
            .map(|row| parse_row(Table::TenantConfig, row))
            .collect()
    }

    pub async fn suspend_tenant(&self, tenant: &TenantId) -> Result<TenantConfig, CoreError> {
        let config = self.resources.tenant_config(tenant).await?;
        if config.is_suspended() {
            return Ok(config);
        }
        let suspended = self
            .resources
            .tenants
            .update(tenant, config.id, serde_json::json!({"status": TenantStatus::Suspended}))
            .await?;
        info!(tenant = %tenant, "Tenant suspended");
        Ok(suspended)
    }

    pub async fn update_settings(&self, tenant: &TenantId, patch: SettingsPatch) -> Result<TenantConfig, CoreError> {
        let config = self.resources.tenant_config(tenant).await?;
        let patch = patch.into_json()?;
        self.resources.tenants.update(tenant, config.id, patch).await
    }
}
