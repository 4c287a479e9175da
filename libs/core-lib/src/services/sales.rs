use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::sales::{validate_stage_move, Deal, Lead, LeadFilter, LeadSource, NewDeal, SequenceAction};
use crate::domain::tenant::TenantId;
use crate::services::Resources;
use crate::webhook::{dispatch, WebhookEndpoint};
use crate::{CoreError, WebhookInvoker};

#[derive(Clone)]
pub struct SalesService {
    resources: Resources,
    webhooks: Arc<dyn WebhookInvoker>,
}

impl SalesService {
    pub fn new(resources: Resources, webhooks: Arc<dyn WebhookInvoker>) -> Self {
        Self { resources, webhooks }
    }

    pub async fn list_leads(&self, tenant: Option<&TenantId>, filter: &LeadFilter) -> Result<Vec<Lead>, CoreError> {
        self.resources.leads.list(tenant, filter).await
    }

    pub async fn list_deals(&self, tenant: Option<&TenantId>) -> Result<Vec<Deal>, CoreError> {
        self.resources.deals.list(tenant, &()).await
    }

    pub async fn create_deal(&self, tenant: &TenantId, draft: NewDeal) -> Result<Deal, CoreError> {
        let config = self.resources.tenant_config(tenant).await?;
        let deal = draft.into_deal(&config)?;
        self.resources.deals.insert(tenant, &deal).await
    }

    /// Moves one deal to `target`, then notifies the deal-update automation.
    pub async fn move_deal_stage(&self, tenant: &TenantId, deal_id: Uuid, target: &str) -> Result<Deal, CoreError> {
        let config = self.resources.tenant_config(tenant).await?;
        let deal = self.resources.deals.get(tenant, deal_id).await?;
        validate_stage_move(&config, &deal, target)?;

        let moved = self
            .resources
            .deals
            .update(tenant, deal_id, json!({"stage": target, "updated_at": Utc::now()}))
            .await?;

        let notification = json!({
            "deal_id": moved.id,
            "title": moved.title,
            "value": moved.value,
            "from_stage": deal.stage,
            "to_stage": moved.stage,
        });
        if let Err(e) = dispatch(self.webhooks.as_ref(), WebhookEndpoint::DealUpdate, tenant, notification).await {
            warn!(tenant = %tenant, deal = %deal_id, "Deal update notification failed: {}", e);
        }
        Ok(moved)
    }

    pub async fn control_sequence(&self, tenant: &TenantId, lead_id: Uuid, action: SequenceAction) -> Result<Lead, CoreError> {
        let lead = self.resources.leads.get(tenant, lead_id).await?;
        dispatch(
            self.webhooks.as_ref(),
            WebhookEndpoint::LeadSequence,
            tenant,
            json!({"lead_id": lead.id, "action": action.as_str()}),
        )
        .await?;
        self.resources
            .leads
            .update(tenant, lead.id, json!({"sequence_status": action.resulting_status()}))
            .await
    }

    /// Runs a lead-generation automation and returns whatever it produced.
    pub async fn generate_leads(&self, tenant: &TenantId, source: LeadSource, criteria: Value) -> Result<Value, CoreError> {
        let endpoint = match source {
            LeadSource::B2b => WebhookEndpoint::LeadGenerationB2b,
            LeadSource::B2c => WebhookEndpoint::LeadGenerationB2c,
        };
        let reply = dispatch(self.webhooks.as_ref(), endpoint, tenant, criteria).await?;
        info!(tenant = %tenant, %endpoint, "Lead generation requested");
        Ok(reply.data.unwrap_or(Value::Null))
    }
}
