use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::inbox::Channel;
use crate::domain::marketing::{Campaign, CampaignFilter, CampaignStatus, Template, TemplateBrief};
use crate::domain::tenant::TenantId;
use crate::domain::user::validate_email;
use crate::domain::wizard::CampaignSubmission;
use crate::services::Resources;
use crate::webhook::{dispatch, WebhookEndpoint};
use crate::{CoreError, WebhookInvoker};

#[derive(Clone)]
pub struct MarketingService {
    resources: Resources,
    webhooks: Arc<dyn WebhookInvoker>,
}

fn text_field<'a>(data: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| data.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

impl MarketingService {
    pub fn new(resources: Resources, webhooks: Arc<dyn WebhookInvoker>) -> Self {
        Self { resources, webhooks }
    }

    pub async fn list_campaigns(&self, tenant: Option<&TenantId>, filter: &CampaignFilter) -> Result<Vec<Campaign>, CoreError> {
        self.resources.campaigns.list(tenant, filter).await
    }

    pub async fn list_templates(&self, tenant: Option<&TenantId>) -> Result<Vec<Template>, CoreError> {
        self.resources.templates.list(tenant, &()).await
    }

    pub async fn create_campaign(&self, tenant: &TenantId, submission: CampaignSubmission) -> Result<Campaign, CoreError> {
        let campaign = Campaign {
            id: Uuid::new_v4(),
            tenant_id: tenant.clone(),
            name: submission.name,
            channel: submission.channel,
            status: submission.status,
            message_template: submission.message_template,
            subject: submission.subject,
            scheduled_at: submission.scheduled_at,
            sent: 0,
            delivered: 0,
            opened: 0,
            clicked: 0,
            converted: 0,
            created_at: Utc::now(),
        };
        self.resources.campaigns.insert(tenant, &campaign).await
    }

    /// Hands the campaign to the send automation and marks it active.
    pub async fn send_campaign(&self, tenant: &TenantId, id: Uuid) -> Result<Campaign, CoreError> {
        let campaign = self.resources.campaigns.get(tenant, id).await?;
        if campaign.status == CampaignStatus::Completed {
            return Err(CoreError::Validation(format!(
                "Campaign '{}' has already completed",
                campaign.name
            )));
        }
        dispatch(
            self.webhooks.as_ref(),
            WebhookEndpoint::CampaignSend,
            tenant,
            json!({
                "campaign_id": campaign.id,
                "name": campaign.name,
                "channel": campaign.channel,
                "subject": campaign.subject,
                "message_template": campaign.message_template,
            }),
        )
        .await?;
        self.set_campaign_status(tenant, id, CampaignStatus::Active).await
    }

    pub async fn set_campaign_status(&self, tenant: &TenantId, id: Uuid, status: CampaignStatus) -> Result<Campaign, CoreError> {
        self.resources
            .campaigns
            .update(tenant, id, json!({"status": status}))
            .await
    }

    /// Asks the generator for an email and stores the result as a template.
    pub async fn generate_template(&self, tenant: &TenantId, brief: TemplateBrief) -> Result<Template, CoreError> {
        if brief.name.trim().is_empty() || brief.purpose.trim().is_empty() {
            return Err(CoreError::Validation("Template name and purpose are required".into()));
        }
        let payload = serde_json::to_value(&brief).map_err(|e| CoreError::Serialization(e.to_string()))?;
        let reply = dispatch(
            self.webhooks.as_ref(),
            WebhookEndpoint::GenerateEmailTemplate,
            tenant,
            payload,
        )
        .await?;

        let data = reply.data.unwrap_or(Value::Null);
        let content = match &data {
            Value::String(text) => Some(text.trim()).filter(|t| !t.is_empty()),
            other => text_field(other, &["content", "body"]),
        }
        .ok_or_else(|| CoreError::Webhook {
            endpoint: WebhookEndpoint::GenerateEmailTemplate.to_string(),
            message: "reply carried no template content".into(),
        })?;

        let template = Template {
            id: Uuid::new_v4(),
            tenant_id: tenant.clone(),
            name: brief.name.trim().to_string(),
            channel: Channel::Email,
            subject: text_field(&data, &["subject"]).map(str::to_string),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.resources.templates.insert(tenant, &template).await
    }

    pub async fn send_test_email(&self, tenant: &TenantId, template_id: Uuid, to: &str) -> Result<(), CoreError> {
        validate_email(to)?;
        let template = self.resources.templates.get(tenant, template_id).await?;
        dispatch(
            self.webhooks.as_ref(),
            WebhookEndpoint::SendTestEmail,
            tenant,
            json!({
                "template_id": template.id,
                "to": to.trim(),
                "subject": template.subject,
                "content": template.content,
            }),
        )
        .await?;
        info!(tenant = %tenant, template = %template.id, "Test email sent");
        Ok(())
    }
}
