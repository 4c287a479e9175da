use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::marketing::{CampaignFilter, CampaignStatus};
use crate::domain::inbox::ConversationFilter;
use crate::domain::sales::LeadFilter;
use crate::domain::tenant::{Module, TenantId};
use crate::services::Resources;
use crate::CoreError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Usage {
    pub messages_used: i64,
    pub messages_limit: i64,
    pub calls_used: i64,
    pub calls_limit: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub company_name: String,
    pub customer_term: &'static str,
    pub conversations_by_status: BTreeMap<&'static str, usize>,
    pub unread_total: i64,
    pub leads_by_sequence_status: BTreeMap<&'static str, usize>,
    pub open_deals: usize,
    pub open_pipeline_value: f64,
    pub active_campaigns: usize,
    pub usage: Usage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HrDashboard {
    pub headcount: usize,
    pub by_role: BTreeMap<&'static str, usize>,
}

#[derive(Clone)]
pub struct DashboardService {
    resources: Resources,
}

impl DashboardService {
    pub fn new(resources: Resources) -> Self {
        Self { resources }
    }

    pub async fn summary(&self, tenant: &TenantId) -> Result<DashboardSummary, CoreError> {
        let config = self.resources.tenant_config(tenant).await?;
        let conversations = self
            .resources
            .conversations
            .list(Some(tenant), &ConversationFilter::default())
            .await?;
        let leads = self.resources.leads.list(Some(tenant), &LeadFilter::default()).await?;
        let deals = self.resources.deals.list(Some(tenant), &()).await?;
        let active = CampaignFilter {
            status: Some(CampaignStatus::Active),
            ..Default::default()
        };
        let active_campaigns = self.resources.campaigns.list(Some(tenant), &active).await?.len();

        let mut conversations_by_status = BTreeMap::new();
        for conversation in &conversations {
            *conversations_by_status.entry(conversation.status.as_str()).or_insert(0) += 1;
        }
        let mut leads_by_sequence_status = BTreeMap::new();
        for lead in &leads {
            *leads_by_sequence_status.entry(lead.sequence_status.as_str()).or_insert(0) += 1;
        }
        let open: Vec<_> = deals.iter().filter(|d| !d.is_closed()).collect();

        Ok(DashboardSummary {
            customer_term: config.industry.customer_term(),
            conversations_by_status,
            unread_total: conversations.iter().map(|c| c.unread_count).sum(),
            leads_by_sequence_status,
            open_deals: open.len(),
            open_pipeline_value: open.iter().map(|d| d.value).sum(),
            active_campaigns,
            usage: Usage {
                messages_used: config.messages_used,
                messages_limit: config.messages_limit,
                calls_used: config.calls_used,
                calls_limit: config.calls_limit,
            },
            company_name: config.company_name,
        })
    }

    /// Headcount from the tenant's user profiles. Requires the `hr` module.
    pub async fn hr_dashboard(&self, tenant: &TenantId) -> Result<HrDashboard, CoreError> {
        let config = self.resources.tenant_config(tenant).await?;
        if !config.modules.is_enabled(Module::Hr) {
            return Err(CoreError::Forbidden("The HR module is not enabled for this tenant".into()));
        }
        let users = self.resources.users.list(Some(tenant), &()).await?;
        let mut by_role = BTreeMap::new();
        for user in &users {
            *by_role.entry(user.role.as_str()).or_insert(0) += 1;
        }
        Ok(HrDashboard {
            headcount: users.len(),
            by_role,
        })
    }
}
