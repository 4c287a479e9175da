use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::inbox::Channel;
use super::tenant::TenantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    #[default]
    Draft,
    Scheduled,
    Active,
    Paused,
    Completed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Scheduled => "scheduled",
            CampaignStatus::Active => "active",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub name: String,
    pub channel: Channel,
    #[serde(default)]
    pub status: CampaignStatus,
    #[serde(default)]
    pub message_template: String,
    pub subject: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sent: i64,
    #[serde(default)]
    pub delivered: i64,
    #[serde(default)]
    pub opened: i64,
    #[serde(default)]
    pub clicked: i64,
    #[serde(default)]
    pub converted: i64,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    /// Opened / delivered, as a percentage.
    pub fn open_rate(&self) -> f64 {
        if self.delivered == 0 {
            return 0.0;
        }
        self.opened as f64 * 100.0 / self.delivered as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub name: String,
    pub channel: Channel,
    pub subject: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CampaignFilter {
    pub channel: Option<Channel>,
    pub status: Option<CampaignStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    #[default]
    Immediate,
    Scheduled,
}

/// Brief sent to the template generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateBrief {
    pub name: String,
    pub purpose: String,
    pub tone: Option<String>,
    pub audience: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn campaign_counters_default_to_zero() {
        let row = serde_json::json!({
            "id": "c0a80101-0000-4000-8000-000000000001",
            "tenant_id": "acme",
            "name": "Spring sale",
            "channel": "email",
            "subject": null,
            "scheduled_at": null,
            "created_at": "2026-04-01T00:00:00Z"
        });
        let campaign: Campaign = serde_json::from_value(row).unwrap();
        assert_eq!(campaign.status, CampaignStatus::Draft);
        assert_eq!(campaign.sent, 0);
        assert_eq!(campaign.open_rate(), 0.0);
    }
}
