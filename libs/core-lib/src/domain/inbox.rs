use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tenant::TenantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Whatsapp,
    Email,
    Instagram,
    Facebook,
    Sms,
    Voice,
    Web,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Whatsapp => "whatsapp",
            Channel::Email => "email",
            Channel::Instagram => "instagram",
            Channel::Facebook => "facebook",
            Channel::Sms => "sms",
            Channel::Voice => "voice",
            Channel::Web => "web",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    #[default]
    Active,
    Pending,
    Resolved,
    Escalated,
}

impl ConversationStatus {
    pub const ALL: [ConversationStatus; 4] = [
        ConversationStatus::Active,
        ConversationStatus::Pending,
        ConversationStatus::Resolved,
        ConversationStatus::Escalated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Active => "active",
            ConversationStatus::Pending => "pending",
            ConversationStatus::Resolved => "resolved",
            ConversationStatus::Escalated => "escalated",
        }
    }
}

/// Who is currently answering a conversation or working a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HandlerType {
    #[default]
    Ai,
    Staff,
    Manager,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub channel: Channel,
    #[serde(default)]
    pub status: ConversationStatus,
    #[serde(default)]
    pub handler_type: HandlerType,
    pub contact_name: Option<String>,
    pub last_message: Option<String>,
    #[serde(default)]
    pub unread_count: i64,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderType {
    Customer,
    Ai,
    Staff,
    Manager,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub conversation_id: Uuid,
    pub direction: Direction,
    pub content: String,
    pub sender_type: SenderType,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Reply typed by a staff member in the inbox.
    pub fn staff_reply(tenant_id: TenantId, conversation_id: Uuid, content: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            conversation_id,
            direction: Direction::Outbound,
            content: content.trim().to_string(),
            sender_type: SenderType::Staff,
            created_at: Utc::now(),
        }
    }
}

/// Inbox list filters. Empty fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConversationFilter {
    pub channel: Option<Channel>,
    pub status: Option<ConversationStatus>,
    pub search: Option<String>,
}
