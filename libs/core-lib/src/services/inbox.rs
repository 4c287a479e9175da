use chrono::Utc;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::domain::inbox::{Conversation, ConversationFilter, ConversationStatus, Message};
use crate::domain::tenant::TenantId;
use crate::services::Resources;
use crate::store::Filter;
use crate::CoreError;

#[derive(Clone)]
pub struct InboxService {
    resources: Resources,
}

impl InboxService {
    pub fn new(resources: Resources) -> Self {
        Self { resources }
    }

    pub async fn list_conversations(
        &self,
        tenant: Option<&TenantId>,
        filter: &ConversationFilter,
    ) -> Result<Vec<Conversation>, CoreError> {
        self.resources.conversations.list(tenant, filter).await
    }

    pub async fn list_messages(&self, tenant: Option<&TenantId>, conversation_id: Uuid) -> Result<Vec<Message>, CoreError> {
        let filter = vec![Filter::eq("conversation_id", conversation_id.to_string())];
        self.resources.messages.list(tenant, &filter).await
    }

    /// Posts a staff reply. The conversation preview is refreshed afterwards;
    /// a failed refresh is logged and the message stays sent.
    pub async fn send_message(&self, tenant: &TenantId, conversation_id: Uuid, content: &str) -> Result<Message, CoreError> {
        if content.trim().is_empty() {
            return Err(CoreError::Validation("Message cannot be empty".into()));
        }
        let conversation = self.resources.conversations.get(tenant, conversation_id).await?;
        let message = self
            .resources
            .messages
            .insert(tenant, &Message::staff_reply(tenant.clone(), conversation.id, content))
            .await?;

        let preview = json!({
            "last_message": message.content,
            "updated_at": message.created_at,
        });
        if let Err(e) = self.resources.conversations.update(tenant, conversation.id, preview).await {
            warn!(tenant = %tenant, conversation = %conversation.id, "Failed to refresh conversation preview: {}", e);
        }
        Ok(message)
    }

    pub async fn set_status(&self, tenant: &TenantId, id: Uuid, status: ConversationStatus) -> Result<Conversation, CoreError> {
        self.resources
            .conversations
            .update(tenant, id, json!({"status": status, "updated_at": Utc::now()}))
            .await
    }

    pub async fn mark_read(&self, tenant: &TenantId, id: Uuid) -> Result<Conversation, CoreError> {
        let conversation = self.resources.conversations.get(tenant, id).await?;
        if conversation.unread_count == 0 {
            return Ok(conversation);
        }
        self.resources
            .conversations
            .update(tenant, id, json!({"unread_count": 0}))
            .await
    }
}
