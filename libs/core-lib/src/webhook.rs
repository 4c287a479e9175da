//! External automation endpoints ("AI" features) and the dispatch helper.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::{info, warn};

use crate::domain::tenant::TenantId;
use crate::{CoreError, WebhookInvoker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WebhookEndpoint {
    LeadGenerationB2b,
    LeadGenerationB2c,
    DealUpdate,
    LeadSequence,
    CampaignSend,
    GenerateEmailTemplate,
    SendTestEmail,
}

impl WebhookEndpoint {
    pub const ALL: [WebhookEndpoint; 7] = [
        WebhookEndpoint::LeadGenerationB2b,
        WebhookEndpoint::LeadGenerationB2c,
        WebhookEndpoint::DealUpdate,
        WebhookEndpoint::LeadSequence,
        WebhookEndpoint::CampaignSend,
        WebhookEndpoint::GenerateEmailTemplate,
        WebhookEndpoint::SendTestEmail,
    ];

    /// Path segment appended to the configured base URL.
    pub fn path(&self) -> &'static str {
        match self {
            WebhookEndpoint::LeadGenerationB2b => "lead-generation-b2b",
            WebhookEndpoint::LeadGenerationB2c => "lead-generation-b2c",
            WebhookEndpoint::DealUpdate => "deal-update",
            WebhookEndpoint::LeadSequence => "lead-sequence",
            WebhookEndpoint::CampaignSend => "campaign-send",
            WebhookEndpoint::GenerateEmailTemplate => "generate-email-template",
            WebhookEndpoint::SendTestEmail => "send-test-email",
        }
    }
}

impl fmt::Display for WebhookEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Response body shared by every automation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookReply {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

fn default_success() -> bool {
    true
}

impl WebhookReply {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    /// Parses a 2xx body. Non-JSON bodies count as success carrying the raw text.
    pub fn from_body(body: &str) -> Self {
        let value = match serde_json::from_str::<Value>(body) {
            Ok(value) => value,
            Err(_) => return Self::ok(Value::String(body.to_string())),
        };
        if value.get("success").is_some() {
            if let Ok(reply) = serde_json::from_value::<WebhookReply>(value.clone()) {
                return reply;
            }
        }
        Self::ok(value)
    }
}

/// Calls `endpoint` with `payload` stamped with the tenant.
///
/// Non-object payloads are wrapped as `{"data": payload}`. A reply with
/// `success: false` becomes a `Webhook` error.
pub async fn dispatch(
    invoker: &dyn WebhookInvoker,
    endpoint: WebhookEndpoint,
    tenant: &TenantId,
    payload: Value,
) -> Result<WebhookReply, CoreError> {
    let mut body = match payload {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
    };
    body.insert("tenant_id".to_string(), Value::String(tenant.to_string()));
    let body = Value::Object(body);

    let reply = invoker.invoke(endpoint, &body).await?;
    if !reply.success {
        let message = reply
            .message
            .clone()
            .unwrap_or_else(|| "automation reported failure".to_string());
        warn!(tenant = %tenant, endpoint = %endpoint, "Webhook returned failure: {}", message);
        return Err(CoreError::Webhook {
            endpoint: endpoint.to_string(),
            message,
        });
    }
    info!(tenant = %tenant, endpoint = %endpoint, "Webhook call succeeded");
    Ok(reply)
}
