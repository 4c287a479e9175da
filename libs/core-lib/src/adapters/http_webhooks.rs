use crate::webhook::{WebhookEndpoint, WebhookReply};
use crate::{CoreError, WebhookInvoker};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Calls the automation endpoints over HTTP: `POST {base_url}/{endpoint}`.
#[derive(Clone, Debug)]
pub struct HttpWebhooks {
    base_url: String,
    client: Client,
}

impl HttpWebhooks {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn url(&self, endpoint: WebhookEndpoint) -> String {
        format!("{}/{}", self.base_url, endpoint.path())
    }
}

#[async_trait]
impl WebhookInvoker for HttpWebhooks {
    async fn invoke(&self, endpoint: WebhookEndpoint, payload: &Value) -> Result<WebhookReply, CoreError> {
        let url = self.url(endpoint);
        debug!(%url, "POST webhook");
        let failure = |message: String| CoreError::Webhook {
            endpoint: endpoint.to_string(),
            message,
        };

        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| failure(e.to_string()))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| failure(e.to_string()))?;
        if !status.is_success() {
            warn!(%url, %status, "Webhook responded with an error status");
            return Err(failure(format!("HTTP {}: {}", status, body)));
        }
        Ok(WebhookReply::from_body(&body))
    }
}

/// Stand-in when no webhook base URL is configured. Every call fails.
#[derive(Clone, Debug, Default)]
pub struct UnconfiguredWebhooks;

#[async_trait]
impl WebhookInvoker for UnconfiguredWebhooks {
    async fn invoke(&self, endpoint: WebhookEndpoint, _payload: &Value) -> Result<WebhookReply, CoreError> {
        Err(CoreError::Configuration(format!(
            "Automation endpoint '{}' is not configured (set WEBHOOK_BASE_URL)",
            endpoint
        )))
    }
}
