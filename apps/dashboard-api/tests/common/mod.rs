#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum_test::TestServer;
use chrono::Utc;
use core_lib::adapters::{InMemoryCache, InMemoryEventBus, InMemoryStore, StoreAuth};
use core_lib::domain::inbox::{Channel, Conversation, ConversationStatus, HandlerType};
use core_lib::domain::tenant::{Industry, Plan, TenantConfig, TenantId};
use core_lib::domain::user::{Role, SignUp};
use core_lib::webhook::{WebhookEndpoint, WebhookReply};
use core_lib::{CoreError, WebhookInvoker};
use dashboard_api::{create_app, AppState, Ports};
use serde_json::{json, Value};
use uuid::Uuid;

pub const PASSWORD: &str = "s3cret-pass";

/// Records every automation call and answers with a fixed reply.
#[derive(Default)]
pub struct RecordingWebhooks {
    calls: Mutex<Vec<(WebhookEndpoint, Value)>>,
    reply: Option<Value>,
    fail: bool,
}

impl RecordingWebhooks {
    pub fn replying(data: Value) -> Self {
        Self {
            reply: Some(data),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(WebhookEndpoint, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn endpoints(&self) -> Vec<WebhookEndpoint> {
        self.calls().into_iter().map(|(endpoint, _)| endpoint).collect()
    }
}

#[async_trait]
impl WebhookInvoker for RecordingWebhooks {
    async fn invoke(&self, endpoint: WebhookEndpoint, payload: &Value) -> Result<WebhookReply, CoreError> {
        self.calls.lock().unwrap().push((endpoint, payload.clone()));
        if self.fail {
            return Err(CoreError::Webhook {
                endpoint: endpoint.to_string(),
                message: "automation offline".into(),
            });
        }
        Ok(WebhookReply::ok(self.reply.clone().unwrap_or_else(|| json!({}))))
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub bus: Arc<InMemoryEventBus>,
    pub webhooks: Arc<RecordingWebhooks>,
}

pub fn state_with(webhooks: Arc<RecordingWebhooks>) -> (AppState, Arc<InMemoryStore>, Arc<InMemoryEventBus>) {
    let store = Arc::new(InMemoryStore::new());
    let bus = Arc::new(InMemoryEventBus::default());
    let ports = Ports {
        store: store.clone(),
        auth: Arc::new(StoreAuth::new(store.clone())),
        cache: Arc::new(InMemoryCache::default()),
        publisher: bus.clone(),
        subscriber: bus.clone(),
        webhooks,
    };
    let state = AppState::new(ports, Duration::from_secs(30), Duration::from_secs(3600));
    (state, store, bus)
}

pub fn setup_with(webhooks: RecordingWebhooks) -> TestApp {
    let webhooks = Arc::new(webhooks);
    let (state, store, bus) = state_with(webhooks.clone());
    let server = TestServer::new(create_app(state.clone())).expect("Failed to create TestServer");
    TestApp {
        server,
        state,
        store,
        bus,
        webhooks,
    }
}

pub fn setup() -> TestApp {
    setup_with(RecordingWebhooks::default())
}

pub fn tenant(id: &str) -> TenantId {
    TenantId::parse(id).unwrap()
}

impl TestApp {
    pub async fn seed_tenant(&self, id: &str) -> TenantConfig {
        let tid = tenant(id);
        let config = TenantConfig::new(tid.clone(), &format!("{} Ltd", id), Industry::Retail, Plan::Professional);
        self.state.resources.tenants.insert(&tid, &config).await.unwrap()
    }

    pub async fn seed_tenant_config(&self, config: TenantConfig) -> TenantConfig {
        let tid = config.tenant_id.clone();
        self.state.resources.tenants.insert(&tid, &config).await.unwrap()
    }

    pub async fn seed_user(&self, email: &str, role: Role, tenant_id: Option<&str>) {
        self.state
            .auth
            .sign_up(SignUp {
                email: email.into(),
                password: PASSWORD.into(),
                confirm_password: PASSWORD.into(),
                full_name: Some("Test User".into()),
                tenant_id: tenant_id.map(tenant),
                role,
            })
            .await
            .unwrap();
    }

    /// Signs in over HTTP and returns the bearer token.
    pub async fn sign_in(&self, email: &str) -> String {
        let response = self
            .server
            .post("/api/auth/sign-in")
            .json(&json!({"email": email, "password": PASSWORD}))
            .await;
        response.assert_status_ok();
        response.json::<Value>()["token"].as_str().unwrap().to_string()
    }

    /// Seeds a tenant with a staff member and returns their token.
    pub async fn staff_session(&self, tenant_id: &str) -> String {
        self.seed_tenant(tenant_id).await;
        let email = format!("staff@{}.test", tenant_id);
        self.seed_user(&email, Role::Staff, Some(tenant_id)).await;
        self.sign_in(&email).await
    }

    pub async fn master_admin_session(&self) -> String {
        self.seed_user("root@platform.test", Role::MasterAdmin, None).await;
        self.sign_in("root@platform.test").await
    }

    pub async fn seed_conversation(&self, tenant_id: &str, contact: &str, unread: i64) -> Conversation {
        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            tenant_id: tenant(tenant_id),
            channel: Channel::Whatsapp,
            status: ConversationStatus::Active,
            handler_type: HandlerType::Ai,
            contact_name: Some(contact.into()),
            last_message: Some("Hello?".into()),
            unread_count: unread,
            updated_at: now,
            created_at: now,
        };
        self.state
            .resources
            .conversations
            .insert(&tenant(tenant_id), &conversation)
            .await
            .unwrap()
    }
}
