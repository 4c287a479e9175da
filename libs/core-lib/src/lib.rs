use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde_json::Value;
use std::error::Error as StdError;

// Declare modules
pub mod adapters;
pub mod domain;
pub mod query_cache;
pub mod realtime;
pub mod resource;
pub mod services;
pub mod store;
pub mod webhook;

use store::{Filter, SelectQuery, Table};
use webhook::{WebhookEndpoint, WebhookReply};

// Common error type for the core library
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Deserialization error: {0}")]
    Deserialization(String),
    #[error("Backend responded with {status}: {message}")]
    Backend { status: u16, message: String },
    #[error("Webhook '{endpoint}' failed: {message}")]
    Webhook { endpoint: String, message: String },
    #[error("Infrastructure error: {0}")]
    Infrastructure(#[from] Box<dyn StdError + Send + Sync>),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Wraps any infrastructure failure (driver, transport) into `Infrastructure`.
    pub fn infra<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        CoreError::Infrastructure(Box::new(err))
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Deserialization(err.to_string())
    }
}

impl From<domain::tenant::TenantError> for CoreError {
    fn from(err: domain::tenant::TenantError) -> Self {
        match err {
            domain::tenant::TenantError::Core(ce) => ce,
            domain::tenant::TenantError::AlreadyExists(id) => CoreError::AlreadyExists(id),
            domain::tenant::TenantError::InvalidInput(msg) => CoreError::Validation(msg),
            domain::tenant::TenantError::Suspended(id) => {
                CoreError::Forbidden(format!("Tenant {} is suspended", id))
            }
        }
    }
}

impl From<domain::user::UserError> for CoreError {
    fn from(err: domain::user::UserError) -> Self {
        match err {
            domain::user::UserError::Core(ce) => ce,
            domain::user::UserError::AlreadyExists(email) => {
                CoreError::AlreadyExists(format!("User already exists: {}", email))
            }
            domain::user::UserError::InvalidInput(msg) => CoreError::Validation(msg),
            domain::user::UserError::WeakPassword(msg) => CoreError::Validation(msg),
            domain::user::UserError::PasswordMismatch => {
                CoreError::Validation("Passwords do not match".into())
            }
            domain::user::UserError::InvalidCredentials => {
                CoreError::Unauthorized("Invalid email or password".into())
            }
            domain::user::UserError::NotPermitted(msg) => CoreError::Forbidden(msg),
        }
    }
}

impl From<domain::wizard::WizardError> for CoreError {
    fn from(err: domain::wizard::WizardError) -> Self {
        CoreError::Validation(err.to_string())
    }
}

// Port for caching data
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError>;
    async fn set(&self, key: &str, value: &[u8], ttl_seconds: Option<u64>)
        -> Result<(), CoreError>;
    async fn delete(&self, key: &str) -> Result<(), CoreError>;
}

// Port for publishing events to a message bus
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        event_type: &str,
        event_payload: &[u8],
    ) -> Result<(), CoreError>;
}

/// A message delivered to a bus subscriber.
#[derive(Clone, Debug)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

pub type BusStream = BoxStream<'static, BusMessage>;

// Port for subscribing to events from a message bus.
// Topics ending in `*` match every topic with that prefix.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    async fn subscribe(&self, topics: &[String]) -> Result<BusStream, CoreError>;
}

/// Returns true when `topic` is matched by `pattern` (exact or `prefix*`).
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => topic.starts_with(prefix),
        None => pattern == topic,
    }
}

// Port for the hosted backend's relational tables.
// Rows travel as JSON objects; typed parsing happens in the resource layer.
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn select(&self, table: Table, query: &SelectQuery) -> Result<Vec<Value>, CoreError>;
    async fn insert(&self, table: Table, row: Value) -> Result<Value, CoreError>;
    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, CoreError>;
}

/// Identity returned by the hosted auth API.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AuthIdentity {
    pub id: uuid::Uuid,
    pub email: String,
}

// Port for the hosted backend's authentication API
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthIdentity, CoreError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthIdentity, CoreError>;
}

// Port for the external automation webhooks
#[async_trait]
pub trait WebhookInvoker: Send + Sync {
    async fn invoke(
        &self,
        endpoint: WebhookEndpoint,
        payload: &Value,
    ) -> Result<WebhookReply, CoreError>;
}
