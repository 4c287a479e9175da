//! Realtime change notifications: topic naming, decoding and subscriptions
//! that keep the query cache in step with the backend.

use futures_util::StreamExt;
use prost::Message as _;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use proto::realtime::ChangeEvent;

use crate::domain::tenant::TenantId;
use crate::query_cache::QueryCache;
use crate::store::Table;
use crate::{BusMessage, BusStream, CoreError, EventSubscriber};

/// Pattern covering every tenant's changes.
pub const ALL_TENANTS: &str = "tenant:*";

pub fn topic(tenant: &TenantId, table: Table) -> String {
    format!("tenant:{}:{}", tenant, table)
}

pub fn tenant_pattern(tenant: &TenantId) -> String {
    format!("tenant:{}:*", tenant)
}

/// Splits `tenant:{id}:{table}`. Unknown tables yield `None` for the table.
pub fn parse_topic(topic: &str) -> Option<(TenantId, Option<Table>)> {
    let mut parts = topic.splitn(3, ':');
    if parts.next()? != "tenant" {
        return None;
    }
    let tenant = TenantId::parse(parts.next()?).ok()?;
    let table = parts.next().and_then(Table::parse);
    Some((tenant, table))
}

pub fn decode_change(payload: &[u8]) -> Result<ChangeEvent, CoreError> {
    ChangeEvent::decode(payload)
        .map_err(|e| CoreError::Deserialization(format!("Invalid change event: {}", e)))
}

fn invalidate_for(cache: &QueryCache, msg: &BusMessage) {
    let target = match decode_change(&msg.payload) {
        Ok(event) => TenantId::parse(&event.tenant_id)
            .ok()
            .map(|tenant| (tenant, Table::parse(&event.table))),
        Err(e) => {
            warn!(topic = %msg.topic, "Undecodable change event, falling back to topic: {}", e);
            parse_topic(&msg.topic)
        }
    };
    match target {
        Some((tenant, Some(table))) => cache.invalidate(table, &tenant),
        Some((tenant, None)) => cache.invalidate_tenant(&tenant),
        None => warn!(topic = %msg.topic, "Change event names no tenant; ignored"),
    }
}

/// A running subscription. Dropping it stops the background task.
pub struct RealtimeSubscription {
    topics: Vec<String>,
    handle: JoinHandle<()>,
}

impl RealtimeSubscription {
    fn spawn<F>(topics: Vec<String>, mut stream: BusStream, mut on_message: F) -> Self
    where
        F: FnMut(BusMessage) -> bool + Send + 'static,
    {
        let label = topics.join(",");
        let handle = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                if !on_message(msg) {
                    break;
                }
            }
            debug!(topics = %label, "Realtime subscription ended");
        });
        Self { topics, handle }
    }

    /// Invalidates `cache` for every change seen on `topics`.
    pub async fn invalidating(
        subscriber: &dyn EventSubscriber,
        cache: QueryCache,
        topics: Vec<String>,
    ) -> Result<Self, CoreError> {
        let stream = subscriber.subscribe(&topics).await?;
        info!(topics = ?topics, "Cache invalidation subscription started");
        Ok(Self::spawn(topics, stream, move |msg| {
            invalidate_for(&cache, &msg);
            true
        }))
    }

    /// Keeps one tenant's cached reads fresh.
    pub async fn for_tenant(
        subscriber: &dyn EventSubscriber,
        cache: QueryCache,
        tenant: &TenantId,
    ) -> Result<Self, CoreError> {
        Self::invalidating(subscriber, cache, vec![tenant_pattern(tenant)]).await
    }

    /// Pushes every message on `topics` into `sink` until the receiver goes away.
    pub async fn forwarding(
        subscriber: &dyn EventSubscriber,
        topics: Vec<String>,
        sink: mpsc::Sender<BusMessage>,
    ) -> Result<Self, CoreError> {
        let stream = subscriber.subscribe(&topics).await?;
        Ok(Self::spawn(topics, stream, move |msg| match sink.try_send(msg) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(msg)) => {
                warn!(topic = %msg.topic, "Subscriber is lagging; dropped change event");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }))
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for RealtimeSubscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Starts the process-wide invalidator on every tenant's changes.
pub async fn spawn_invalidator(
    subscriber: &dyn EventSubscriber,
    cache: QueryCache,
) -> Result<RealtimeSubscription, CoreError> {
    RealtimeSubscription::invalidating(subscriber, cache, vec![ALL_TENANTS.to_string()]).await
}

/// Follows the active tenant: one forwarding subscription, replaced whenever
/// the tenant changes.
pub struct TenantSubscription {
    subscriber: Arc<dyn EventSubscriber>,
    sink: mpsc::Sender<BusMessage>,
    tenant: Option<TenantId>,
    current: Option<RealtimeSubscription>,
}

impl TenantSubscription {
    pub fn new(subscriber: Arc<dyn EventSubscriber>, sink: mpsc::Sender<BusMessage>) -> Self {
        Self {
            subscriber,
            sink,
            tenant: None,
            current: None,
        }
    }

    pub fn tenant(&self) -> Option<&TenantId> {
        self.tenant.as_ref()
    }

    /// Returns whether the subscription was replaced.
    pub async fn switch(&mut self, tenant: Option<&TenantId>) -> Result<bool, CoreError> {
        if self.tenant.as_ref() == tenant && (tenant.is_none() || self.current.is_some()) {
            return Ok(false);
        }
        // tear down before opening so events never interleave across tenants
        self.current = None;
        self.tenant = tenant.cloned();
        if let Some(tenant) = tenant {
            let sub = RealtimeSubscription::forwarding(
                self.subscriber.as_ref(),
                vec![tenant_pattern(tenant)],
                self.sink.clone(),
            )
            .await?;
            self.current = Some(sub);
        }
        Ok(true)
    }
}
