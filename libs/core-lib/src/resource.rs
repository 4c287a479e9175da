//! Tenant-scoped access to one backend table.
//!
//! Every read and write issued here carries `tenant_id = <active tenant>`.
//! Reads go through the [`QueryCache`]; successful writes invalidate the
//! (table, tenant) pair and announce a change on the realtime bus.

use chrono::Utc;
use prost::Message as _;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use proto::realtime::{ChangeEvent, ChangeKind};

use crate::domain::inbox::{Conversation, ConversationFilter, Message};
use crate::domain::marketing::{Campaign, CampaignFilter, Template};
use crate::domain::sales::{Deal, Lead, LeadFilter};
use crate::domain::tenant::{Organization, TenantConfig, TenantId};
use crate::domain::user::UserProfile;
use crate::query_cache::QueryCache;
use crate::realtime;
use crate::store::{Filter, FilterOp, SelectQuery, Table, as_text};
use crate::{CoreError, EventPublisher, TableStore};

pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: Table;
    /// Lists are sorted by this column, newest first.
    const ORDER_BY: &'static str = "created_at";
}

impl Resource for TenantConfig {
    const TABLE: Table = Table::TenantConfig;
}

impl Resource for Organization {
    const TABLE: Table = Table::Organizations;
}

impl Resource for UserProfile {
    const TABLE: Table = Table::Users;
}

impl Resource for Conversation {
    const TABLE: Table = Table::Conversations;
    const ORDER_BY: &'static str = "updated_at";
}

impl Resource for Message {
    const TABLE: Table = Table::Messages;
}

impl Resource for Lead {
    const TABLE: Table = Table::SalesLeads;
}

impl Resource for Deal {
    const TABLE: Table = Table::Deals;
    const ORDER_BY: &'static str = "updated_at";
}

impl Resource for Campaign {
    const TABLE: Table = Table::MarketingCampaigns;
}

impl Resource for Template {
    const TABLE: Table = Table::Templates;
}

/// Extra conditions on a scoped list. The fingerprint becomes part of the cache key.
pub trait ResourceFilter: Send + Sync {
    fn apply(&self, query: SelectQuery) -> SelectQuery;
    fn fingerprint(&self) -> String;
}

impl ResourceFilter for () {
    fn apply(&self, query: SelectQuery) -> SelectQuery {
        query
    }

    fn fingerprint(&self) -> String {
        "all".to_string()
    }
}

impl ResourceFilter for Vec<Filter> {
    fn apply(&self, mut query: SelectQuery) -> SelectQuery {
        query.filters.extend(self.iter().cloned());
        query
    }

    fn fingerprint(&self) -> String {
        if self.is_empty() {
            return "all".to_string();
        }
        self.iter()
            .map(|f| match &f.op {
                FilterOp::Eq(v) => format!("{}={}", f.column, as_text(v).unwrap_or_default()),
                FilterOp::Search(term) => format!("{}~{}", f.column, term.to_lowercase()),
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn non_empty(term: &Option<String>) -> Option<&str> {
    term.as_deref().map(str::trim).filter(|t| !t.is_empty())
}

impl ConversationFilter {
    fn to_filters(&self) -> Vec<Filter> {
        let mut filters = Vec::new();
        if let Some(channel) = self.channel {
            filters.push(Filter::eq("channel", channel.as_str()));
        }
        if let Some(status) = self.status {
            filters.push(Filter::eq("status", status.as_str()));
        }
        if let Some(term) = non_empty(&self.search) {
            filters.push(Filter::search("contact_name", term));
        }
        filters
    }
}

impl ResourceFilter for ConversationFilter {
    fn apply(&self, query: SelectQuery) -> SelectQuery {
        self.to_filters().apply(query)
    }

    fn fingerprint(&self) -> String {
        self.to_filters().fingerprint()
    }
}

impl LeadFilter {
    fn to_filters(&self) -> Vec<Filter> {
        let mut filters = Vec::new();
        if let Some(status) = self.status {
            filters.push(Filter::eq("sequence_status", status.as_str()));
        }
        if let Some(term) = non_empty(&self.search) {
            filters.push(Filter::search("name", term));
        }
        filters
    }
}

impl ResourceFilter for LeadFilter {
    fn apply(&self, query: SelectQuery) -> SelectQuery {
        self.to_filters().apply(query)
    }

    fn fingerprint(&self) -> String {
        self.to_filters().fingerprint()
    }
}

impl CampaignFilter {
    fn to_filters(&self) -> Vec<Filter> {
        let mut filters = Vec::new();
        if let Some(channel) = self.channel {
            filters.push(Filter::eq("channel", channel.as_str()));
        }
        if let Some(status) = self.status {
            filters.push(Filter::eq("status", status.as_str()));
        }
        filters
    }
}

impl ResourceFilter for CampaignFilter {
    fn apply(&self, query: SelectQuery) -> SelectQuery {
        self.to_filters().apply(query)
    }

    fn fingerprint(&self) -> String {
        self.to_filters().fingerprint()
    }
}

pub(crate) fn parse_row<R: DeserializeOwned>(table: Table, row: Value) -> Result<R, CoreError> {
    serde_json::from_value(row)
        .map_err(|e| CoreError::Deserialization(format!("Malformed {} row: {}", table, e)))
}

pub struct TenantScoped<R> {
    store: Arc<dyn TableStore>,
    cache: QueryCache,
    publisher: Arc<dyn EventPublisher>,
    _resource: PhantomData<fn() -> R>,
}

impl<R> Clone for TenantScoped<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            cache: self.cache.clone(),
            publisher: self.publisher.clone(),
            _resource: PhantomData,
        }
    }
}

impl<R: Resource> TenantScoped<R> {
    pub fn new(store: Arc<dyn TableStore>, cache: QueryCache, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            store,
            cache,
            publisher,
            _resource: PhantomData,
        }
    }

    /// Rows of the tenant matching `filter`. No tenant means no rows.
    pub async fn list(&self, tenant: Option<&TenantId>, filter: &dyn ResourceFilter) -> Result<Vec<R>, CoreError> {
        let Some(tenant) = tenant else {
            return Ok(Vec::new());
        };
        let key = self.cache.key(R::TABLE, tenant, &filter.fingerprint());
        if let Some(cached) = self.cache.get::<Vec<R>>(&key).await {
            return Ok(cached);
        }

        let query = filter
            .apply(SelectQuery::new().eq("tenant_id", tenant.as_str()))
            .order_desc(R::ORDER_BY);
        let rows = self.store.select(R::TABLE, &query).await?;
        let records = rows
            .into_iter()
            .map(|row| parse_row::<R>(R::TABLE, row))
            .collect::<Result<Vec<_>, _>>()?;

        self.cache.put(&key, &records).await;
        Ok(records)
    }

    pub async fn get(&self, tenant: &TenantId, id: Uuid) -> Result<R, CoreError> {
        let key = self.cache.key(R::TABLE, tenant, &format!("id={}", id));
        if let Some(cached) = self.cache.get::<R>(&key).await {
            return Ok(cached);
        }
        let query = SelectQuery::new()
            .eq("tenant_id", tenant.as_str())
            .eq("id", id.to_string())
            .limit(1);
        let row = self
            .store
            .select(R::TABLE, &query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::NotFound(format!("{} {} not found", R::TABLE, id)))?;
        let record = parse_row::<R>(R::TABLE, row)?;
        self.cache.put(&key, &record).await;
        Ok(record)
    }

    /// Earliest row of the tenant, for one-row-per-tenant tables like
    /// `tenant_config`. Lists come newest first, so this is the last entry.
    pub async fn oldest(&self, tenant: &TenantId) -> Result<Option<R>, CoreError> {
        Ok(self.list(Some(tenant), &()).await?.into_iter().last())
    }

    /// Writes `record` under `tenant`, whatever tenant the record claims.
    pub async fn insert(&self, tenant: &TenantId, record: &R) -> Result<R, CoreError> {
        let mut row = match serde_json::to_value(record) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                return Err(CoreError::Serialization(format!(
                    "{} records must serialize to objects",
                    R::TABLE
                )))
            }
            Err(e) => return Err(CoreError::Serialization(e.to_string())),
        };
        row.insert("tenant_id".into(), Value::String(tenant.to_string()));
        if row.get("id").is_none_or(Value::is_null) {
            row.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        }
        if row.get("created_at").is_none_or(Value::is_null) {
            row.insert("created_at".into(), Value::String(Utc::now().to_rfc3339()));
        }

        let stored = self.store.insert(R::TABLE, Value::Object(row)).await?;
        let record_id = stored.get("id").and_then(as_text).unwrap_or_default();
        let created = parse_row::<R>(R::TABLE, stored)?;

        info!(tenant = %tenant, table = %R::TABLE, id = %record_id, "Inserted row");
        self.after_write(tenant, ChangeKind::Insert, &record_id).await;
        Ok(created)
    }

    /// Applies `patch` to the tenant's row `id`. `id` and `tenant_id` cannot be patched.
    pub async fn update(&self, tenant: &TenantId, id: Uuid, patch: Value) -> Result<R, CoreError> {
        let mut patch: Map<String, Value> = match patch {
            Value::Object(map) => map,
            _ => return Err(CoreError::Validation("Update must be a JSON object".into())),
        };
        patch.remove("id");
        patch.remove("tenant_id");
        if patch.is_empty() {
            return Err(CoreError::Validation("Nothing to update".into()));
        }

        let filters = [
            Filter::eq("id", id.to_string()),
            Filter::eq("tenant_id", tenant.as_str()),
        ];
        let row = self
            .store
            .update(R::TABLE, &filters, Value::Object(patch))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::NotFound(format!("{} {} not found", R::TABLE, id)))?;
        let updated = parse_row::<R>(R::TABLE, row)?;

        info!(tenant = %tenant, table = %R::TABLE, %id, "Updated row");
        self.after_write(tenant, ChangeKind::Update, &id.to_string()).await;
        Ok(updated)
    }

    async fn after_write(&self, tenant: &TenantId, kind: ChangeKind, record_id: &str) {
        self.cache.invalidate(R::TABLE, tenant);

        let event = ChangeEvent {
            tenant_id: tenant.to_string(),
            table: R::TABLE.to_string(),
            kind: kind as i32,
            record_id: record_id.to_string(),
            occurred_at: Utc::now().to_rfc3339(),
        };
        let topic = realtime::topic(tenant, R::TABLE);
        if let Err(e) = self
            .publisher
            .publish(&topic, kind.label(), &event.encode_to_vec())
            .await
        {
            warn!(%topic, "Failed to publish change event: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::in_memory_cache::InMemoryCache;
    use crate::adapters::in_memory_event_bus::InMemoryEventBus;
    use crate::adapters::in_memory_store::InMemoryStore;
    use crate::domain::inbox::{Channel, ConversationStatus, HandlerType};
    use crate::query_cache::DEFAULT_STALE_AFTER;
    use crate::EventSubscriber;
    use async_trait::async_trait;
    use futures_util::StreamExt;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;
    use tokio::time::{timeout, Duration};

    struct Fixture {
        store: Arc<InMemoryStore>,
        bus: Arc<InMemoryEventBus>,
        conversations: TenantScoped<Conversation>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let bus = Arc::new(InMemoryEventBus::default());
        let cache = QueryCache::new(Arc::new(InMemoryCache::default()), DEFAULT_STALE_AFTER);
        let conversations = TenantScoped::new(store.clone(), cache, bus.clone());
        Fixture {
            store,
            bus,
            conversations,
        }
    }

    fn conversation(tenant: &str, contact: &str) -> Conversation {
        let now = Utc::now();
        Conversation {
            id: Uuid::new_v4(),
            tenant_id: TenantId::parse(tenant).unwrap(),
            channel: Channel::Whatsapp,
            status: ConversationStatus::Active,
            handler_type: HandlerType::Ai,
            contact_name: Some(contact.to_string()),
            last_message: None,
            unread_count: 2,
            updated_at: now,
            created_at: now,
        }
    }

    fn tenant(id: &str) -> TenantId {
        TenantId::parse(id).unwrap()
    }

    #[tokio::test]
    async fn absent_tenant_lists_nothing() {
        let fx = fixture();
        fx.conversations
            .insert(&tenant("acme"), &conversation("acme", "Maria"))
            .await
            .unwrap();
        let rows = fx.conversations.list(None, &()).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn tenants_never_see_each_other() {
        let fx = fixture();
        fx.conversations
            .insert(&tenant("acme"), &conversation("acme", "Maria"))
            .await
            .unwrap();
        fx.conversations
            .insert(&tenant("globex"), &conversation("globex", "Hank"))
            .await
            .unwrap();

        let acme = fx.conversations.list(Some(&tenant("acme")), &()).await.unwrap();
        assert_eq!(acme.len(), 1);
        assert_eq!(acme[0].contact_name.as_deref(), Some("Maria"));

        let maria = acme[0].id;
        let other = fx.conversations.list(Some(&tenant("globex")), &()).await.unwrap();
        assert!(other.iter().all(|c| c.tenant_id.as_str() == "globex"));
        assert!(matches!(
            fx.conversations.get(&tenant("globex"), maria).await,
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn insert_forces_active_tenant() {
        let fx = fixture();
        let created = fx
            .conversations
            .insert(&tenant("acme"), &conversation("globex", "Sneaky"))
            .await
            .unwrap();
        assert_eq!(created.tenant_id.as_str(), "acme");
        assert!(fx.conversations.list(Some(&tenant("globex")), &()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_changes_only_the_matched_row() {
        let fx = fixture();
        let a = fx
            .conversations
            .insert(&tenant("acme"), &conversation("acme", "A"))
            .await
            .unwrap();
        let b = fx
            .conversations
            .insert(&tenant("acme"), &conversation("acme", "B"))
            .await
            .unwrap();
        // warm the cache so the update has something to invalidate
        fx.conversations.list(Some(&tenant("acme")), &()).await.unwrap();

        let updated = fx
            .conversations
            .update(&tenant("acme"), a.id, json!({"unread_count": 0, "tenant_id": "globex"}))
            .await
            .unwrap();
        assert_eq!(updated.unread_count, 0);
        assert_eq!(updated.tenant_id.as_str(), "acme");

        let rows = fx.conversations.list(Some(&tenant("acme")), &()).await.unwrap();
        let find = |id| rows.iter().find(|c| c.id == id).unwrap().unread_count;
        assert_eq!(find(a.id), 0);
        assert_eq!(find(b.id), 2);
    }

    /// Holds the next `select` after it has read its rows, until released.
    struct HeldSelect {
        inner: InMemoryStore,
        armed: AtomicBool,
        fetched: Notify,
        release: Notify,
    }

    #[async_trait]
    impl TableStore for HeldSelect {
        async fn select(&self, table: Table, query: &SelectQuery) -> Result<Vec<Value>, CoreError> {
            let rows = self.inner.select(table, query).await?;
            if self.armed.swap(false, Ordering::SeqCst) {
                self.fetched.notify_one();
                self.release.notified().await;
            }
            Ok(rows)
        }

        async fn insert(&self, table: Table, row: Value) -> Result<Value, CoreError> {
            self.inner.insert(table, row).await
        }

        async fn update(&self, table: Table, filters: &[Filter], patch: Value) -> Result<Vec<Value>, CoreError> {
            self.inner.update(table, filters, patch).await
        }
    }

    #[tokio::test]
    async fn read_overlapping_a_write_does_not_pin_old_rows() {
        let store = Arc::new(HeldSelect {
            inner: InMemoryStore::new(),
            armed: AtomicBool::new(false),
            fetched: Notify::new(),
            release: Notify::new(),
        });
        let cache = QueryCache::new(Arc::new(InMemoryCache::default()), DEFAULT_STALE_AFTER);
        let conversations: TenantScoped<Conversation> =
            TenantScoped::new(store.clone(), cache, Arc::new(InMemoryEventBus::default()));
        let acme = tenant("acme");
        let mut unread = conversation("acme", "Maria");
        unread.unread_count = 5;
        let row = conversations.insert(&acme, &unread).await.unwrap();

        store.armed.store(true, Ordering::SeqCst);
        let reader = {
            let conversations = conversations.clone();
            let acme = acme.clone();
            tokio::spawn(async move { conversations.list(Some(&acme), &()).await })
        };
        store.fetched.notified().await;
        conversations
            .update(&acme, row.id, json!({"unread_count": 0}))
            .await
            .unwrap();
        store.release.notify_one();

        let overlapped = reader.await.unwrap().unwrap();
        assert_eq!(overlapped[0].unread_count, 5);
        let after = conversations.list(Some(&acme), &()).await.unwrap();
        assert_eq!(after[0].unread_count, 0);
    }

    #[tokio::test]
    async fn oldest_is_the_earliest_row() {
        let fx = fixture();
        let mut early = conversation("acme", "Early");
        early.updated_at = Utc::now() - chrono::Duration::hours(1);
        fx.conversations.insert(&tenant("acme"), &early).await.unwrap();
        fx.conversations
            .insert(&tenant("acme"), &conversation("acme", "Late"))
            .await
            .unwrap();

        let oldest = fx.conversations.oldest(&tenant("acme")).await.unwrap().unwrap();
        assert_eq!(oldest.contact_name.as_deref(), Some("Early"));
        assert!(fx.conversations.oldest(&tenant("globex")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_of_other_tenant_row_is_not_found() {
        let fx = fixture();
        let row = fx
            .conversations
            .insert(&tenant("acme"), &conversation("acme", "A"))
            .await
            .unwrap();
        let result = fx
            .conversations
            .update(&tenant("globex"), row.id, json!({"unread_count": 0}))
            .await;
        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn search_filter_is_case_insensitive() {
        let fx = fixture();
        for name in ["Maria Lopez", "John Smith"] {
            fx.conversations
                .insert(&tenant("acme"), &conversation("acme", name))
                .await
                .unwrap();
        }
        let filter = ConversationFilter {
            search: Some("LOPEZ".into()),
            ..Default::default()
        };
        let rows = fx.conversations.list(Some(&tenant("acme")), &filter).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].contact_name.as_deref(), Some("Maria Lopez"));
    }

    #[tokio::test]
    async fn writes_announce_changes() {
        let fx = fixture();
        let mut events = fx
            .bus
            .subscribe(&[realtime::tenant_pattern(&tenant("acme"))])
            .await
            .unwrap();
        let created = fx
            .conversations
            .insert(&tenant("acme"), &conversation("acme", "A"))
            .await
            .unwrap();

        let msg = timeout(Duration::from_millis(200), events.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.topic, "tenant:acme:conversations");
        let event = realtime::decode_change(&msg.payload).unwrap();
        assert_eq!(event.change_kind(), ChangeKind::Insert);
        assert_eq!(event.record_id, created.id.to_string());
    }

    #[tokio::test]
    async fn malformed_rows_are_rejected() {
        let fx = fixture();
        fx.store
            .insert(
                Table::Conversations,
                json!({"id": Uuid::new_v4().to_string(), "tenant_id": "acme", "channel": "fax",
                       "updated_at": "2026-01-01T00:00:00Z", "created_at": "2026-01-01T00:00:00Z"}),
            )
            .await
            .unwrap();
        let result = fx.conversations.list(Some(&tenant("acme")), &()).await;
        assert!(matches!(result, Err(CoreError::Deserialization(_))));
    }
}
