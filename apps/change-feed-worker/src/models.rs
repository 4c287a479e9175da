use chrono::{DateTime, Utc};
use core_lib::domain::tenant::TenantId;
use core_lib::store::Table;
use proto::realtime::{ChangeEvent, ChangeKind};
use serde::Deserialize;

// Row-change notification as the backend publishes it
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct InboundChange {
    pub tenant_id: String,
    pub table: String,
    pub kind: String,
    #[serde(default)]
    pub record_id: Option<String>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum MalformedChange {
    #[error("not a change notification: {0}")]
    Json(String),
    #[error("invalid tenant id: {0}")]
    Tenant(String),
    #[error("unknown table: {0}")]
    Table(String),
}

/// A validated change ready for the realtime bus.
#[derive(Debug, Clone, PartialEq)]
pub struct TenantChange {
    pub tenant: TenantId,
    pub table: Table,
    pub event: ChangeEvent,
}

impl InboundChange {
    pub fn parse(payload: &[u8]) -> Result<Self, MalformedChange> {
        serde_json::from_slice(payload).map_err(|e| MalformedChange::Json(e.to_string()))
    }

    /// Missing timestamps are stamped with `now`.
    pub fn into_tenant_change(self, now: DateTime<Utc>) -> Result<TenantChange, MalformedChange> {
        let tenant = TenantId::parse(&self.tenant_id).map_err(|_| MalformedChange::Tenant(self.tenant_id.clone()))?;
        let table = Table::parse(&self.table).ok_or_else(|| MalformedChange::Table(self.table.clone()))?;
        let event = ChangeEvent {
            tenant_id: tenant.to_string(),
            table: table.to_string(),
            kind: ChangeKind::from_label(&self.kind) as i32,
            record_id: self.record_id.unwrap_or_default(),
            occurred_at: self.occurred_at.unwrap_or(now).to_rfc3339(),
        };
        Ok(TenantChange { tenant, table, event })
    }
}
