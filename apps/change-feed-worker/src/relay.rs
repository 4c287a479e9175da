use chrono::Utc;
use core_lib::realtime::topic;
use core_lib::{CoreError, EventPublisher};
use prost::Message;
use tracing::info;

use crate::models::{InboundChange, MalformedChange};

#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    /// The delivery can never succeed; drop it.
    #[error("malformed change: {0}")]
    Malformed(#[from] MalformedChange),
    /// The bus is unavailable; retry later.
    #[error("publish failed: {0}")]
    Publish(#[from] CoreError),
}

impl RelayError {
    pub fn should_requeue(&self) -> bool {
        matches!(self, RelayError::Publish(_))
    }
}

/// Re-publishes one backend notification on `tenant:{tenant}:{table}`.
/// Returns the topic it went out on.
pub async fn relay(payload: &[u8], publisher: &dyn EventPublisher) -> Result<String, RelayError> {
    let change = InboundChange::parse(payload)?.into_tenant_change(Utc::now())?;
    let topic = topic(&change.tenant, change.table);
    publisher
        .publish(&topic, change.event.change_kind().label(), &change.event.encode_to_vec())
        .await?;
    info!(%topic, record_id = %change.event.record_id, "Relayed change");
    Ok(topic)
}
