use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
    time::{Duration, Instant},
};

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Response,
};
use core_lib::domain::context::AppContext;
use core_lib::domain::tenant::TenantId;
use core_lib::realtime::{decode_change, tenant_pattern, TenantSubscription};
use core_lib::store::Table;
use core_lib::{topic_matches, BusMessage, CoreError};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{mpsc, Mutex};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::application::middleware::bearer_token;
use crate::application::ApplicationError;
use crate::AppState;

const HEARTBEAT_EVERY: Duration = Duration::from_secs(30);
const IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const MAX_FRAME_BYTES: usize = 32 * 1024;
const CONTROL_FRAMES_PER_WINDOW: usize = 10;
const CONTROL_WINDOW: Duration = Duration::from_secs(10);
const FORWARD_BUFFER: usize = 256;

type Sender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Browsers cannot set headers on a websocket upgrade: `/api/ws?token=...`.
#[derive(Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

#[derive(Serialize)]
struct ErrorFrame {
    r#type: &'static str,
    code: &'static str,
    message: String,
}

#[derive(Serialize)]
struct HeartbeatFrame {
    r#type: &'static str,
    ts: String,
}

#[derive(Serialize)]
struct AckFrame {
    r#type: &'static str,
    action: &'static str,
    channels: Vec<String>,
    accepted: Vec<String>,
    rejected: Vec<String>,
}

#[derive(Serialize)]
struct PongFrame {
    r#type: &'static str,
    id: Option<String>,
}

#[derive(Serialize)]
struct TenantFrame {
    r#type: &'static str,
    tenant_id: Option<TenantId>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Inbound {
    Subscribe { channels: Vec<String> },
    Unsubscribe { channels: Vec<String> },
    Ping { id: Option<String> },
    #[serde(other)]
    Unknown,
}

struct RateLimiter {
    events: VecDeque<Instant>,
    max: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max: usize, window: Duration) -> Self {
        Self {
            events: VecDeque::new(),
            max,
            window,
        }
    }

    fn record(&mut self) -> bool {
        let now = Instant::now();
        while let Some(front) = self.events.front() {
            if now.duration_since(*front) > self.window {
                self.events.pop_front();
            } else {
                break;
            }
        }
        self.events.push_back(now);
        self.events.len() <= self.max
    }
}

/// Handler registered at `/api/ws`.
pub async fn ws_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApplicationError> {
    let token = bearer_token(&headers)
        .or(q.token)
        .ok_or_else(|| ApplicationError::Unauthorized("Missing session token".into()))?;
    let ctx = app_state.auth.resolve(&token).await?;
    Ok(ws.on_upgrade(move |socket| websocket_connection(socket, app_state, token, ctx)))
}

fn default_channels(tenant: Option<&TenantId>) -> HashSet<String> {
    tenant.map(tenant_pattern).into_iter().collect()
}

async fn websocket_connection(socket: WebSocket, app_state: AppState, token: String, mut ctx: AppContext) {
    let conn_id = uuid::Uuid::new_v4();
    info!(%conn_id, user_id = %ctx.user_id, tenant = ?ctx.active_tenant, "WebSocket connection established");

    let subscriptions = Arc::new(Mutex::new(default_channels(ctx.tenant())));
    let mut rate_limiter = RateLimiter::new(CONTROL_FRAMES_PER_WINDOW, CONTROL_WINDOW);
    let mut last_activity = Instant::now();

    let (sender_raw, mut receiver) = socket.split();
    let sender: Sender = Arc::new(Mutex::new(sender_raw));

    // bus -> socket
    let (tx, rx) = mpsc::channel::<BusMessage>(FORWARD_BUFFER);
    let mut tenant_feed = TenantSubscription::new(app_state.subscriber.clone(), tx);
    if let Err(e) = tenant_feed.switch(ctx.tenant()).await {
        warn!(%conn_id, "Realtime subscription failed; events disabled: {}", e);
    }
    let forwarder = tokio::spawn(forward_events(conn_id, rx, subscriptions.clone(), sender.clone()));

    let mut heartbeat = interval(HEARTBEAT_EVERY);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if last_activity.elapsed() > IDLE_TIMEOUT {
                    info!(%conn_id, "Idle timeout reached; closing");
                    close(&sender, "Idle timeout").await;
                    break;
                }
                let frame = HeartbeatFrame { r#type: "heartbeat", ts: chrono::Utc::now().to_rfc3339() };
                if send_json(&sender, &frame).await.is_err() {
                    break;
                }
                // the session may have ended or switched tenant since the last beat
                match app_state.auth.resolve(&token).await {
                    Ok(current) if current.active_tenant != ctx.active_tenant => {
                        info!(%conn_id, tenant = ?current.active_tenant, "Active tenant changed");
                        if let Err(e) = tenant_feed.switch(current.tenant()).await {
                            warn!(%conn_id, "Realtime resubscription failed: {}", e);
                        }
                        *subscriptions.lock().await = default_channels(current.tenant());
                        let frame = TenantFrame { r#type: "tenant", tenant_id: current.active_tenant.clone() };
                        ctx = current;
                        if send_json(&sender, &frame).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(CoreError::Unauthorized(_) | CoreError::Forbidden(_)) => {
                        info!(%conn_id, "Session ended; closing");
                        close(&sender, "Session ended").await;
                        break;
                    }
                    Err(e) => warn!(%conn_id, "Session check failed: {}", e),
                }
            }
            inbound = receiver.next() => {
                let Some(Ok(msg)) = inbound else { break };
                last_activity = Instant::now();
                let keep_open = match msg {
                    Message::Text(txt) => {
                        handle_text(txt.as_str(), &ctx, &mut rate_limiter, &subscriptions, &sender).await
                    }
                    Message::Binary(_) => {
                        send_error(&sender, "invalid_message", "Binary frames not supported").await.is_ok()
                    }
                    Message::Ping(data) => sender.lock().await.send(Message::Pong(data)).await.is_ok(),
                    Message::Pong(_) => true,
                    Message::Close(_) => {
                        info!(%conn_id, "Client closed connection");
                        false
                    }
                };
                if !keep_open {
                    break;
                }
            }
        }
    }

    forwarder.abort();
    info!(%conn_id, "WebSocket connection terminated");
}

/// Returns false when the socket is gone.
async fn handle_text(
    txt: &str,
    ctx: &AppContext,
    rate_limiter: &mut RateLimiter,
    subscriptions: &Mutex<HashSet<String>>,
    sender: &Sender,
) -> bool {
    if txt.len() > MAX_FRAME_BYTES {
        return send_error(sender, "invalid_message", "Message too large").await.is_ok();
    }
    if !rate_limiter.record() {
        return send_error(sender, "rate_limited", "Too many control messages").await.is_ok();
    }
    match serde_json::from_str::<Inbound>(txt) {
        Ok(Inbound::Subscribe { channels }) => {
            let mut accepted = Vec::new();
            let mut rejected = Vec::new();
            {
                let mut subs = subscriptions.lock().await;
                for ch in &channels {
                    if !validate_channel(ch, ctx.tenant()) {
                        rejected.push(ch.clone());
                    } else if subs.insert(ch.clone()) {
                        accepted.push(ch.clone());
                    }
                }
            }
            let frame = AckFrame {
                r#type: "ack",
                action: "subscribe",
                channels,
                accepted,
                rejected,
            };
            send_json(sender, &frame).await.is_ok()
        }
        Ok(Inbound::Unsubscribe { channels }) => {
            let mut removed = Vec::new();
            let mut missing = Vec::new();
            {
                let mut subs = subscriptions.lock().await;
                for ch in &channels {
                    if subs.remove(ch) {
                        removed.push(ch.clone());
                    } else {
                        missing.push(ch.clone());
                    }
                }
            }
            let frame = json!({
                "type": "ack",
                "action": "unsubscribe",
                "channels": channels,
                "removed": removed,
                "missing": missing
            });
            send_json(sender, &frame).await.is_ok()
        }
        Ok(Inbound::Ping { id }) => send_json(sender, &PongFrame { r#type: "pong", id }).await.is_ok(),
        Ok(Inbound::Unknown) | Err(_) => send_error(sender, "invalid_message", "Unrecognized message")
            .await
            .is_ok(),
    }
}

async fn forward_events(
    conn_id: uuid::Uuid,
    mut rx: mpsc::Receiver<BusMessage>,
    subscriptions: Arc<Mutex<HashSet<String>>>,
    sender: Sender,
) {
    while let Some(msg) = rx.recv().await {
        let wanted = subscriptions
            .lock()
            .await
            .iter()
            .any(|pattern| topic_matches(pattern, &msg.topic));
        if !wanted {
            continue;
        }
        let event = match decode_change(&msg.payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(%conn_id, topic = %msg.topic, "Dropping undecodable change: {}", e);
                continue;
            }
        };
        let frame = json!({
            "type": "event",
            "channel": msg.topic,
            "payload": {
                "tenant_id": event.tenant_id,
                "table": event.table,
                "kind": event.change_kind().label(),
                "record_id": event.record_id,
                "occurred_at": event.occurred_at,
            }
        });
        if send_json(&sender, &frame).await.is_err() {
            break;
        }
    }
    debug!(%conn_id, "Event forward loop ended");
}

async fn send_json<T: Serialize>(sender: &Sender, frame: &T) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize websocket frame: {}", e);
            return Ok(());
        }
    };
    sender
        .lock()
        .await
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

async fn send_error(sender: &Sender, code: &'static str, message: &str) -> Result<(), ()> {
    let frame = ErrorFrame {
        r#type: "error",
        code,
        message: message.to_string(),
    };
    send_json(sender, &frame).await
}

async fn close(sender: &Sender, reason: &'static str) {
    let _ = sender
        .lock()
        .await
        .send(Message::Close(Some(CloseFrame {
            code: axum::extract::ws::close_code::NORMAL,
            reason: reason.into(),
        })))
        .await;
}

/// Accepts `tenant:{active tenant}:{table}` and `tenant:{active tenant}:*`.
pub(crate) fn validate_channel(channel: &str, tenant: Option<&TenantId>) -> bool {
    let Some(tenant) = tenant else {
        return false;
    };
    let parts: Vec<&str> = channel.split(':').collect();
    match parts.as_slice() {
        ["tenant", tid, table] => *tid == tenant.as_str() && (*table == "*" || Table::parse(table).is_some()),
        _ => false,
    }
}
