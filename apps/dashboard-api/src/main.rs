use std::sync::Arc;

use core_lib::adapters::{
    HttpWebhooks, InMemoryCache, InMemoryEventBus, InMemoryStore, PostgresStore, RedisCache, RedisEventBus,
    RestBackend, StoreAuth, UnconfiguredWebhooks,
};
use core_lib::realtime::spawn_invalidator;
use core_lib::{AuthProvider, Cache, CoreError, EventPublisher, EventSubscriber, TableStore, WebhookInvoker};
use dashboard_api::settings::Settings;
use dashboard_api::{create_app, AppState, Ports};
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

async fn table_backend(settings: &Settings) -> Result<(Arc<dyn TableStore>, Arc<dyn AuthProvider>), CoreError> {
    if let Some(backend) = &settings.backend {
        let rest = Arc::new(RestBackend::new(&backend.url, &backend.api_key, settings.webhook_timeout)?);
        info!(url = %backend.url, "Using hosted backend for tables and auth");
        let store: Arc<dyn TableStore> = rest.clone();
        let auth: Arc<dyn AuthProvider> = rest;
        return Ok((store, auth));
    }

    let store: Arc<dyn TableStore> = match &settings.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await
                .map_err(CoreError::infra)?;
            let store = PostgresStore::new(pool);
            store.migrate().await?;
            info!("Connected to Postgres");
            Arc::new(store)
        }
        None => {
            warn!("Neither BACKEND_URL nor DATABASE_URL set; data lives in memory only");
            Arc::new(InMemoryStore::new())
        }
    };
    let auth: Arc<dyn AuthProvider> = Arc::new(StoreAuth::new(store.clone()));
    Ok((store, auth))
}

async fn realtime(
    settings: &Settings,
) -> Result<(Arc<dyn Cache>, Arc<dyn EventPublisher>, Arc<dyn EventSubscriber>), CoreError> {
    let ttl = settings.session_ttl.as_secs();
    match &settings.redis_url {
        Some(url) => {
            let cache: Arc<dyn Cache> = Arc::new(RedisCache::new(url, ttl).await?);
            let bus = Arc::new(RedisEventBus::new(url, None).await?);
            info!("Connected to Redis for cache and realtime");
            let publisher: Arc<dyn EventPublisher> = bus.clone();
            let subscriber: Arc<dyn EventSubscriber> = bus;
            Ok((cache, publisher, subscriber))
        }
        None => {
            warn!("REDIS_URL not set; cache and realtime are process-local");
            let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new(settings.cache_capacity, ttl));
            let bus = Arc::new(InMemoryEventBus::default());
            let publisher: Arc<dyn EventPublisher> = bus.clone();
            let subscriber: Arc<dyn EventSubscriber> = bus;
            Ok((cache, publisher, subscriber))
        }
    }
}

fn webhooks(settings: &Settings) -> Result<Arc<dyn WebhookInvoker>, CoreError> {
    match &settings.webhook_base_url {
        Some(base) => Ok(Arc::new(HttpWebhooks::new(base, settings.webhook_timeout)?)),
        None => {
            warn!("WEBHOOK_BASE_URL not set; automation features are disabled");
            Ok(Arc::new(UnconfiguredWebhooks))
        }
    }
}

async fn build_ports(settings: &Settings) -> Result<Ports, CoreError> {
    let (store, auth) = table_backend(settings).await?;
    let (cache, publisher, subscriber) = realtime(settings).await?;
    Ok(Ports {
        store,
        auth,
        cache,
        publisher,
        subscriber,
        webhooks: webhooks(settings)?,
    })
}

#[tokio::main]
async fn main() {
    // Load environment (.env) if present
    dotenv().ok();

    let settings = Settings::from_env();
    let level = settings.as_ref().map(|s| s.log_level).unwrap_or(tracing::Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {}", e);
    }

    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };
    info!("Starting dashboard API v{}...", env!("CARGO_PKG_VERSION"));

    let ports = match build_ports(&settings).await {
        Ok(ports) => ports,
        Err(e) => {
            error!("Failed to initialise infrastructure: {}", e);
            return;
        }
    };

    let app_state = AppState::new(ports, settings.query_stale_after, settings.session_ttl);

    // held for the lifetime of the process; dropping it stops invalidation
    let _invalidator = match spawn_invalidator(
        app_state.subscriber.as_ref(),
        app_state.resources.query_cache().clone(),
    )
    .await
    {
        Ok(sub) => Some(sub),
        Err(e) => {
            warn!("Cache invalidation disabled: {}", e);
            None
        }
    };

    let app = create_app(app_state);

    let addr = settings.bind_addr;
    info!("Dashboard API listening on {}", addr);

    let listener = TcpListener::bind(addr).await.unwrap_or_else(|e| {
        panic!("Failed to bind to address {}: {}", addr, e);
    });

    axum::serve(listener, app.into_make_service())
        .await
        .unwrap_or_else(|e| {
            panic!("Server failed to run: {}", e);
        });
}
