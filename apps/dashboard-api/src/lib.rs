use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};
use core_lib::query_cache::QueryCache;
use core_lib::services::{
    admin::AdminService, auth::AuthService, dashboard::DashboardService, inbox::InboxService,
    marketing::MarketingService, onboarding::TenantOnboarding, sales::SalesService, Resources,
};
use core_lib::{AuthProvider, Cache, EventPublisher, EventSubscriber, TableStore, WebhookInvoker};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod application;
pub mod settings;

use application::handlers::{admin, auth, hr, inbox, marketing, sales, tenant};
use application::middleware::session_auth;
use application::ws::ws_handler;
use application::ApplicationError;

/// The infrastructure the API runs on. `main` picks concrete adapters; tests
/// pass in-memory ones.
#[derive(Clone)]
pub struct Ports {
    pub store: Arc<dyn TableStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub cache: Arc<dyn Cache>,
    pub publisher: Arc<dyn EventPublisher>,
    pub subscriber: Arc<dyn EventSubscriber>,
    pub webhooks: Arc<dyn WebhookInvoker>,
}

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub inbox: InboxService,
    pub sales: SalesService,
    pub marketing: MarketingService,
    pub onboarding: TenantOnboarding,
    pub admin: AdminService,
    pub dashboards: DashboardService,
    pub resources: Resources,
    pub subscriber: Arc<dyn EventSubscriber>,
}

impl AppState {
    pub fn new(ports: Ports, query_stale_after: Duration, session_ttl: Duration) -> Self {
        let query_cache = QueryCache::new(ports.cache.clone(), query_stale_after);
        let resources = Resources::new(ports.store, query_cache, ports.publisher);
        Self {
            auth: AuthService::new(ports.auth.clone(), ports.cache, resources.clone(), session_ttl),
            inbox: InboxService::new(resources.clone()),
            sales: SalesService::new(resources.clone(), ports.webhooks.clone()),
            marketing: MarketingService::new(resources.clone(), ports.webhooks),
            onboarding: TenantOnboarding::new(resources.clone(), ports.auth),
            admin: AdminService::new(resources.clone()),
            dashboards: DashboardService::new(resources.clone()),
            resources,
            subscriber: ports.subscriber,
        }
    }
}

// Function to create the main Axum router with state
pub fn create_app(app_state: AppState) -> Router {
    let public_routes = Router::new().route("/auth/sign-in", post(auth::handle_sign_in));

    let protected_routes = Router::new()
        .route("/auth/sign-up", post(auth::handle_sign_up))
        .route("/auth/sign-out", post(auth::handle_sign_out))
        .route("/auth/me", get(auth::handle_me))
        .route("/tenant", get(tenant::handle_get_tenant))
        .route("/tenant/settings", patch(tenant::handle_update_settings))
        .route("/dashboard", get(tenant::handle_dashboard))
        .route("/hr/dashboard", get(hr::handle_hr_dashboard))
        .route("/conversations", get(inbox::handle_list_conversations))
        .route("/conversations/{id}/status", patch(inbox::handle_set_status))
        .route("/conversations/{id}/read", post(inbox::handle_mark_read))
        .route(
            "/conversations/{id}/messages",
            get(inbox::handle_list_messages).post(inbox::handle_send_message),
        )
        .route("/leads", get(sales::handle_list_leads))
        .route("/leads/generate", post(sales::handle_generate_leads))
        .route("/leads/{id}/sequence", post(sales::handle_control_sequence))
        .route("/deals", get(sales::handle_list_deals).post(sales::handle_create_deal))
        .route("/deals/{id}/stage", patch(sales::handle_move_deal))
        .route(
            "/campaigns",
            get(marketing::handle_list_campaigns).post(marketing::handle_create_campaign),
        )
        .route("/campaigns/{id}/send", post(marketing::handle_send_campaign))
        .route("/campaigns/{id}/status", patch(marketing::handle_set_campaign_status))
        .route("/templates", get(marketing::handle_list_templates))
        .route("/templates/generate", post(marketing::handle_generate_template))
        .route("/templates/{id}/test", post(marketing::handle_send_test_email))
        .route(
            "/admin/tenants",
            get(admin::handle_list_tenants).post(admin::handle_create_tenant),
        )
        .route("/admin/tenants/{id}/suspend", post(admin::handle_suspend_tenant))
        .route(
            "/admin/impersonate",
            post(admin::handle_impersonate).delete(admin::handle_end_impersonation),
        )
        .route_layer(middleware::from_fn_with_state(app_state.clone(), session_auth));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", public_routes.merge(protected_routes))
        .route("/api/ws", get(ws_handler))
        .fallback(not_found)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn not_found() -> impl IntoResponse {
    ApplicationError::NotFound("No such route".into())
}
