// Declare modules within the adapters directory
pub mod http_webhooks;
pub mod in_memory_cache;
pub mod in_memory_event_bus;
pub mod in_memory_store;
pub mod postgres_store;
pub mod redis_cache;
pub mod redis_event_bus;
pub mod rest_backend;
pub mod store_auth;

pub use http_webhooks::{HttpWebhooks, UnconfiguredWebhooks};
pub use in_memory_cache::InMemoryCache;
pub use in_memory_event_bus::InMemoryEventBus;
pub use in_memory_store::InMemoryStore;
pub use postgres_store::PostgresStore;
pub use redis_cache::RedisCache;
pub use redis_event_bus::RedisEventBus;
pub use rest_backend::RestBackend;
pub use store_auth::StoreAuth;
