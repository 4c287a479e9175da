use core_lib::CoreError;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// Process configuration read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: SocketAddr,
    pub log_level: Level,
    pub database_url: Option<String>,
    pub backend: Option<BackendSettings>,
    pub redis_url: Option<String>,
    pub webhook_base_url: Option<String>,
    pub webhook_timeout: Duration,
    pub query_stale_after: Duration,
    pub session_ttl: Duration,
    pub cache_capacity: u64,
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub url: String,
    pub api_key: String,
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(name: &str, default: T) -> Result<T, CoreError>
where
    T::Err: std::fmt::Display,
{
    match optional(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e| CoreError::Configuration(format!("{} is invalid ({}): {}", name, raw, e))),
        None => Ok(default),
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, CoreError> {
        let backend = match (optional("BACKEND_URL"), optional("BACKEND_API_KEY")) {
            (Some(url), Some(api_key)) => Some(BackendSettings { url, api_key }),
            (Some(_), None) => {
                return Err(CoreError::Configuration(
                    "BACKEND_API_KEY is required when BACKEND_URL is set".into(),
                ))
            }
            _ => None,
        };

        Ok(Self {
            bind_addr: parsed("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            log_level: parsed("LOG_LEVEL", Level::INFO)?,
            database_url: optional("DATABASE_URL"),
            backend,
            redis_url: optional("REDIS_URL"),
            webhook_base_url: optional("WEBHOOK_BASE_URL"),
            webhook_timeout: Duration::from_secs(parsed("WEBHOOK_TIMEOUT_SECS", 30)?),
            query_stale_after: Duration::from_secs(parsed("QUERY_STALE_SECS", 30)?),
            session_ttl: Duration::from_secs(parsed("SESSION_TTL_SECS", 86_400)?),
            cache_capacity: parsed("CACHE_CAPACITY", 10_000)?,
        })
    }
}
