use crate::{Cache, CoreError};
use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use tracing::info;

/// Redis implementation of the Cache port. Sessions and query results are
/// shared by every API replica pointing at the same server.
#[derive(Clone, Debug)]
pub struct RedisCache {
    connection: MultiplexedConnection,
    default_ttl_seconds: u64,
}

impl RedisCache {
    pub async fn new(redis_url: &str, default_ttl_seconds: u64) -> Result<Self, CoreError> {
        let client = Client::open(redis_url)
            .map_err(|e| CoreError::Configuration(format!("Invalid Redis URL: {}", e)))?;
        let connection = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(CoreError::infra)?;
        info!("Redis cache connected.");
        Ok(Self {
            connection,
            default_ttl_seconds,
        })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError> {
        let mut conn = self.connection.clone();
        conn.get(key).await.map_err(CoreError::infra)
    }

    async fn set(&self, key: &str, value: &[u8], ttl_seconds: Option<u64>) -> Result<(), CoreError> {
        let mut conn = self.connection.clone();
        // SETEX rejects a zero TTL
        let ttl = ttl_seconds.unwrap_or(self.default_ttl_seconds).max(1);
        conn.set_ex(key, value, ttl).await.map_err(CoreError::infra)
    }

    async fn delete(&self, key: &str) -> Result<(), CoreError> {
        let mut conn = self.connection.clone();
        conn.del(key)
            .await
            .map(|_: usize| ())
            .map_err(CoreError::infra)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use testcontainers::runners::AsyncRunner;
    use testcontainers::ContainerAsync;
    use testcontainers_modules::redis::Redis as RedisImage;
    use tokio::time::sleep;

    async fn setup_redis(default_ttl_seconds: u64) -> (RedisCache, ContainerAsync<RedisImage>) {
        let node = RedisImage::default()
            .start()
            .await
            .expect("Failed to start Redis container");
        let port = node
            .get_host_port_ipv4(6379)
            .await
            .expect("Failed to get host port");
        let cache = RedisCache::new(&format!("redis://localhost:{}/", port), default_ttl_seconds)
            .await
            .expect("Failed to connect to testcontainer Redis");
        (cache, node)
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_set_get_delete_redis() {
        let (cache, _node) = setup_redis(3600).await;
        let key = "sess:redis";
        let value = b"{\"user_id\":\"u\"}".to_vec();

        cache.set(key, &value, None).await.expect("SET failed");
        assert_eq!(cache.get(key).await.expect("GET failed"), Some(value));

        cache.delete(key).await.expect("DEL failed");
        assert_eq!(cache.get(key).await.expect("GET failed"), None);
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_set_with_ttl_redis() {
        let (cache, _node) = setup_redis(3600).await;
        cache.set("q:v1:deals:acme:g0:all", b"[]", Some(1)).await.expect("SET failed");
        assert!(cache.get("q:v1:deals:acme:g0:all").await.unwrap().is_some());

        sleep(Duration::from_millis(1100)).await;
        assert_eq!(cache.get("q:v1:deals:acme:g0:all").await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_set_with_default_ttl_redis() {
        let (cache, _node) = setup_redis(1).await;
        cache.set("default_ttl", b"v", None).await.expect("SET failed");

        sleep(Duration::from_millis(1100)).await;
        assert_eq!(cache.get("default_ttl").await.unwrap(), None);
    }
}
