use deadpool_redis::{Config, Connection, Pool, Runtime};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_models::InfraError;

/// Namespaces every key under the configured prefix so several deployments
/// (or test runs) can share one Redis.
#[derive(Debug, Clone)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn key(&self, parts: &[&str]) -> String {
        let mut key = self.prefix.clone();
        for part in parts {
            key.push(':');
            key.push_str(part);
        }
        key
    }
}

/// Pooled Redis access shared by every Redis-backed store and queue.
#[derive(Clone)]
pub struct RedisClient {
    pool: Pool,
    keys: KeySpace,
}

impl RedisClient {
    pub async fn connect(config: &AppConfig) -> Result<Self, InfraError> {
        let redis_url = config
            .redis_url
            .clone()
            .unwrap_or_else(|| "redis://localhost:6379".to_string());

        let pool = Config::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| InfraError::unavailable("redis.create_pool", e))?;

        let client = Self {
            pool,
            keys: KeySpace::new(config.key_prefix.clone()),
        };

        // Test connection
        let mut conn = client.connection("redis.ping").await?;
        let _: String = ::redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| failure("redis.ping", e))?;
        info!("Redis connection pool initialized");

        Ok(client)
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    pub async fn connection(&self, operation: &str) -> Result<Connection, InfraError> {
        debug!("Acquiring Redis connection for {}", operation);
        self.pool
            .get()
            .await
            .map_err(|e| InfraError::unavailable(operation, e))
    }
}

pub fn failure(operation: &str, err: ::redis::RedisError) -> InfraError {
    InfraError::unavailable(operation, err)
}

pub fn encode<T: Serialize>(operation: &str, value: &T) -> Result<String, InfraError> {
    serde_json::to_string(value).map_err(|e| InfraError::unavailable(operation, e))
}

pub fn decode<T: DeserializeOwned>(operation: &str, raw: &str) -> Result<T, InfraError> {
    serde_json::from_str(raw).map_err(|e| InfraError::unavailable(operation, e))
}
