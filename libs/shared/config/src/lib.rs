use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Delivery settings shared by every queue consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    pub max_receive_count: u32,
    pub batch_size: usize,
    pub poll_interval_ms: u64,
    pub visibility_timeout_ms: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_receive_count: 3,
            batch_size: 10,
            poll_interval_ms: 250,
            visibility_timeout_ms: 30_000,
        }
    }
}

/// Upper bounds for every call that leaves the process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeoutSettings {
    pub oracle_ms: u64,
    pub store_ms: u64,
    pub publish_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            oracle_ms: 2_000,
            store_ms: 2_000,
            publish_ms: 2_000,
        }
    }
}

impl TimeoutSettings {
    pub fn oracle(&self) -> Duration {
        Duration::from_millis(self.oracle_ms)
    }

    pub fn store(&self) -> Duration {
        Duration::from_millis(self.store_ms)
    }

    pub fn publish(&self) -> Duration {
        Duration::from_millis(self.publish_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxSettings {
    pub dispatch_interval_ms: u64,
    pub batch_size: usize,
    /// Entries younger than this are left to the synchronous publish path.
    pub grace_ms: u64,
}

impl Default for OutboxSettings {
    fn default() -> Self {
        Self {
            dispatch_interval_ms: 1_000,
            batch_size: 50,
            grace_ms: 2_000,
        }
    }
}

impl OutboxSettings {
    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch_interval_ms)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub application_id: String,
    pub server_port: u16,
    pub redis_url: Option<String>,
    pub key_prefix: String,
    pub routed_countries: Vec<String>,
    pub queue: QueueSettings,
    pub timeouts: TimeoutSettings,
    pub outbox: OutboxSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            application_id: "medical-appointment-api".to_string(),
            server_port: 3000,
            redis_url: None,
            key_prefix: "appointments".to_string(),
            routed_countries: vec!["PE".to_string(), "CL".to_string()],
            queue: QueueSettings::default(),
            timeouts: TimeoutSettings::default(),
            outbox: OutboxSettings::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            application_id: env::var("APPLICATION_ID").unwrap_or_else(|_| {
                warn!("APPLICATION_ID not set, using default");
                defaults.application_id.clone()
            }),
            server_port: parse_or("SERVER_PORT", defaults.server_port),
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.trim().is_empty()),
            key_prefix: env::var("REDIS_KEY_PREFIX").unwrap_or(defaults.key_prefix.clone()),
            routed_countries: env::var("ROUTED_COUNTRIES")
                .map(|raw| {
                    raw.split(',')
                        .map(|code| code.trim().to_uppercase())
                        .filter(|code| !code.is_empty())
                        .collect()
                })
                .unwrap_or_else(|_| defaults.routed_countries.clone()),
            queue: QueueSettings {
                max_receive_count: parse_or("QUEUE_MAX_RECEIVE_COUNT", defaults.queue.max_receive_count),
                batch_size: parse_or("QUEUE_BATCH_SIZE", defaults.queue.batch_size),
                poll_interval_ms: parse_or("QUEUE_POLL_INTERVAL_MS", defaults.queue.poll_interval_ms),
                visibility_timeout_ms: parse_or(
                    "QUEUE_VISIBILITY_TIMEOUT_MS",
                    defaults.queue.visibility_timeout_ms,
                ),
            },
            timeouts: TimeoutSettings {
                oracle_ms: parse_or("ORACLE_TIMEOUT_MS", defaults.timeouts.oracle_ms),
                store_ms: parse_or("STORE_TIMEOUT_MS", defaults.timeouts.store_ms),
                publish_ms: parse_or("PUBLISH_TIMEOUT_MS", defaults.timeouts.publish_ms),
            },
            outbox: OutboxSettings {
                dispatch_interval_ms: parse_or(
                    "OUTBOX_DISPATCH_INTERVAL_MS",
                    defaults.outbox.dispatch_interval_ms,
                ),
                batch_size: parse_or("OUTBOX_BATCH_SIZE", defaults.outbox.batch_size),
                grace_ms: parse_or("OUTBOX_GRACE_MS", defaults.outbox.grace_ms),
            },
        };

        if !config.is_redis_configured() {
            warn!("REDIS_URL not set - stores and queues will be kept in memory");
        }

        config
    }

    pub fn is_redis_configured(&self) -> bool {
        self.redis_url.is_some()
    }
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
