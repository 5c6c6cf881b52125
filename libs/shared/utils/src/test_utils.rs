use shared_config::{AppConfig, OutboxSettings, QueueSettings, TimeoutSettings};
use shared_models::TraceContext;

/// Configuration tuned for fast, in-memory test runs.
pub struct TestConfig {
    pub max_receive_count: u32,
    pub timeout_ms: u64,
    pub routed_countries: Vec<String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            max_receive_count: 3,
            timeout_ms: 500,
            routed_countries: vec!["PE".to_string(), "CL".to_string()],
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            application_id: "test-suite".to_string(),
            server_port: 0,
            redis_url: None,
            key_prefix: "test".to_string(),
            routed_countries: self.routed_countries.clone(),
            queue: QueueSettings {
                max_receive_count: self.max_receive_count,
                batch_size: 10,
                poll_interval_ms: 10,
                visibility_timeout_ms: 1_000,
            },
            timeouts: TimeoutSettings {
                oracle_ms: self.timeout_ms,
                store_ms: self.timeout_ms,
                publish_ms: self.timeout_ms,
            },
            outbox: OutboxSettings {
                dispatch_interval_ms: 10,
                batch_size: 50,
                grace_ms: 0,
            },
        }
    }
}

pub fn test_context(transaction_id: &str) -> TraceContext {
    TraceContext::from_parts(Some("test-suite"), Some(transaction_id))
}
