use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::{CountryCode, InsuredId, SlotId, TraceContext};

pub const COMPLETION_QUEUE: &str = "appointments-completed";

pub fn lane_queue_name(country: CountryCode) -> String {
    format!("appointments-{}", country.as_str().to_lowercase())
}

/// Envelope handed to a country lane. Produced once per appointment, may be
/// delivered more than once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutedBookingMessage {
    pub appointment_id: Uuid,
    pub insured_id: InsuredId,
    pub slot_id: SlotId,
    pub country_code: CountryCode,
    pub context: TraceContext,
}

/// Emitted by a country processor once the country-local record exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSignal {
    pub appointment_id: Uuid,
    pub insured_id: InsuredId,
    pub country_code: CountryCode,
    pub processed_at: DateTime<Utc>,
    pub context: TraceContext,
}

/// One physical delivery of a queued payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub delivery_id: Uuid,
    pub payload: String,
    pub receive_count: u32,
    pub enqueued_at: DateTime<Utc>,
    pub received_at: Option<DateTime<Utc>>,
}

impl Delivery {
    pub fn new(payload: String) -> Self {
        Self {
            delivery_id: Uuid::new_v4(),
            payload,
            receive_count: 0,
            enqueued_at: Utc::now(),
            received_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NackOutcome {
    Requeued { receive_count: u32 },
    DeadLettered { receive_count: u32 },
}

/// What happened to a single delivery after its handler ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Acknowledged,
    Requeued,
    DeadLettered,
    /// The broker call itself failed; the visibility timeout will redeliver.
    Unsettled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub received: usize,
    pub acknowledged: usize,
    pub requeued: usize,
    pub dead_lettered: usize,
    pub unsettled: usize,
}

impl BatchReport {
    pub fn record(&mut self, disposition: Disposition) {
        match disposition {
            Disposition::Acknowledged => self.acknowledged += 1,
            Disposition::Requeued => self.requeued += 1,
            Disposition::DeadLettered => self.dead_lettered += 1,
            Disposition::Unsettled => self.unsettled += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDepth {
    pub ready: u64,
    pub in_flight: u64,
    pub dead_lettered: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    pub queue: String,
    pub depth: QueueDepth,
    pub queue_health: QueueHealth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueueHealth {
    Healthy,
    Degraded { reason: String },
}

impl QueueHealth {
    pub fn from_depth(depth: &QueueDepth) -> Self {
        if depth.dead_lettered > 0 {
            QueueHealth::Degraded {
                reason: format!("{} message(s) awaiting manual inspection", depth.dead_lettered),
            }
        } else {
            QueueHealth::Healthy
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    pub consumer_id: String,
    pub batch_size: usize,
    pub max_receive_count: u32,
    pub poll_interval_ms: u64,
    pub visibility_timeout_ms: u64,
    pub error_backoff_ms: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            consumer_id: format!("consumer-{}", Uuid::new_v4()),
            batch_size: 10,
            max_receive_count: 3,
            poll_interval_ms: 250,
            visibility_timeout_ms: 30_000,
            error_backoff_ms: 5_000,
        }
    }
}

impl ConsumerConfig {
    pub fn from_app_config(consumer_id: impl Into<String>, config: &AppConfig) -> Self {
        Self {
            consumer_id: consumer_id.into(),
            batch_size: config.queue.batch_size,
            max_receive_count: config.queue.max_receive_count,
            poll_interval_ms: config.queue.poll_interval_ms,
            visibility_timeout_ms: config.queue.visibility_timeout_ms,
            ..Self::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_millis(self.visibility_timeout_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}
