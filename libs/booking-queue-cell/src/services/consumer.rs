use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::services::queue::MessageQueue;
use crate::{BatchReport, ConsumerConfig, Delivery, Disposition, NackOutcome};

/// How a handler wants its delivery settled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Try again later; the delivery is nacked and counts against the
    /// receive limit.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Will never succeed; the delivery goes straight to the dead-letter list.
    #[error("rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    type Message: DeserializeOwned + Send;

    async fn handle(&self, message: Self::Message) -> Result<(), HandlerError>;
}

/// Polls one queue and drives each received delivery through a handler.
///
/// Deliveries in a batch are handled concurrently and settled one by one, so
/// a failing message never causes its neighbours to be redelivered.
pub struct QueueConsumer<H: MessageHandler> {
    queue_name: String,
    queue: Arc<dyn MessageQueue>,
    handler: Arc<H>,
    config: ConsumerConfig,
    is_shutdown: RwLock<bool>,
}

impl<H: MessageHandler> QueueConsumer<H> {
    pub fn new(
        queue_name: impl Into<String>,
        queue: Arc<dyn MessageQueue>,
        handler: Arc<H>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            queue_name: queue_name.into(),
            queue,
            handler,
            config,
            is_shutdown: RwLock::new(false),
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Receives one batch and settles every delivery in it.
    pub async fn poll_once(&self) -> Result<BatchReport, crate::BookingQueueError> {
        let batch = self
            .queue
            .receive(&self.queue_name, self.config.batch_size)
            .await?;

        let mut report = BatchReport {
            received: batch.len(),
            ..BatchReport::default()
        };
        if batch.is_empty() {
            return Ok(report);
        }

        debug!(
            "{} received {} deliveries from {}",
            self.config.consumer_id,
            batch.len(),
            self.queue_name
        );

        let dispositions =
            futures::future::join_all(batch.into_iter().map(|delivery| self.process(delivery))).await;
        for disposition in dispositions {
            report.record(disposition);
        }

        Ok(report)
    }

    #[instrument(skip(self))]
    pub async fn run(&self) {
        info!(
            "Consumer {} listening on {}",
            self.config.consumer_id, self.queue_name
        );

        let poll_interval = self.config.poll_interval();
        let visibility_timeout = self.config.visibility_timeout();
        let mut last_recovery = Instant::now();

        loop {
            if *self.is_shutdown.read().await {
                debug!("Consumer {} received shutdown signal", self.config.consumer_id);
                break;
            }

            if last_recovery.elapsed() >= visibility_timeout {
                if let Err(e) = self
                    .queue
                    .recover_in_flight(&self.queue_name, visibility_timeout)
                    .await
                {
                    warn!("Failed to recover in-flight deliveries on {}: {}", self.queue_name, e);
                }
                last_recovery = Instant::now();
            }

            match self.poll_once().await {
                Ok(report) if report.received > 0 => {
                    debug!("{} batch on {}: {:?}", self.config.consumer_id, self.queue_name, report);
                }
                Ok(_) => sleep(poll_interval).await,
                Err(e) => {
                    error!("Consumer {} failed to poll {}: {}", self.config.consumer_id, self.queue_name, e);
                    sleep(self.config.error_backoff()).await;
                }
            }
        }

        info!("Consumer {} stopped", self.config.consumer_id);
    }

    pub async fn shutdown(&self) {
        *self.is_shutdown.write().await = true;
    }

    async fn process(&self, delivery: Delivery) -> Disposition {
        let delivery_id = delivery.delivery_id;

        let message: H::Message = match serde_json::from_str(&delivery.payload) {
            Ok(message) => message,
            Err(e) => {
                error!(
                    "Delivery {} on {} is not decodable, dead-lettering: {}",
                    delivery_id, self.queue_name, e
                );
                return self.dead_letter(delivery_id).await;
            }
        };

        match self.handler.handle(message).await {
            Ok(()) => match self.queue.ack(&self.queue_name, delivery_id).await {
                Ok(()) => Disposition::Acknowledged,
                Err(e) => {
                    warn!("Failed to ack delivery {} on {}: {}", delivery_id, self.queue_name, e);
                    Disposition::Unsettled
                }
            },
            Err(HandlerError::Rejected(reason)) => {
                error!(
                    "Delivery {} on {} rejected, dead-lettering: {}",
                    delivery_id, self.queue_name, reason
                );
                self.dead_letter(delivery_id).await
            }
            Err(HandlerError::Transient(reason)) => {
                warn!(
                    "Delivery {} on {} failed (attempt {}): {}",
                    delivery_id, self.queue_name, delivery.receive_count, reason
                );
                match self
                    .queue
                    .nack(&self.queue_name, delivery_id, self.config.max_receive_count)
                    .await
                {
                    Ok(NackOutcome::Requeued { .. }) => Disposition::Requeued,
                    Ok(NackOutcome::DeadLettered { .. }) => Disposition::DeadLettered,
                    Err(e) => {
                        warn!("Failed to nack delivery {} on {}: {}", delivery_id, self.queue_name, e);
                        Disposition::Unsettled
                    }
                }
            }
        }
    }

    async fn dead_letter(&self, delivery_id: uuid::Uuid) -> Disposition {
        match self.queue.dead_letter(&self.queue_name, delivery_id).await {
            Ok(()) => Disposition::DeadLettered,
            Err(e) => {
                warn!(
                    "Failed to dead-letter delivery {} on {}: {}",
                    delivery_id, self.queue_name, e
                );
                Disposition::Unsettled
            }
        }
    }
}
