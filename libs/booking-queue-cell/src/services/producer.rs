use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use shared_utils::bounded;

use crate::services::queue::MessageQueue;
use crate::{BookingQueueError, CompletionSignal, COMPLETION_QUEUE};

/// Publisher side of the completion channel that every country processor
/// writes to and the completion listener drains.
pub struct CompletionChannel {
    queue: Arc<dyn MessageQueue>,
    publish_timeout: Duration,
}

impl CompletionChannel {
    pub fn new(queue: Arc<dyn MessageQueue>, publish_timeout: Duration) -> Self {
        Self {
            queue,
            publish_timeout,
        }
    }

    pub async fn publish(&self, signal: &CompletionSignal) -> Result<Uuid, BookingQueueError> {
        let payload = serde_json::to_string(signal)?;
        let delivery_id = bounded(
            "completion.publish",
            self.publish_timeout,
            self.queue.send(COMPLETION_QUEUE, payload),
        )
        .await?;

        info!(
            "Completion emitted for appointment {} from {} (transaction {})",
            signal.appointment_id, signal.country_code, signal.context.transaction_id
        );
        Ok(delivery_id)
    }
}
