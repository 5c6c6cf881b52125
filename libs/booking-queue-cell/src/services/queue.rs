use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_utils::FaultInjector;

use crate::{BookingQueueError, Delivery, NackOutcome, QueueDepth};

/// At-least-once queue semantics shared by every lane and the completion
/// channel.
///
/// A received delivery stays in flight until it is acked or nacked. A nack
/// puts it back on the ready list until it has been received
/// `max_receive_count` times, after which it is moved to the queue's
/// dead-letter list. In-flight deliveries older than the visibility timeout
/// are handed out again by [`MessageQueue::recover_in_flight`].
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn send(&self, queue: &str, payload: String) -> Result<Uuid, BookingQueueError>;

    async fn receive(&self, queue: &str, max: usize) -> Result<Vec<Delivery>, BookingQueueError>;

    async fn ack(&self, queue: &str, delivery_id: Uuid) -> Result<(), BookingQueueError>;

    async fn nack(
        &self,
        queue: &str,
        delivery_id: Uuid,
        max_receive_count: u32,
    ) -> Result<NackOutcome, BookingQueueError>;

    async fn dead_letter(&self, queue: &str, delivery_id: Uuid) -> Result<(), BookingQueueError>;

    async fn recover_in_flight(
        &self,
        queue: &str,
        visibility_timeout: Duration,
    ) -> Result<usize, BookingQueueError>;

    async fn dead_letters(&self, queue: &str) -> Result<Vec<Delivery>, BookingQueueError>;

    async fn depth(&self, queue: &str) -> Result<QueueDepth, BookingQueueError>;
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<Delivery>,
    in_flight: HashMap<Uuid, Delivery>,
    dead: Vec<Delivery>,
}

/// Process-local queue used for tests and single-node runs without Redis.
#[derive(Default)]
pub struct InMemoryQueue {
    queues: Mutex<HashMap<String, QueueState>>,
    faults: FaultInjector,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Failure injection for `send`, which is what publishers observe.
    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    fn unknown(queue: &str, delivery_id: Uuid) -> BookingQueueError {
        BookingQueueError::UnknownDelivery {
            queue: queue.to_string(),
            delivery_id,
        }
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn send(&self, queue: &str, payload: String) -> Result<Uuid, BookingQueueError> {
        self.faults.check("queue.send").await?;

        let delivery = Delivery::new(payload);
        let delivery_id = delivery.delivery_id;

        let mut queues = self.queues.lock().await;
        queues.entry(queue.to_string()).or_default().ready.push_back(delivery);

        debug!("Delivery {} enqueued on {}", delivery_id, queue);
        Ok(delivery_id)
    }

    async fn receive(&self, queue: &str, max: usize) -> Result<Vec<Delivery>, BookingQueueError> {
        let mut queues = self.queues.lock().await;
        let state = queues.entry(queue.to_string()).or_default();

        let mut batch = Vec::new();
        while batch.len() < max {
            let Some(mut delivery) = state.ready.pop_front() else {
                break;
            };
            delivery.receive_count += 1;
            delivery.received_at = Some(Utc::now());
            state.in_flight.insert(delivery.delivery_id, delivery.clone());
            batch.push(delivery);
        }

        Ok(batch)
    }

    async fn ack(&self, queue: &str, delivery_id: Uuid) -> Result<(), BookingQueueError> {
        let mut queues = self.queues.lock().await;
        let state = queues.entry(queue.to_string()).or_default();

        state
            .in_flight
            .remove(&delivery_id)
            .map(|_| ())
            .ok_or_else(|| Self::unknown(queue, delivery_id))
    }

    async fn nack(
        &self,
        queue: &str,
        delivery_id: Uuid,
        max_receive_count: u32,
    ) -> Result<NackOutcome, BookingQueueError> {
        let mut queues = self.queues.lock().await;
        let state = queues.entry(queue.to_string()).or_default();

        let delivery = state
            .in_flight
            .remove(&delivery_id)
            .ok_or_else(|| Self::unknown(queue, delivery_id))?;
        let receive_count = delivery.receive_count;

        if receive_count >= max_receive_count {
            warn!(
                "Delivery {} on {} exhausted {} attempts, moving to dead-letter",
                delivery_id, queue, receive_count
            );
            state.dead.push(delivery);
            Ok(NackOutcome::DeadLettered { receive_count })
        } else {
            state.ready.push_back(delivery);
            Ok(NackOutcome::Requeued { receive_count })
        }
    }

    async fn dead_letter(&self, queue: &str, delivery_id: Uuid) -> Result<(), BookingQueueError> {
        let mut queues = self.queues.lock().await;
        let state = queues.entry(queue.to_string()).or_default();

        let delivery = state
            .in_flight
            .remove(&delivery_id)
            .ok_or_else(|| Self::unknown(queue, delivery_id))?;
        state.dead.push(delivery);
        Ok(())
    }

    async fn recover_in_flight(
        &self,
        queue: &str,
        visibility_timeout: Duration,
    ) -> Result<usize, BookingQueueError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(visibility_timeout).unwrap_or_else(|_| chrono::Duration::zero());

        let mut queues = self.queues.lock().await;
        let state = queues.entry(queue.to_string()).or_default();

        let expired: Vec<Uuid> = state
            .in_flight
            .values()
            .filter(|delivery| delivery.received_at.map_or(true, |at| at <= cutoff))
            .map(|delivery| delivery.delivery_id)
            .collect();

        for delivery_id in &expired {
            if let Some(delivery) = state.in_flight.remove(delivery_id) {
                state.ready.push_back(delivery);
            }
        }

        if !expired.is_empty() {
            info!("Recovered {} expired in-flight deliveries on {}", expired.len(), queue);
        }
        Ok(expired.len())
    }

    async fn dead_letters(&self, queue: &str) -> Result<Vec<Delivery>, BookingQueueError> {
        let queues = self.queues.lock().await;
        Ok(queues.get(queue).map(|state| state.dead.clone()).unwrap_or_default())
    }

    async fn depth(&self, queue: &str) -> Result<QueueDepth, BookingQueueError> {
        let queues = self.queues.lock().await;
        Ok(queues
            .get(queue)
            .map(|state| QueueDepth {
                ready: state.ready.len() as u64,
                in_flight: state.in_flight.len() as u64,
                dead_lettered: state.dead.len() as u64,
            })
            .unwrap_or_default())
    }
}
