use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_redis::Connection;
use redis::AsyncCommands;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::redis::failure;
use shared_database::RedisClient;

use crate::services::queue::MessageQueue;
use crate::{BookingQueueError, Delivery, NackOutcome, QueueDepth};

/// Moves an id from one list to another only if it was still on the first.
/// Returns 1 on a move, 0 when the id was already gone.
const MOVE_IF_PRESENT: &str = r"
if redis.call('LREM', KEYS[1], 1, ARGV[1]) > 0 then
    redis.call('LPUSH', KEYS[2], ARGV[1])
    return 1
end
return 0
";

/// Redis-backed queue.
///
/// Each queue keeps three lists of delivery ids (`ready`, `inflight`, `dlq`)
/// and one hash per delivery holding the payload and its receive count.
/// Receiving moves an id from `ready` to `inflight` atomically with
/// `RPOPLPUSH`, so a crashed consumer never loses a message.
pub struct RedisQueue {
    client: RedisClient,
}

impl RedisQueue {
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }

    fn ready_key(&self, queue: &str) -> String {
        self.client.keys().key(&["queue", queue, "ready"])
    }

    fn in_flight_key(&self, queue: &str) -> String {
        self.client.keys().key(&["queue", queue, "inflight"])
    }

    fn dead_letter_key(&self, queue: &str) -> String {
        self.client.keys().key(&["queue", queue, "dlq"])
    }

    fn delivery_key(&self, delivery_id: &str) -> String {
        self.client.keys().key(&["delivery", delivery_id])
    }

    async fn load_delivery(
        &self,
        conn: &mut Connection,
        delivery_id: &str,
    ) -> Result<Option<Delivery>, BookingQueueError> {
        let key = self.delivery_key(delivery_id);
        let (payload, receive_count, enqueued_at, received_at): (
            Option<String>,
            Option<u32>,
            Option<String>,
            Option<String>,
        ) = redis::cmd("HMGET")
            .arg(&key)
            .arg(&["payload", "receive_count", "enqueued_at", "received_at"])
            .query_async(conn)
            .await
            .map_err(|e| failure("queue.load_delivery", e))?;

        let (Some(payload), Ok(delivery_id)) = (payload, Uuid::parse_str(delivery_id)) else {
            return Ok(None);
        };

        Ok(Some(Delivery {
            delivery_id,
            payload,
            receive_count: receive_count.unwrap_or(0),
            enqueued_at: enqueued_at.as_deref().and_then(parse_timestamp).unwrap_or_else(Utc::now),
            received_at: received_at.as_deref().and_then(parse_timestamp),
        }))
    }

    async fn take_in_flight(
        &self,
        conn: &mut Connection,
        queue: &str,
        delivery_id: Uuid,
    ) -> Result<(), BookingQueueError> {
        let removed: i64 = conn
            .lrem(self.in_flight_key(queue), 1, delivery_id.to_string())
            .await
            .map_err(|e| failure("queue.take_in_flight", e))?;

        if removed == 0 {
            return Err(unknown_delivery(queue, delivery_id));
        }
        Ok(())
    }

    /// Atomically moves an in-flight id onto `destination`. A delivery that
    /// was acked or recovered in the meantime is left alone.
    async fn move_in_flight(
        &self,
        conn: &mut Connection,
        operation: &str,
        queue: &str,
        id: &str,
        destination: &str,
    ) -> Result<bool, BookingQueueError> {
        let moved: i64 = redis::Script::new(MOVE_IF_PRESENT)
            .key(self.in_flight_key(queue))
            .key(destination)
            .arg(id)
            .invoke_async(conn)
            .await
            .map_err(|e| failure(operation, e))?;
        Ok(moved > 0)
    }
}

fn unknown_delivery(queue: &str, delivery_id: Uuid) -> BookingQueueError {
    BookingQueueError::UnknownDelivery {
        queue: queue.to_string(),
        delivery_id,
    }
}

#[async_trait]
impl MessageQueue for RedisQueue {
    async fn send(&self, queue: &str, payload: String) -> Result<Uuid, BookingQueueError> {
        let mut conn = self.client.connection("queue.send").await?;
        let delivery = Delivery::new(payload);
        let id = delivery.delivery_id.to_string();

        let _: () = redis::pipe()
            .atomic()
            .hset_multiple(
                self.delivery_key(&id),
                &[
                    ("payload", delivery.payload.as_str()),
                    ("receive_count", "0"),
                    ("enqueued_at", &delivery.enqueued_at.to_rfc3339()),
                ],
            )
            .ignore()
            .lpush(self.ready_key(queue), &id)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| failure("queue.send", e))?;

        debug!("Delivery {} enqueued on {}", id, queue);
        Ok(delivery.delivery_id)
    }

    async fn receive(&self, queue: &str, max: usize) -> Result<Vec<Delivery>, BookingQueueError> {
        let mut conn = self.client.connection("queue.receive").await?;
        let ready = self.ready_key(queue);
        let in_flight = self.in_flight_key(queue);

        let mut batch = Vec::new();
        while batch.len() < max {
            let id: Option<String> = conn
                .rpoplpush(&ready, &in_flight)
                .await
                .map_err(|e| failure("queue.receive", e))?;
            let Some(id) = id else {
                break;
            };

            let key = self.delivery_key(&id);
            let _: () = redis::pipe()
                .atomic()
                .hincr(&key, "receive_count", 1)
                .ignore()
                .hset(&key, "received_at", Utc::now().to_rfc3339())
                .ignore()
                .query_async(&mut conn)
                .await
                .map_err(|e| failure("queue.receive", e))?;

            match self.load_delivery(&mut conn, &id).await? {
                Some(delivery) => batch.push(delivery),
                None => {
                    warn!("Delivery {} on {} has no payload, discarding", id, queue);
                    let _: i64 = conn
                        .lrem(&in_flight, 1, &id)
                        .await
                        .map_err(|e| failure("queue.receive", e))?;
                }
            }
        }

        Ok(batch)
    }

    async fn ack(&self, queue: &str, delivery_id: Uuid) -> Result<(), BookingQueueError> {
        let mut conn = self.client.connection("queue.ack").await?;
        self.take_in_flight(&mut conn, queue, delivery_id).await?;

        let _: () = conn
            .del(self.delivery_key(&delivery_id.to_string()))
            .await
            .map_err(|e| failure("queue.ack", e))?;
        Ok(())
    }

    async fn nack(
        &self,
        queue: &str,
        delivery_id: Uuid,
        max_receive_count: u32,
    ) -> Result<NackOutcome, BookingQueueError> {
        let mut conn = self.client.connection("queue.nack").await?;
        let id = delivery_id.to_string();

        let receive_count: Option<u32> = conn
            .hget(self.delivery_key(&id), "receive_count")
            .await
            .map_err(|e| failure("queue.nack", e))?;
        let receive_count = receive_count.unwrap_or(max_receive_count);

        let exhausted = receive_count >= max_receive_count;
        let destination = if exhausted {
            self.dead_letter_key(queue)
        } else {
            self.ready_key(queue)
        };
        if !self.move_in_flight(&mut conn, "queue.nack", queue, &id, &destination).await? {
            return Err(unknown_delivery(queue, delivery_id));
        }

        if exhausted {
            warn!(
                "Delivery {} on {} exhausted {} attempts, moving to dead-letter",
                id, queue, receive_count
            );
            Ok(NackOutcome::DeadLettered { receive_count })
        } else {
            Ok(NackOutcome::Requeued { receive_count })
        }
    }

    async fn dead_letter(&self, queue: &str, delivery_id: Uuid) -> Result<(), BookingQueueError> {
        let mut conn = self.client.connection("queue.dead_letter").await?;
        let destination = self.dead_letter_key(queue);

        if !self
            .move_in_flight(&mut conn, "queue.dead_letter", queue, &delivery_id.to_string(), &destination)
            .await?
        {
            return Err(unknown_delivery(queue, delivery_id));
        }
        Ok(())
    }

    async fn recover_in_flight(
        &self,
        queue: &str,
        visibility_timeout: Duration,
    ) -> Result<usize, BookingQueueError> {
        let mut conn = self.client.connection("queue.recover_in_flight").await?;
        let cutoff = Utc::now()
            - chrono::Duration::from_std(visibility_timeout).unwrap_or_else(|_| chrono::Duration::zero());

        let in_flight = self.in_flight_key(queue);
        let ready = self.ready_key(queue);
        let ids: Vec<String> = conn
            .lrange(&in_flight, 0, -1)
            .await
            .map_err(|e| failure("queue.recover_in_flight", e))?;

        let mut recovered = 0;
        for id in ids {
            let received_at: Option<String> = conn
                .hget(self.delivery_key(&id), "received_at")
                .await
                .map_err(|e| failure("queue.recover_in_flight", e))?;

            let expired = received_at
                .as_deref()
                .and_then(parse_timestamp)
                .map_or(true, |at| at <= cutoff);
            if !expired {
                continue;
            }

            if self
                .move_in_flight(&mut conn, "queue.recover_in_flight", queue, &id, &ready)
                .await?
            {
                recovered += 1;
            }
        }

        if recovered > 0 {
            info!("Recovered {} expired in-flight deliveries on {}", recovered, queue);
        }
        Ok(recovered)
    }

    async fn dead_letters(&self, queue: &str) -> Result<Vec<Delivery>, BookingQueueError> {
        let mut conn = self.client.connection("queue.dead_letters").await?;
        let ids: Vec<String> = conn
            .lrange(self.dead_letter_key(queue), 0, -1)
            .await
            .map_err(|e| failure("queue.dead_letters", e))?;

        let mut deliveries = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(delivery) = self.load_delivery(&mut conn, &id).await? {
                deliveries.push(delivery);
            }
        }
        Ok(deliveries)
    }

    async fn depth(&self, queue: &str) -> Result<QueueDepth, BookingQueueError> {
        let mut conn = self.client.connection("queue.depth").await?;
        let (ready, in_flight, dead_lettered): (u64, u64, u64) = redis::pipe()
            .llen(self.ready_key(queue))
            .llen(self.in_flight_key(queue))
            .llen(self.dead_letter_key(queue))
            .query_async(&mut conn)
            .await
            .map_err(|e| failure("queue.depth", e))?;

        Ok(QueueDepth {
            ready,
            in_flight,
            dead_lettered,
        })
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}
