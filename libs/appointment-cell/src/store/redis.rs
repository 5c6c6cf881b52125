use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::redis::{decode, encode, failure};
use shared_database::RedisClient;
use shared_models::{InfraError, InsuredId};

use crate::models::{Appointment, AppointmentError, AppointmentStatus, OutboxEntry, OutboxStatus, StatusUpdate};
use crate::services::lifecycle::apply_transition;
use crate::store::{AppointmentStore, OutboxStore};

const MAX_CAS_ATTEMPTS: usize = 5;

/// Redis layout:
/// - `appointment:{id}` JSON document
/// - `insured:{insured_id}` sorted set of ids scored by creation time (µs)
/// - `outbox:{id}` JSON outbox entry
/// - `outbox:due` sorted set of undispatched ids scored by next attempt (ms)
pub struct RedisAppointmentStore {
    client: RedisClient,
}

impl RedisAppointmentStore {
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }

    fn appointment_key(&self, appointment_id: &Uuid) -> String {
        self.client.keys().key(&["appointment", &appointment_id.to_string()])
    }

    fn insured_key(&self, insured_id: &InsuredId) -> String {
        self.client.keys().key(&["insured", insured_id.as_str()])
    }

    fn outbox_key(&self, entry_id: &Uuid) -> String {
        self.client.keys().key(&["outbox", &entry_id.to_string()])
    }

    fn outbox_due_key(&self) -> String {
        self.client.keys().key(&["outbox", "due"])
    }

    async fn load_entry(
        &self,
        conn: &mut deadpool_redis::Connection,
        entry_id: &Uuid,
        operation: &str,
    ) -> Result<Option<OutboxEntry>, InfraError> {
        let raw: Option<String> = conn
            .get(self.outbox_key(entry_id))
            .await
            .map_err(|e| failure(operation, e))?;
        raw.map(|raw| decode(operation, &raw)).transpose()
    }
}

#[async_trait]
impl AppointmentStore for RedisAppointmentStore {
    async fn create(&self, appointment: &Appointment, intent: &OutboxEntry) -> Result<(), InfraError> {
        let mut conn = self.client.connection("store.create").await?;

        let _: () = redis::pipe()
            .atomic()
            .set(
                self.appointment_key(&appointment.appointment_id),
                encode("store.create", appointment)?,
            )
            .ignore()
            .zadd(
                self.insured_key(&appointment.insured_id),
                appointment.appointment_id.to_string(),
                appointment.created_at.timestamp_micros(),
            )
            .ignore()
            .set(self.outbox_key(&intent.entry_id), encode("store.create", intent)?)
            .ignore()
            .zadd(
                self.outbox_due_key(),
                intent.entry_id.to_string(),
                intent.next_attempt_at.timestamp_millis(),
            )
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| failure("store.create", e))?;

        debug!("Stored appointment {} with outbox entry", appointment.appointment_id);
        Ok(())
    }

    async fn find_by_id(&self, appointment_id: Uuid) -> Result<Option<Appointment>, InfraError> {
        let mut conn = self.client.connection("store.find_by_id").await?;
        let raw: Option<String> = conn
            .get(self.appointment_key(&appointment_id))
            .await
            .map_err(|e| failure("store.find_by_id", e))?;

        raw.map(|raw| decode("store.find_by_id", &raw)).transpose()
    }

    async fn find_by_insured_id(&self, insured_id: &InsuredId) -> Result<Vec<Appointment>, InfraError> {
        let mut conn = self.client.connection("store.find_by_insured_id").await?;
        let ids: Vec<String> = conn
            .zrevrange(self.insured_key(insured_id), 0, -1)
            .await
            .map_err(|e| failure("store.find_by_insured_id", e))?;

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids
            .iter()
            .map(|id| self.client.keys().key(&["appointment", id]))
            .collect();
        let documents: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(|e| failure("store.find_by_insured_id", e))?;

        documents
            .into_iter()
            .flatten()
            .map(|raw| decode("store.find_by_insured_id", &raw))
            .collect()
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        failure_reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<StatusUpdate, AppointmentError> {
        let mut conn = self.client.connection("store.update_status").await?;
        let key = self.appointment_key(&appointment_id);

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let _: () = redis::cmd("WATCH")
                .arg(&key)
                .query_async(&mut conn)
                .await
                .map_err(|e| failure("store.update_status", e))?;

            let raw: Option<String> = conn
                .get(&key)
                .await
                .map_err(|e| failure("store.update_status", e))?;

            let Some(raw) = raw else {
                let _: () = redis::cmd("UNWATCH")
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| failure("store.update_status", e))?;
                return Ok(StatusUpdate::NotFound);
            };
            let current: Appointment = decode("store.update_status", &raw)?;

            let next = match apply_transition(&current, status, failure_reason.clone(), at) {
                Ok(Some(next)) => next,
                outcome => {
                    let _: () = redis::cmd("UNWATCH")
                        .query_async(&mut conn)
                        .await
                        .map_err(|e| failure("store.update_status", e))?;
                    return outcome.map(|_| StatusUpdate::Unchanged(current));
                }
            };

            // EXEC replies nil when the watched key changed underneath us.
            let reply: redis::Value = redis::pipe()
                .atomic()
                .set(&key, encode("store.update_status", &next)?)
                .query_async(&mut conn)
                .await
                .map_err(|e| failure("store.update_status", e))?;

            if reply != redis::Value::Nil {
                return Ok(StatusUpdate::Applied(next));
            }
            warn!(
                "Concurrent write on appointment {}, retrying status update (attempt {})",
                appointment_id, attempt
            );
        }

        Err(InfraError::unavailable(
            "store.update_status",
            format!("gave up after {} contended attempts", MAX_CAS_ATTEMPTS),
        )
        .into())
    }
}

#[async_trait]
impl OutboxStore for RedisAppointmentStore {
    async fn due_entries(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<OutboxEntry>, InfraError> {
        let mut conn = self.client.connection("outbox.due_entries").await?;
        let ids: Vec<String> = conn
            .zrangebyscore_limit(
                self.outbox_due_key(),
                "-inf",
                now.timestamp_millis(),
                0,
                limit as isize,
            )
            .await
            .map_err(|e| failure("outbox.due_entries", e))?;

        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            let Ok(entry_id) = Uuid::parse_str(&id) else {
                warn!("Skipping malformed outbox id {}", id);
                continue;
            };
            if let Some(entry) = self.load_entry(&mut conn, &entry_id, "outbox.due_entries").await? {
                if entry.status == OutboxStatus::Pending {
                    entries.push(entry);
                }
            }
        }
        Ok(entries)
    }

    async fn mark_dispatched(&self, entry_id: Uuid, at: DateTime<Utc>) -> Result<(), InfraError> {
        let mut conn = self.client.connection("outbox.mark_dispatched").await?;
        let Some(mut entry) = self.load_entry(&mut conn, &entry_id, "outbox.mark_dispatched").await? else {
            return Ok(());
        };

        entry.status = OutboxStatus::Dispatched;
        entry.attempts += 1;
        entry.dispatched_at = Some(at);
        entry.last_error = None;

        let _: () = redis::pipe()
            .atomic()
            .set(self.outbox_key(&entry_id), encode("outbox.mark_dispatched", &entry)?)
            .ignore()
            .zrem(self.outbox_due_key(), entry_id.to_string())
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| failure("outbox.mark_dispatched", e))?;
        Ok(())
    }

    async fn mark_retry(
        &self,
        entry_id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), InfraError> {
        let mut conn = self.client.connection("outbox.mark_retry").await?;
        let Some(mut entry) = self.load_entry(&mut conn, &entry_id, "outbox.mark_retry").await? else {
            return Ok(());
        };

        entry.attempts += 1;
        entry.next_attempt_at = next_attempt_at;
        entry.last_error = Some(error.to_string());

        let _: () = redis::pipe()
            .atomic()
            .set(self.outbox_key(&entry_id), encode("outbox.mark_retry", &entry)?)
            .ignore()
            .zadd(
                self.outbox_due_key(),
                entry_id.to_string(),
                next_attempt_at.timestamp_millis(),
            )
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| failure("outbox.mark_retry", e))?;
        Ok(())
    }
}
