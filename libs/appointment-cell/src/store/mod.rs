pub mod in_memory;
pub mod redis;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use shared_models::{InfraError, InsuredId};

use crate::models::{Appointment, AppointmentError, AppointmentStatus, OutboxEntry, StatusUpdate};

pub use in_memory::InMemoryAppointmentStore;
pub use self::redis::RedisAppointmentStore;

/// Authoritative appointment records.
///
/// `create` writes the appointment together with its outbox entry in one
/// durable operation. `update_status` is conditional: it only ever moves an
/// appointment out of PENDING, so concurrent or repeated writers converge on
/// the first applied transition.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn create(&self, appointment: &Appointment, intent: &OutboxEntry) -> Result<(), InfraError>;

    async fn find_by_id(&self, appointment_id: Uuid) -> Result<Option<Appointment>, InfraError>;

    /// Most recent first.
    async fn find_by_insured_id(&self, insured_id: &InsuredId) -> Result<Vec<Appointment>, InfraError>;

    async fn update_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        failure_reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<StatusUpdate, AppointmentError>;
}

/// Dispatcher-facing view of the outbox written by [`AppointmentStore::create`].
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Undispatched entries whose next attempt is due at `now`, oldest first.
    async fn due_entries(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<OutboxEntry>, InfraError>;

    async fn mark_dispatched(&self, entry_id: Uuid, at: DateTime<Utc>) -> Result<(), InfraError>;

    async fn mark_retry(
        &self,
        entry_id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), InfraError>;
}
