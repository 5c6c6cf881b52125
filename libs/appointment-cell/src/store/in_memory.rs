use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_models::{InfraError, InsuredId};
use shared_utils::FaultInjector;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, OutboxEntry, OutboxStatus, StatusUpdate};
use crate::services::lifecycle::apply_transition;
use crate::store::{AppointmentStore, OutboxStore};

#[derive(Default)]
struct StoreState {
    // Insertion sequence breaks ties between equal creation timestamps.
    appointments: HashMap<Uuid, (u64, Appointment)>,
    by_insured: HashMap<InsuredId, Vec<Uuid>>,
    outbox: HashMap<Uuid, OutboxEntry>,
    next_seq: u64,
}

/// Single-process store used by tests and by the API when no Redis is
/// configured. Every operation passes through the fault injector first.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    state: RwLock<StoreState>,
    faults: FaultInjector,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    pub async fn outbox_entry(&self, entry_id: Uuid) -> Option<OutboxEntry> {
        self.state.read().await.outbox.get(&entry_id).cloned()
    }

    pub async fn count(&self) -> usize {
        self.state.read().await.appointments.len()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn create(&self, appointment: &Appointment, intent: &OutboxEntry) -> Result<(), InfraError> {
        self.faults.check("store.create").await?;

        let mut state = self.state.write().await;
        let seq = state.next_seq;
        state.next_seq += 1;

        state
            .appointments
            .insert(appointment.appointment_id, (seq, appointment.clone()));
        state
            .by_insured
            .entry(appointment.insured_id.clone())
            .or_default()
            .push(appointment.appointment_id);
        state.outbox.insert(intent.entry_id, intent.clone());

        debug!("Stored appointment {} with outbox entry", appointment.appointment_id);
        Ok(())
    }

    async fn find_by_id(&self, appointment_id: Uuid) -> Result<Option<Appointment>, InfraError> {
        self.faults.check("store.find_by_id").await?;

        let state = self.state.read().await;
        Ok(state
            .appointments
            .get(&appointment_id)
            .map(|(_, appointment)| appointment.clone()))
    }

    async fn find_by_insured_id(&self, insured_id: &InsuredId) -> Result<Vec<Appointment>, InfraError> {
        self.faults.check("store.find_by_insured_id").await?;

        let state = self.state.read().await;
        let mut found: Vec<&(u64, Appointment)> = state
            .by_insured
            .get(insured_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.appointments.get(id))
            .collect();

        found.sort_by(|(a_seq, a), (b_seq, b)| {
            b.created_at.cmp(&a.created_at).then(b_seq.cmp(a_seq))
        });

        Ok(found.into_iter().map(|(_, appointment)| appointment.clone()).collect())
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        failure_reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<StatusUpdate, AppointmentError> {
        self.faults.check("store.update_status").await?;

        let mut state = self.state.write().await;
        let Some((_, current)) = state.appointments.get_mut(&appointment_id) else {
            return Ok(StatusUpdate::NotFound);
        };

        match apply_transition(current, status, failure_reason, at)? {
            Some(next) => {
                *current = next.clone();
                Ok(StatusUpdate::Applied(next))
            }
            None => Ok(StatusUpdate::Unchanged(current.clone())),
        }
    }
}

#[async_trait]
impl OutboxStore for InMemoryAppointmentStore {
    async fn due_entries(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<OutboxEntry>, InfraError> {
        self.faults.check("outbox.due_entries").await?;

        let state = self.state.read().await;
        let mut due: Vec<OutboxEntry> = state
            .outbox
            .values()
            .filter(|entry| entry.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|entry| entry.created_at);
        due.truncate(limit);
        Ok(due)
    }

    async fn mark_dispatched(&self, entry_id: Uuid, at: DateTime<Utc>) -> Result<(), InfraError> {
        self.faults.check("outbox.mark_dispatched").await?;

        let mut state = self.state.write().await;
        if let Some(entry) = state.outbox.get_mut(&entry_id) {
            entry.status = OutboxStatus::Dispatched;
            entry.attempts += 1;
            entry.dispatched_at = Some(at);
            entry.last_error = None;
        }
        Ok(())
    }

    async fn mark_retry(
        &self,
        entry_id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), InfraError> {
        self.faults.check("outbox.mark_retry").await?;

        let mut state = self.state.write().await;
        if let Some(entry) = state.outbox.get_mut(&entry_id) {
            entry.attempts += 1;
            entry.next_attempt_at = next_attempt_at;
            entry.last_error = Some(error.to_string());
        }
        Ok(())
    }
}
