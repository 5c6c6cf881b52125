use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, instrument, warn};

use booking_queue_cell::{CompletionSignal, HandlerError, MessageHandler};
use shared_config::TimeoutSettings;
use shared_utils::bounded;

use crate::models::{AppointmentError, AppointmentStatus, StatusUpdate};
use crate::store::AppointmentStore;

/// Converges the authoritative record once a country has confirmed.
///
/// The only writer of the COMPLETED transition. Redelivered signals find the
/// appointment already terminal and change nothing.
pub struct CompletionListener {
    store: Arc<dyn AppointmentStore>,
    timeouts: TimeoutSettings,
}

impl CompletionListener {
    pub fn new(store: Arc<dyn AppointmentStore>, timeouts: TimeoutSettings) -> Self {
        Self { store, timeouts }
    }

    #[instrument(
        skip(self, signal),
        fields(
            appointment_id = %signal.appointment_id,
            application_id = %signal.context.application_id,
            transaction_id = %signal.context.transaction_id,
        )
    )]
    pub async fn on_signal(&self, signal: CompletionSignal) -> Result<StatusUpdate, AppointmentError> {
        let update = bounded(
            "store.update_status",
            self.timeouts.store(),
            self.store.update_status(
                signal.appointment_id,
                AppointmentStatus::Completed,
                None,
                Utc::now(),
            ),
        )
        .await?;

        match &update {
            StatusUpdate::Applied(appointment) => info!(
                "Appointment {} completed by {} at {:?}",
                appointment.appointment_id, signal.country_code, appointment.completed_at
            ),
            StatusUpdate::Unchanged(appointment) => info!(
                "Appointment {} already {}, duplicate completion ignored",
                appointment.appointment_id, appointment.status
            ),
            StatusUpdate::NotFound => warn!(
                "Completion signal from {} references unknown appointment {}, dropping",
                signal.country_code, signal.appointment_id
            ),
        }

        Ok(update)
    }
}

#[async_trait]
impl MessageHandler for CompletionListener {
    type Message = CompletionSignal;

    async fn handle(&self, signal: CompletionSignal) -> Result<(), HandlerError> {
        match self.on_signal(signal).await {
            Ok(_) => Ok(()),
            Err(e) if e.class().is_retryable() => Err(HandlerError::Transient(e.to_string())),
            Err(e) => Err(HandlerError::Rejected(e.to_string())),
        }
    }
}
