// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use booking_queue_cell::CountryRouter;
use schedule_cell::ScheduleOracle;
use shared_config::{AppConfig, OutboxSettings, TimeoutSettings};
use shared_models::{InsuredId, TraceContext};
use shared_utils::bounded;

use crate::models::{
    Appointment, AppointmentError, AppointmentReceipt, OutboxEntry, ValidatedBooking,
};
use crate::services::outbox::retry_at;
use crate::store::{AppointmentStore, OutboxStore};

/// Synchronous half of the saga: accept a booking, record it as PENDING and
/// hand it to the country router.
pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    outbox: Arc<dyn OutboxStore>,
    oracle: Arc<dyn ScheduleOracle>,
    router: Arc<CountryRouter>,
    timeouts: TimeoutSettings,
    outbox_settings: OutboxSettings,
}

impl AppointmentBookingService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        outbox: Arc<dyn OutboxStore>,
        oracle: Arc<dyn ScheduleOracle>,
        router: Arc<CountryRouter>,
        config: &AppConfig,
    ) -> Self {
        Self {
            store,
            outbox,
            oracle,
            router,
            timeouts: config.timeouts,
            outbox_settings: config.outbox.clone(),
        }
    }

    /// Books an appointment.
    ///
    /// Nothing is written unless the country has a lane and the slot is
    /// available. Once the appointment and its outbox entry are stored the
    /// call succeeds even if the immediate publish fails; the outbox
    /// dispatcher retries it.
    #[instrument(
        skip(self, booking, context),
        fields(
            application_id = %context.application_id,
            transaction_id = %context.transaction_id,
            insured_id = %booking.insured_id,
            slot_id = %booking.slot_id,
            country = %booking.country_code,
        )
    )]
    pub async fn submit(
        &self,
        booking: ValidatedBooking,
        context: TraceContext,
    ) -> Result<AppointmentReceipt, AppointmentError> {
        self.router.lane_for(booking.country_code)?;

        let available = bounded(
            "oracle.is_available",
            self.timeouts.oracle(),
            self.oracle.is_available(booking.slot_id),
        )
        .await?;
        if !available {
            warn!("Slot {} is not available, rejecting booking", booking.slot_id);
            return Err(AppointmentError::SlotUnavailable {
                slot_id: booking.slot_id,
            });
        }

        let appointment = Appointment::pending(&booking, &context, Utc::now());
        let grace =
            chrono::Duration::from_std(self.outbox_settings.grace()).unwrap_or_else(|_| chrono::Duration::zero());
        let intent = OutboxEntry::for_appointment(&appointment, grace);

        bounded(
            "store.create",
            self.timeouts.store(),
            self.store.create(&appointment, &intent),
        )
        .await?;
        info!("Appointment {} created in PENDING", appointment.appointment_id);

        self.publish_now(&intent).await;

        Ok(AppointmentReceipt {
            appointment_id: appointment.appointment_id,
            status: appointment.status,
            transaction_id: context.transaction_id,
        })
    }

    pub async fn find(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        bounded(
            "store.find_by_id",
            self.timeouts.store(),
            self.store.find_by_id(appointment_id),
        )
        .await?
        .ok_or(AppointmentError::NotFound(appointment_id))
    }

    pub async fn list_for_insured(&self, insured_id: &InsuredId) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments = bounded(
            "store.find_by_insured_id",
            self.timeouts.store(),
            self.store.find_by_insured_id(insured_id),
        )
        .await?;
        Ok(appointments)
    }

    async fn publish_now(&self, intent: &OutboxEntry) {
        let now = Utc::now();
        match self.router.publish(&intent.message).await {
            Ok(_) => {
                let marked = bounded(
                    "outbox.mark_dispatched",
                    self.timeouts.store(),
                    self.outbox.mark_dispatched(intent.entry_id, now),
                )
                .await;
                if let Err(e) = marked {
                    // Worst case the dispatcher publishes again; processors are idempotent.
                    warn!("Failed to mark outbox entry {} dispatched: {}", intent.entry_id, e);
                }
            }
            Err(e) => {
                warn!(
                    "Immediate publish of appointment {} failed, leaving it to the outbox: {}",
                    intent.entry_id, e
                );
                let next_attempt_at = retry_at(now, intent.attempts + 1, &self.outbox_settings)
                    .max(intent.next_attempt_at);
                let recorded = bounded(
                    "outbox.mark_retry",
                    self.timeouts.store(),
                    self.outbox.mark_retry(intent.entry_id, &e.to_string(), next_attempt_at),
                )
                .await;
                if let Err(e) = recorded {
                    warn!("Failed to record publish failure for {}: {}", intent.entry_id, e);
                }
            }
        }
    }
}
