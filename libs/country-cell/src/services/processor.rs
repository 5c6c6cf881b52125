use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, instrument, warn};

use booking_queue_cell::{CompletionChannel, HandlerError, MessageHandler, RoutedBookingMessage};
use schedule_cell::ScheduleOracle;
use shared_config::TimeoutSettings;
use shared_models::CountryCode;
use shared_utils::bounded;

use crate::error::CountryProcessingError;
use crate::models::{completion_signal, CountryRecord, ProcessOutcome};
use crate::store::{CountryRecordStore, CountryStores};

/// Saga participant for one country lane.
///
/// Resolves slot details, stores the country record with insert-if-absent
/// semantics and emits the completion signal. Any failure propagates so the
/// delivery is retried; redelivery of a fully processed message is a no-op.
pub struct CountryProcessor {
    country: CountryCode,
    oracle: Arc<dyn ScheduleOracle>,
    store: Arc<dyn CountryRecordStore>,
    completions: Arc<CompletionChannel>,
    timeouts: TimeoutSettings,
}

impl CountryProcessor {
    pub fn new(
        country: CountryCode,
        oracle: Arc<dyn ScheduleOracle>,
        stores: &CountryStores,
        completions: Arc<CompletionChannel>,
        timeouts: TimeoutSettings,
    ) -> Self {
        Self {
            country,
            oracle,
            store: stores.for_country(country),
            completions,
            timeouts,
        }
    }

    pub fn country(&self) -> CountryCode {
        self.country
    }

    #[instrument(
        skip(self, message),
        fields(
            country = %self.country,
            appointment_id = %message.appointment_id,
            application_id = %message.context.application_id,
            transaction_id = %message.context.transaction_id,
        )
    )]
    pub async fn process(&self, message: RoutedBookingMessage) -> Result<ProcessOutcome, CountryProcessingError> {
        if message.country_code != self.country {
            return Err(CountryProcessingError::WrongLane {
                lane: self.country,
                message: message.country_code,
            });
        }

        let existing = bounded(
            "country_store.find_by_id",
            self.timeouts.store(),
            self.store.find_by_id(message.appointment_id),
        )
        .await?;

        let outcome = match existing {
            Some(record) if record.completion_emitted_at.is_some() => {
                info!("Appointment {} already recorded in {}, skipping", message.appointment_id, self.country);
                return Ok(ProcessOutcome::Duplicate);
            }
            Some(_) => {
                warn!(
                    "Appointment {} recorded in {} without a completion, re-emitting",
                    message.appointment_id, self.country
                );
                ProcessOutcome::CompletionReemitted
            }
            None => self.record(&message).await?,
        };

        if outcome == ProcessOutcome::Duplicate {
            return Ok(outcome);
        }

        self.emit_completion(&message).await?;
        Ok(outcome)
    }

    async fn record(&self, message: &RoutedBookingMessage) -> Result<ProcessOutcome, CountryProcessingError> {
        let details = bounded(
            "oracle.get_slot_details",
            self.timeouts.oracle(),
            self.oracle.get_slot_details(message.slot_id),
        )
        .await?;

        let record = CountryRecord::confirmed(message, &details, Utc::now());
        let inserted = bounded(
            "country_store.insert_if_absent",
            self.timeouts.store(),
            self.store.insert_if_absent(&record),
        )
        .await?;

        if inserted {
            info!(
                "Appointment {} confirmed in {} at {} with {} ({})",
                message.appointment_id,
                self.country,
                record.center_name,
                record.practitioner_name,
                record.appointment_date
            );
            return Ok(ProcessOutcome::Recorded);
        }

        // A concurrent delivery of the same message won the insert and owns
        // the emit. If it dies first, its delivery comes back and re-emits.
        info!(
            "Appointment {} inserted concurrently in {}, leaving the completion to the winner",
            message.appointment_id, self.country
        );
        Ok(ProcessOutcome::Duplicate)
    }

    async fn emit_completion(&self, message: &RoutedBookingMessage) -> Result<(), CountryProcessingError> {
        let processed_at = Utc::now();
        self.completions
            .publish(&completion_signal(message, processed_at))
            .await?;

        bounded(
            "country_store.mark_completion_emitted",
            self.timeouts.store(),
            self.store.mark_completion_emitted(message.appointment_id, processed_at),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for CountryProcessor {
    type Message = RoutedBookingMessage;

    async fn handle(&self, message: RoutedBookingMessage) -> Result<(), HandlerError> {
        match self.process(message).await {
            Ok(_) => Ok(()),
            Err(e) if e.class().is_retryable() => Err(HandlerError::Transient(e.to_string())),
            Err(e) => Err(HandlerError::Rejected(e.to_string())),
        }
    }
}
