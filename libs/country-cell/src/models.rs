use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use booking_queue_cell::{CompletionSignal, RoutedBookingMessage};
use schedule_cell::SlotDetails;
use shared_models::{CountryCode, InsuredId, SlotId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountryRecordStatus {
    Confirmed,
}

/// Country-local copy of a booked appointment, enriched with slot details.
///
/// At most one record exists per appointment id in each country store.
/// `completion_emitted_at` is set once the completion signal for the record
/// has been handed to the completion channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryRecord {
    pub appointment_id: Uuid,
    pub insured_id: InsuredId,
    pub country_code: CountryCode,
    pub slot_id: SlotId,
    pub center_id: u64,
    pub center_name: String,
    pub specialty_id: u32,
    pub specialty_name: String,
    pub practitioner_id: u32,
    pub practitioner_name: String,
    pub appointment_date: DateTime<Utc>,
    pub status: CountryRecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: BTreeMap<String, String>,
    pub completion_emitted_at: Option<DateTime<Utc>>,
}

impl CountryRecord {
    pub fn confirmed(message: &RoutedBookingMessage, details: &SlotDetails, now: DateTime<Utc>) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("applicationId".to_string(), message.context.application_id.clone());
        metadata.insert("transactionId".to_string(), message.context.transaction_id.clone());
        metadata.insert("source".to_string(), "appointment-saga".to_string());

        Self {
            appointment_id: message.appointment_id,
            insured_id: message.insured_id.clone(),
            country_code: message.country_code,
            slot_id: message.slot_id,
            center_id: details.center_id,
            center_name: details.center_name.clone(),
            specialty_id: details.specialty_id,
            specialty_name: details.specialty_name.clone(),
            practitioner_id: details.practitioner_id,
            practitioner_name: details.practitioner_name.clone(),
            appointment_date: details.date_time,
            status: CountryRecordStatus::Confirmed,
            created_at: now,
            updated_at: now,
            metadata,
            completion_emitted_at: None,
        }
    }
}

/// Builds the completion signal for `message`, keeping its trace context.
pub fn completion_signal(message: &RoutedBookingMessage, processed_at: DateTime<Utc>) -> CompletionSignal {
    CompletionSignal {
        appointment_id: message.appointment_id,
        insured_id: message.insured_id.clone(),
        country_code: message.country_code,
        processed_at,
        context: message.context.clone(),
    }
}

/// What a single processor run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// New record stored and completion emitted.
    Recorded,
    /// Record already existed without an emitted completion; emitted now.
    CompletionReemitted,
    /// Record and completion already done; nothing changed.
    Duplicate,
}
