// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use booking_queue_cell::{BookingQueueError, RoutedBookingMessage};
use shared_models::{AppError, CountryCode, ErrorClass, InfraError, InsuredId, SlotId, TraceContext};

// ==============================================================================
// APPOINTMENT AGGREGATE
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Completed,
    Failed,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AppointmentStatus::Pending)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Authoritative record of a booking.
///
/// `completed_at` is set only when the status is `Completed` and
/// `failure_reason` only when it is `Failed`. The trace fields are captured at
/// creation and never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub appointment_id: Uuid,
    pub insured_id: InsuredId,
    pub slot_id: SlotId,
    pub country_code: CountryCode,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub application_id: String,
    pub transaction_id: String,
}

impl Appointment {
    pub fn pending(booking: &ValidatedBooking, context: &TraceContext, now: DateTime<Utc>) -> Self {
        Self {
            appointment_id: Uuid::new_v4(),
            insured_id: booking.insured_id.clone(),
            slot_id: booking.slot_id,
            country_code: booking.country_code,
            status: AppointmentStatus::Pending,
            created_at: now,
            updated_at: now,
            completed_at: None,
            failure_reason: None,
            application_id: context.application_id.clone(),
            transaction_id: context.transaction_id.clone(),
        }
    }

    pub fn trace_context(&self) -> TraceContext {
        TraceContext {
            application_id: self.application_id.clone(),
            transaction_id: self.transaction_id.clone(),
            timestamp: self.created_at,
        }
    }

    pub fn routed_message(&self) -> RoutedBookingMessage {
        RoutedBookingMessage {
            appointment_id: self.appointment_id,
            insured_id: self.insured_id.clone(),
            slot_id: self.slot_id,
            country_code: self.country_code,
            context: self.trace_context(),
        }
    }
}

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

/// Raw booking body. Fields are optional so that missing ones surface as
/// validation errors with a field name instead of a deserializer message.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub insured_id: Option<String>,
    pub slot_id: Option<i64>,
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedBooking {
    pub insured_id: InsuredId,
    pub slot_id: SlotId,
    pub country_code: CountryCode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentReceipt {
    pub appointment_id: Uuid,
    pub status: AppointmentStatus,
    pub transaction_id: String,
}

// ==============================================================================
// OUTBOX
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboxStatus {
    Pending,
    Dispatched,
}

/// Routing intent written in the same operation as its appointment.
///
/// One entry per appointment, keyed by the appointment id. The dispatcher
/// only picks up entries whose `next_attempt_at` has passed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
    pub entry_id: Uuid,
    pub message: RoutedBookingMessage,
    pub status: OutboxStatus,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub next_attempt_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl OutboxEntry {
    pub fn for_appointment(appointment: &Appointment, grace: chrono::Duration) -> Self {
        Self {
            entry_id: appointment.appointment_id,
            message: appointment.routed_message(),
            status: OutboxStatus::Pending,
            attempts: 0,
            created_at: appointment.created_at,
            next_attempt_at: appointment.created_at + grace,
            dispatched_at: None,
            last_error: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == OutboxStatus::Pending && self.next_attempt_at <= now
    }
}

/// Result of a conditional status write.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    /// The appointment moved out of PENDING.
    Applied(Appointment),
    /// Already terminal; nothing was written.
    Unchanged(Appointment),
    NotFound,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Slot {slot_id} is not available")]
    SlotUnavailable { slot_id: SlotId },

    #[error("Country {0} is not supported")]
    UnsupportedCountry(String),

    #[error("Appointment {0} not found")]
    NotFound(Uuid),

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error(transparent)]
    Infrastructure(#[from] InfraError),
}

impl AppointmentError {
    pub fn class(&self) -> ErrorClass {
        match self {
            AppointmentError::ValidationError(_)
            | AppointmentError::UnsupportedCountry(_)
            | AppointmentError::InvalidStatusTransition { .. } => ErrorClass::Validation,
            AppointmentError::SlotUnavailable { .. } => ErrorClass::BusinessRejection,
            AppointmentError::NotFound(_) | AppointmentError::SerializationError(_) => {
                ErrorClass::DataIntegrity
            }
            AppointmentError::Infrastructure(_) => ErrorClass::Transient,
        }
    }
}

impl From<BookingQueueError> for AppointmentError {
    fn from(err: BookingQueueError) -> Self {
        match err {
            BookingQueueError::UnsupportedCountry(country) => AppointmentError::UnsupportedCountry(country),
            BookingQueueError::Infrastructure(e) => AppointmentError::Infrastructure(e),
            BookingQueueError::SerializationError(e) => AppointmentError::SerializationError(e.to_string()),
            other => AppointmentError::Infrastructure(InfraError::unavailable("queue", other)),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::UnsupportedCountry(_) => AppError::ValidationError(err.to_string()),
            AppointmentError::SlotUnavailable { .. } => AppError::Conflict {
                code: "SLOT_UNAVAILABLE",
                message: err.to_string(),
            },
            AppointmentError::NotFound(_) => AppError::NotFound(err.to_string()),
            AppointmentError::InvalidStatusTransition { .. } => AppError::BadRequest(err.to_string()),
            AppointmentError::SerializationError(msg) => AppError::Internal(msg),
            AppointmentError::Infrastructure(e) => AppError::from(e),
        }
    }
}
