// libs/appointment-cell/src/services/lifecycle.rs
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::{Appointment, AppointmentError, AppointmentStatus};

/// Computes the result of moving `current` to `to`.
///
/// Returns `Ok(None)` when the appointment is already terminal: redelivered
/// signals must not overwrite the first completion. Moving back to PENDING
/// is never valid.
pub fn apply_transition(
    current: &Appointment,
    to: AppointmentStatus,
    failure_reason: Option<String>,
    at: DateTime<Utc>,
) -> Result<Option<Appointment>, AppointmentError> {
    if to == AppointmentStatus::Pending {
        return Err(AppointmentError::InvalidStatusTransition {
            from: current.status,
            to,
        });
    }

    if current.status.is_terminal() {
        debug!(
            "Appointment {} already {}, ignoring transition to {}",
            current.appointment_id, current.status, to
        );
        return Ok(None);
    }

    let mut next = current.clone();
    next.status = to;
    // updated_at never goes backwards, even with skewed clocks between workers.
    next.updated_at = at.max(current.updated_at);

    match to {
        AppointmentStatus::Completed => {
            next.completed_at = Some(next.updated_at);
            next.failure_reason = None;
        }
        AppointmentStatus::Failed => {
            next.completed_at = None;
            next.failure_reason =
                Some(failure_reason.unwrap_or_else(|| "no reason given".to_string()));
        }
        AppointmentStatus::Pending => {}
    }

    Ok(Some(next))
}
