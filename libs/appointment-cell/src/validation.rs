use shared_models::{CountryCode, InsuredId, SlotId};

use crate::models::{AppointmentError, CreateAppointmentRequest, ValidatedBooking};

/// Edge validation for a booking body. Every failing field is reported.
pub fn validate_booking(request: &CreateAppointmentRequest) -> Result<ValidatedBooking, AppointmentError> {
    let mut problems = Vec::new();

    let insured_id = match request.insured_id.as_deref() {
        None => {
            problems.push("insuredId is required".to_string());
            None
        }
        Some(raw) => InsuredId::parse(raw)
            .map_err(|e| problems.push(e.to_string()))
            .ok(),
    };

    let slot_id = match request.slot_id {
        None => {
            problems.push("slotId is required".to_string());
            None
        }
        Some(raw) => SlotId::new(raw).map_err(|e| problems.push(e.to_string())).ok(),
    };

    let country_code = match request.country_code.as_deref() {
        None => {
            problems.push("countryCode is required".to_string());
            None
        }
        Some(raw) => raw
            .parse::<CountryCode>()
            .map_err(|_| problems.push(format!("countryCode must be one of PE, CL, got {:?}", raw)))
            .ok(),
    };

    match (insured_id, slot_id, country_code) {
        (Some(insured_id), Some(slot_id), Some(country_code)) if problems.is_empty() => Ok(ValidatedBooking {
            insured_id,
            slot_id,
            country_code,
        }),
        _ => Err(AppointmentError::ValidationError(problems.join("; "))),
    }
}
