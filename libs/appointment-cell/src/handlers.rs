// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::info;

use shared_models::{AppError, InsuredId, TraceContext};

use crate::models::CreateAppointmentRequest;
use crate::services::booking::AppointmentBookingService;
use crate::validation::validate_booking;

/// Accept a booking and start the saga
pub async fn create_appointment(
    State(service): State<Arc<AppointmentBookingService>>,
    Extension(context): Extension<TraceContext>,
    payload: Result<Json<CreateAppointmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(request) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let booking = validate_booking(&request)?;

    info!(
        "Booking request for insured {} slot {} in {} (transaction {})",
        booking.insured_id, booking.slot_id, booking.country_code, context.transaction_id
    );

    let receipt = service.submit(booking, context).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Appointment request received and is being processed",
            "data": receipt,
        })),
    ))
}

/// All appointments of an insured person, most recent first
pub async fn list_insured_appointments(
    State(service): State<Arc<AppointmentBookingService>>,
    Path(insured_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let insured_id = InsuredId::parse(&insured_id).map_err(|e| AppError::ValidationError(e.to_string()))?;
    let appointments = service.list_for_insured(&insured_id).await?;

    Ok(Json(json!({
        "success": true,
        "total": appointments.len(),
        "data": appointments,
    })))
}
