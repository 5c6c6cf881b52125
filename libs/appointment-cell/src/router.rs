// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::services::booking::AppointmentBookingService;

/// Expects a `TraceContext` extension, inserted by
/// `shared_utils::trace_context_middleware` at the application level.
pub fn appointment_routes(service: Arc<AppointmentBookingService>) -> Router {
    Router::new()
        .route("/", post(handlers::create_appointment))
        .route("/{insured_id}", get(handlers::list_insured_appointments))
        .with_state(service)
}
