use axum::{middleware, routing::get, Router};

use appointment_cell::appointment_routes;
use booking_queue_cell::{create_booking_queue_router, QueueAdminState};
use shared_utils::trace_context_middleware;

use crate::wiring::Saga;

pub fn create_router(saga: &Saga) -> Router {
    let queue_admin = QueueAdminState::new(saga.backends.queue.clone(), saga.queue_names());

    Router::new()
        .route("/", get(|| async { "Appointment saga API is running!" }))
        .nest("/appointments", appointment_routes(saga.booking.clone()))
        .nest("/queues", create_booking_queue_router(queue_admin))
        .layer(middleware::from_fn_with_state(
            saga.config.application_id.clone(),
            trace_context_middleware,
        ))
}
