use axum::{routing::get, Router};

use crate::handlers::{get_dead_letters, get_queue_stats, QueueAdminState};

pub fn create_booking_queue_router(state: QueueAdminState) -> Router {
    Router::new()
        .route("/stats", get(get_queue_stats))
        .route("/{queue}/dead-letters", get(get_dead_letters))
        .with_state(state)
}
