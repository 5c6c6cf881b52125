pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod store;
pub mod validation;

// Re-export all models and services for external use
pub use models::*;
pub use router::appointment_routes;
pub use services::*;
pub use store::{AppointmentStore, InMemoryAppointmentStore, OutboxStore, RedisAppointmentStore};
