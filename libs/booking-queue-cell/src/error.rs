use thiserror::Error;
use uuid::Uuid;

use shared_models::{AppError, ErrorClass, InfraError};

#[derive(Error, Debug)]
pub enum BookingQueueError {
    #[error("No processing lane for country {0}")]
    UnsupportedCountry(String),

    #[error("Delivery {delivery_id} is not in flight on queue {queue}")]
    UnknownDelivery { queue: String, delivery_id: Uuid },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error(transparent)]
    Infrastructure(#[from] InfraError),
}

impl BookingQueueError {
    pub fn class(&self) -> ErrorClass {
        match self {
            BookingQueueError::UnsupportedCountry(_) => ErrorClass::Validation,
            BookingQueueError::UnknownDelivery { .. } => ErrorClass::DataIntegrity,
            BookingQueueError::SerializationError(_) => ErrorClass::Validation,
            BookingQueueError::Infrastructure(_) => ErrorClass::Transient,
        }
    }
}

impl From<BookingQueueError> for AppError {
    fn from(err: BookingQueueError) -> Self {
        match err {
            BookingQueueError::UnsupportedCountry(_) => AppError::ValidationError(err.to_string()),
            BookingQueueError::UnknownDelivery { .. } => AppError::NotFound(err.to_string()),
            BookingQueueError::SerializationError(e) => AppError::Internal(e.to_string()),
            BookingQueueError::Infrastructure(e) => AppError::from(e),
        }
    }
}
