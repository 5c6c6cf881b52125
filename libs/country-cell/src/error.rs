use thiserror::Error;

use booking_queue_cell::BookingQueueError;
use shared_models::{CountryCode, ErrorClass, InfraError};

#[derive(Error, Debug)]
pub enum CountryProcessingError {
    #[error("Message for {message} delivered to the {lane} lane")]
    WrongLane { lane: CountryCode, message: CountryCode },

    #[error(transparent)]
    Infrastructure(#[from] InfraError),

    #[error("Completion publish failed: {0}")]
    Publish(#[from] BookingQueueError),
}

impl CountryProcessingError {
    pub fn class(&self) -> ErrorClass {
        match self {
            CountryProcessingError::WrongLane { .. } => ErrorClass::Validation,
            CountryProcessingError::Infrastructure(e) => e.class(),
            CountryProcessingError::Publish(e) => e.class(),
        }
    }
}
