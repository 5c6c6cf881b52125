pub mod context;
pub mod domain;
pub mod error;

pub use context::TraceContext;
pub use domain::{CountryCode, DomainParseError, InsuredId, SlotId};
pub use error::{AppError, ErrorClass, InfraError};
