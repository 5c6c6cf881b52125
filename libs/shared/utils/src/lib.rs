pub mod extractor;
pub mod faults;
pub mod test_utils;
pub mod timeout;

pub use extractor::{trace_context_middleware, APPLICATION_ID_HEADER, TRANSACTION_ID_HEADER};
pub use faults::FaultInjector;
pub use timeout::bounded;
