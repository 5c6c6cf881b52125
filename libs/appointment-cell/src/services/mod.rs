pub mod booking;
pub mod completion;
pub mod lifecycle;
pub mod outbox;

pub use booking::AppointmentBookingService;
pub use completion::CompletionListener;
pub use lifecycle::apply_transition;
pub use outbox::{DispatchReport, OutboxDispatcher};
