pub mod router;
pub mod wiring;

pub use router::create_router;
pub use wiring::{Backends, Saga};
