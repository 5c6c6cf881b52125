pub mod consumer;
pub mod country_router;
pub mod producer;
pub mod queue;
pub mod redis_queue;

pub use consumer::*;
pub use country_router::*;
pub use producer::*;
pub use queue::*;
pub use redis_queue::*;
