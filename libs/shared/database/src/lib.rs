pub mod redis;

pub use crate::redis::{KeySpace, RedisClient};
