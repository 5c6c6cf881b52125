pub mod error;
pub mod models;
pub mod services;
pub mod store;

pub use error::*;
pub use models::*;
pub use services::*;
pub use store::{CountryRecordStore, CountryStores, InMemoryCountryStore, RedisCountryStore};
