pub mod in_memory;
pub mod redis;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use shared_database::RedisClient;
use shared_models::{CountryCode, InfraError, InsuredId};

use crate::models::CountryRecord;

pub use in_memory::InMemoryCountryStore;
pub use self::redis::RedisCountryStore;

/// One country's record store. Never shared between countries.
#[async_trait]
pub trait CountryRecordStore: Send + Sync {
    /// Stores `record` unless one with the same appointment id exists.
    /// Returns whether this call inserted it.
    async fn insert_if_absent(&self, record: &CountryRecord) -> Result<bool, InfraError>;

    async fn find_by_id(&self, appointment_id: Uuid) -> Result<Option<CountryRecord>, InfraError>;

    /// Most recent first.
    async fn find_by_insured_id(&self, insured_id: &InsuredId) -> Result<Vec<CountryRecord>, InfraError>;

    async fn mark_completion_emitted(&self, appointment_id: Uuid, at: DateTime<Utc>) -> Result<(), InfraError>;
}

/// The per-country stores, one field per supported country.
#[derive(Clone)]
pub struct CountryStores {
    pub pe: Arc<dyn CountryRecordStore>,
    pub cl: Arc<dyn CountryRecordStore>,
}

impl CountryStores {
    pub fn in_memory() -> Self {
        Self {
            pe: Arc::new(InMemoryCountryStore::new(CountryCode::Pe)),
            cl: Arc::new(InMemoryCountryStore::new(CountryCode::Cl)),
        }
    }

    pub fn redis(client: &RedisClient) -> Self {
        Self {
            pe: Arc::new(RedisCountryStore::new(client.clone(), CountryCode::Pe)),
            cl: Arc::new(RedisCountryStore::new(client.clone(), CountryCode::Cl)),
        }
    }

    pub fn for_country(&self, country: CountryCode) -> Arc<dyn CountryRecordStore> {
        match country {
            CountryCode::Pe => self.pe.clone(),
            CountryCode::Cl => self.cl.clone(),
        }
    }
}
