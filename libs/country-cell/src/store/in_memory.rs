use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_models::{CountryCode, InfraError, InsuredId};
use shared_utils::FaultInjector;

use crate::models::CountryRecord;
use crate::store::CountryRecordStore;

pub struct InMemoryCountryStore {
    country: CountryCode,
    records: RwLock<HashMap<Uuid, CountryRecord>>,
    faults: FaultInjector,
}

impl InMemoryCountryStore {
    pub fn new(country: CountryCode) -> Self {
        Self {
            country,
            records: RwLock::new(HashMap::new()),
            faults: FaultInjector::new(),
        }
    }

    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CountryRecordStore for InMemoryCountryStore {
    async fn insert_if_absent(&self, record: &CountryRecord) -> Result<bool, InfraError> {
        self.faults.check("country_store.insert_if_absent").await?;

        let mut records = self.records.write().await;
        if records.contains_key(&record.appointment_id) {
            debug!("{} record {} already present", self.country, record.appointment_id);
            return Ok(false);
        }
        records.insert(record.appointment_id, record.clone());
        Ok(true)
    }

    async fn find_by_id(&self, appointment_id: Uuid) -> Result<Option<CountryRecord>, InfraError> {
        self.faults.check("country_store.find_by_id").await?;
        Ok(self.records.read().await.get(&appointment_id).cloned())
    }

    async fn find_by_insured_id(&self, insured_id: &InsuredId) -> Result<Vec<CountryRecord>, InfraError> {
        self.faults.check("country_store.find_by_insured_id").await?;

        let mut found: Vec<CountryRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|record| &record.insured_id == insured_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn mark_completion_emitted(&self, appointment_id: Uuid, at: DateTime<Utc>) -> Result<(), InfraError> {
        self.faults.check("country_store.mark_completion_emitted").await?;

        if let Some(record) = self.records.write().await.get_mut(&appointment_id) {
            if record.completion_emitted_at.is_none() {
                record.completion_emitted_at = Some(at);
                record.updated_at = at.max(record.updated_at);
            }
        }
        Ok(())
    }
}
