use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use tracing::debug;
use uuid::Uuid;

use shared_database::redis::{decode, encode, failure};
use shared_database::RedisClient;
use shared_models::{CountryCode, InfraError, InsuredId};

use crate::models::CountryRecord;
use crate::store::CountryRecordStore;

/// Keys live under `country:{cc}:` so each country owns a disjoint namespace:
/// `record:{id}` holds the JSON record and `insured:{insured_id}` a sorted set
/// of ids scored by creation time.
pub struct RedisCountryStore {
    client: RedisClient,
    country: CountryCode,
}

impl RedisCountryStore {
    pub fn new(client: RedisClient, country: CountryCode) -> Self {
        Self { client, country }
    }

    fn record_key(&self, appointment_id: &str) -> String {
        self.client
            .keys()
            .key(&["country", self.country.as_str(), "record", appointment_id])
    }

    fn insured_key(&self, insured_id: &InsuredId) -> String {
        self.client
            .keys()
            .key(&["country", self.country.as_str(), "insured", insured_id.as_str()])
    }
}

#[async_trait]
impl CountryRecordStore for RedisCountryStore {
    async fn insert_if_absent(&self, record: &CountryRecord) -> Result<bool, InfraError> {
        let mut conn = self.client.connection("country_store.insert_if_absent").await?;
        let id = record.appointment_id.to_string();

        let set: Option<String> = redis::cmd("SET")
            .arg(self.record_key(&id))
            .arg(encode("country_store.insert_if_absent", record)?)
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(|e| failure("country_store.insert_if_absent", e))?;

        // The index write is idempotent, so it is repeated on every call to
        // heal a crash between the two commands.
        let _: () = conn
            .zadd(
                self.insured_key(&record.insured_id),
                &id,
                record.created_at.timestamp_micros(),
            )
            .await
            .map_err(|e| failure("country_store.insert_if_absent", e))?;

        let inserted = set.is_some();
        if !inserted {
            debug!("{} record {} already present", self.country, id);
        }
        Ok(inserted)
    }

    async fn find_by_id(&self, appointment_id: Uuid) -> Result<Option<CountryRecord>, InfraError> {
        let mut conn = self.client.connection("country_store.find_by_id").await?;
        let raw: Option<String> = conn
            .get(self.record_key(&appointment_id.to_string()))
            .await
            .map_err(|e| failure("country_store.find_by_id", e))?;
        raw.map(|raw| decode("country_store.find_by_id", &raw)).transpose()
    }

    async fn find_by_insured_id(&self, insured_id: &InsuredId) -> Result<Vec<CountryRecord>, InfraError> {
        let mut conn = self.client.connection("country_store.find_by_insured_id").await?;
        let ids: Vec<String> = conn
            .zrevrange(self.insured_key(insured_id), 0, -1)
            .await
            .map_err(|e| failure("country_store.find_by_insured_id", e))?;

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            let raw: Option<String> = conn
                .get(self.record_key(&id))
                .await
                .map_err(|e| failure("country_store.find_by_insured_id", e))?;
            if let Some(raw) = raw {
                records.push(decode("country_store.find_by_insured_id", &raw)?);
            }
        }
        Ok(records)
    }

    async fn mark_completion_emitted(&self, appointment_id: Uuid, at: DateTime<Utc>) -> Result<(), InfraError> {
        let Some(mut record) = self.find_by_id(appointment_id).await? else {
            return Ok(());
        };
        if record.completion_emitted_at.is_some() {
            return Ok(());
        }

        record.completion_emitted_at = Some(at);
        record.updated_at = at.max(record.updated_at);

        // Concurrent markers write equivalent records; last one wins.
        let mut conn = self.client.connection("country_store.mark_completion_emitted").await?;
        let _: Option<String> = redis::cmd("SET")
            .arg(self.record_key(&appointment_id.to_string()))
            .arg(encode("country_store.mark_completion_emitted", &record)?)
            .arg("XX")
            .query_async(&mut conn)
            .await
            .map_err(|e| failure("country_store.mark_completion_emitted", e))?;
        Ok(())
    }
}
