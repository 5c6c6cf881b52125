use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use shared_models::{InfraError, SlotId};
use shared_utils::FaultInjector;

use crate::models::SlotDetails;

/// Read-only, side-effect-free view of slot availability.
///
/// Implementations do not bound their own latency; callers wrap every call
/// in `shared_utils::bounded`.
#[async_trait]
pub trait ScheduleOracle: Send + Sync {
    async fn get_slot_details(&self, slot_id: SlotId) -> Result<SlotDetails, InfraError>;

    async fn is_available(&self, slot_id: SlotId) -> Result<bool, InfraError> {
        Ok(self.get_slot_details(slot_id).await?.available)
    }
}

/// Deterministic stand-in for the scheduling system.
///
/// Slot details are derived from the slot id alone, relative to an anchor
/// day fixed at construction, so repeated lookups agree with each other.
pub struct SimulatedScheduleClient {
    anchor: NaiveDate,
    unavailable: RwLock<HashSet<SlotId>>,
    faults: FaultInjector,
}

impl Default for SimulatedScheduleClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedScheduleClient {
    pub fn new() -> Self {
        Self::anchored_at(Utc::now().date_naive())
    }

    pub fn anchored_at(anchor: NaiveDate) -> Self {
        Self {
            anchor,
            unavailable: RwLock::new(HashSet::new()),
            faults: FaultInjector::new(),
        }
    }

    pub async fn mark_unavailable(&self, slot_id: SlotId) {
        self.unavailable.write().await.insert(slot_id);
    }

    pub async fn mark_available(&self, slot_id: SlotId) {
        self.unavailable.write().await.remove(&slot_id);
    }

    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    fn describe(&self, slot_id: SlotId, available: bool) -> SlotDetails {
        let slot = slot_id.get();
        let center_id = slot / 100 + 1;
        let specialty_id = ((slot % 100) / 10 + 1) as u32;
        let practitioner_id = (slot % 10 + 1) as u32;

        let day = self.anchor + Duration::days((slot % 30) as i64 + 1);
        let hour = 8 + (slot % 10) as u32;
        let minute = if slot % 2 == 0 { 0 } else { 30 };
        let date_time = day
            .and_hms_opt(hour, minute, 0)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .unwrap_or_else(|| Utc.from_utc_datetime(&day.and_time(Default::default())));

        SlotDetails {
            slot_id,
            center_id,
            center_name: format!("Medical Center {}", center_id),
            specialty_id,
            specialty_name: specialty_name(specialty_id),
            practitioner_id,
            practitioner_name: format!("Dr. Practitioner {}", practitioner_id),
            date_time,
            available,
        }
    }
}

#[async_trait]
impl ScheduleOracle for SimulatedScheduleClient {
    async fn get_slot_details(&self, slot_id: SlotId) -> Result<SlotDetails, InfraError> {
        self.faults.check("schedule.get_slot_details").await?;
        debug!("Resolving slot details for slot {}", slot_id);

        let available = !self.unavailable.read().await.contains(&slot_id);
        let details = self.describe(slot_id, available);

        info!(
            "Slot {} resolved to center {} specialty {} practitioner {}",
            slot_id, details.center_id, details.specialty_id, details.practitioner_id
        );
        Ok(details)
    }
}

fn specialty_name(specialty_id: u32) -> String {
    match specialty_id {
        1 => "General Medicine".to_string(),
        2 => "Pediatrics".to_string(),
        3 => "Cardiology".to_string(),
        4 => "Dermatology".to_string(),
        5 => "Ophthalmology".to_string(),
        6 => "Traumatology".to_string(),
        7 => "Gynecology".to_string(),
        8 => "Neurology".to_string(),
        9 => "Psychiatry".to_string(),
        other => format!("Specialty {}", other),
    }
}
