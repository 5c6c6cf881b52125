use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shared_models::SlotId;

/// Everything the oracle knows about a bookable slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotDetails {
    pub slot_id: SlotId,
    pub center_id: u64,
    pub center_name: String,
    pub specialty_id: u32,
    pub specialty_name: String,
    pub practitioner_id: u32,
    pub practitioner_name: String,
    pub date_time: DateTime<Utc>,
    pub available: bool,
}
