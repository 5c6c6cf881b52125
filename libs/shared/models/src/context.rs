use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_APPLICATION_ID: &str = "medical-appointment-api";

/// Correlation token carried by every request, message and event of a saga.
///
/// The transaction id is minted once at the edge and copied verbatim into
/// every routed message and completion signal, so a single appointment can
/// be followed across all hops. Missing fields in an inbound payload are
/// filled in rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceContext {
    #[serde(default = "default_application_id")]
    pub application_id: String,
    #[serde(default = "fresh_transaction_id")]
    pub transaction_id: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl TraceContext {
    pub fn new(application_id: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            transaction_id: fresh_transaction_id(),
            timestamp: Utc::now(),
        }
    }

    /// Builds a context from optional inbound values, defaulting what is absent.
    pub fn from_parts(application_id: Option<&str>, transaction_id: Option<&str>) -> Self {
        Self::from_parts_or(DEFAULT_APPLICATION_ID, application_id, transaction_id)
    }

    /// Like [`TraceContext::from_parts`], with the caller's own fallback
    /// application id.
    pub fn from_parts_or(
        default_application_id: &str,
        application_id: Option<&str>,
        transaction_id: Option<&str>,
    ) -> Self {
        let application_id = application_id
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(default_application_id)
            .to_string();
        let transaction_id = transaction_id
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .unwrap_or_else(fresh_transaction_id);

        Self {
            application_id,
            transaction_id,
            timestamp: Utc::now(),
        }
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new(DEFAULT_APPLICATION_ID)
    }
}

fn default_application_id() -> String {
    DEFAULT_APPLICATION_ID.to_string()
}

fn fresh_transaction_id() -> String {
    Uuid::new_v4().to_string()
}
