use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::CountryCode;
use shared_utils::bounded;

use crate::services::queue::MessageQueue;
use crate::{lane_queue_name, BookingQueueError, RoutedBookingMessage};

/// Fan-out from the booking command to one lane per supported country.
///
/// A message is delivered only to the lane of its `country_code`; countries
/// without a lane are refused before anything is published.
pub struct CountryRouter {
    queue: Arc<dyn MessageQueue>,
    lanes: BTreeMap<CountryCode, String>,
    publish_timeout: Duration,
}

impl CountryRouter {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        countries: &[CountryCode],
        publish_timeout: Duration,
    ) -> Self {
        let lanes = countries
            .iter()
            .map(|country| (*country, lane_queue_name(*country)))
            .collect();

        Self {
            queue,
            lanes,
            publish_timeout,
        }
    }

    pub fn from_config(queue: Arc<dyn MessageQueue>, config: &AppConfig) -> Self {
        let countries: Vec<CountryCode> = config
            .routed_countries
            .iter()
            .filter_map(|raw| match raw.parse::<CountryCode>() {
                Ok(country) => Some(country),
                Err(e) => {
                    warn!("Ignoring routed country {:?}: {}", raw, e);
                    None
                }
            })
            .collect();

        info!("Country router lanes: {:?}", countries);
        Self::new(queue, &countries, config.timeouts.publish())
    }

    pub fn lane_for(&self, country: CountryCode) -> Result<&str, BookingQueueError> {
        self.lanes
            .get(&country)
            .map(String::as_str)
            .ok_or_else(|| BookingQueueError::UnsupportedCountry(country.to_string()))
    }

    pub fn lanes(&self) -> impl Iterator<Item = (CountryCode, &str)> + '_ {
        self.lanes.iter().map(|(country, lane)| (*country, lane.as_str()))
    }

    #[instrument(skip(self, message), fields(appointment_id = %message.appointment_id, country = %message.country_code))]
    pub async fn publish(&self, message: &RoutedBookingMessage) -> Result<Uuid, BookingQueueError> {
        let lane = self.lane_for(message.country_code)?;
        let payload = serde_json::to_string(message)?;

        let delivery_id = bounded(
            "router.publish",
            self.publish_timeout,
            self.queue.send(lane, payload),
        )
        .await?;

        info!(
            "Routed appointment {} to {} (transaction {})",
            message.appointment_id, lane, message.context.transaction_id
        );
        Ok(delivery_id)
    }
}
