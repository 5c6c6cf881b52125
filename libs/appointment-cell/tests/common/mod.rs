#![allow(dead_code)]

use std::sync::Arc;

use booking_queue_cell::{CountryRouter, InMemoryQueue};
use schedule_cell::SimulatedScheduleClient;
use shared_config::AppConfig;
use shared_models::{CountryCode, InsuredId, SlotId};
use shared_utils::test_utils::TestConfig;

use appointment_cell::{AppointmentBookingService, InMemoryAppointmentStore, ValidatedBooking};

/// In-memory wiring of the booking side of the saga.
pub struct BookingHarness {
    pub config: AppConfig,
    pub store: Arc<InMemoryAppointmentStore>,
    pub queue: Arc<InMemoryQueue>,
    pub oracle: Arc<SimulatedScheduleClient>,
    pub router: Arc<CountryRouter>,
    pub service: Arc<AppointmentBookingService>,
}

impl BookingHarness {
    pub fn new() -> Self {
        Self::with_config(TestConfig::default().to_app_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let store = Arc::new(InMemoryAppointmentStore::new());
        let queue = Arc::new(InMemoryQueue::new());
        let oracle = Arc::new(SimulatedScheduleClient::new());
        let router = Arc::new(CountryRouter::from_config(queue.clone(), &config));
        let service = Arc::new(AppointmentBookingService::new(
            store.clone(),
            store.clone(),
            oracle.clone(),
            router.clone(),
            &config,
        ));

        Self {
            config,
            store,
            queue,
            oracle,
            router,
            service,
        }
    }
}

pub fn booking(insured_id: &str, slot_id: i64, country_code: CountryCode) -> ValidatedBooking {
    ValidatedBooking {
        insured_id: InsuredId::parse(insured_id).unwrap(),
        slot_id: SlotId::new(slot_id).unwrap(),
        country_code,
    }
}
