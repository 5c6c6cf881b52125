//! In-process harness for full-saga scenarios.
//!
//! Assembles the saga over in-memory backends, drives it through the HTTP
//! router and runs the asynchronous workers one round at a time so every
//! scenario is deterministic.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use appointment_cell::InMemoryAppointmentStore;
use appointment_saga_api::{create_router, Backends, Saga};
use booking_queue_cell::InMemoryQueue;
use country_cell::{CountryStores, InMemoryCountryStore};
use schedule_cell::SimulatedScheduleClient;
use shared_models::CountryCode;
use shared_utils::test_utils::TestConfig;

const MAX_PUMP_ROUNDS: usize = 20;

pub struct SagaTestApp {
    pub saga: Saga,
    pub oracle: Arc<SimulatedScheduleClient>,
    pub store: Arc<InMemoryAppointmentStore>,
    pub queue: Arc<InMemoryQueue>,
    pub pe_store: Arc<InMemoryCountryStore>,
    pub cl_store: Arc<InMemoryCountryStore>,
    app: Router,
}

impl SagaTestApp {
    pub fn new() -> Self {
        Self::with_config(TestConfig::default())
    }

    pub fn with_config(test_config: TestConfig) -> Self {
        let store = Arc::new(InMemoryAppointmentStore::new());
        let queue = Arc::new(InMemoryQueue::new());
        let pe_store = Arc::new(InMemoryCountryStore::new(CountryCode::Pe));
        let cl_store = Arc::new(InMemoryCountryStore::new(CountryCode::Cl));
        let oracle = Arc::new(SimulatedScheduleClient::new());

        let backends = Backends {
            appointments: store.clone(),
            outbox: store.clone(),
            queue: queue.clone(),
            country_stores: CountryStores {
                pe: pe_store.clone(),
                cl: cl_store.clone(),
            },
        };
        let saga = Saga::assemble(test_config.to_app_config(), backends, oracle.clone());
        let app = create_router(&saga);

        Self {
            saga,
            oracle,
            store,
            queue,
            pe_store,
            cl_store,
            app,
        }
    }

    pub async fn request(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    pub async fn book(&self, body: Value, transaction_id: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/appointments")
            .header("content-type", "application/json")
            .header("Application-ID", "saga-tests")
            .header("Transaction-ID", transaction_id)
            .body(Body::from(body.to_string()))
            .unwrap();
        self.request(request).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.request(request).await
    }

    /// Runs the outbox, every lane consumer and the completion consumer
    /// until a full round moves nothing. Returns the deliveries handled.
    pub async fn pump(&self) -> usize {
        let mut handled = 0;
        for _ in 0..MAX_PUMP_ROUNDS {
            let mut moved = 0;

            if let Ok(report) = self.saga.dispatcher.dispatch_once().await {
                moved += report.dispatched;
            }
            for consumer in &self.saga.lane_consumers {
                if let Ok(report) = consumer.poll_once().await {
                    moved += report.received;
                }
            }
            if let Ok(report) = self.saga.completion_consumer.poll_once().await {
                moved += report.received;
            }

            if moved == 0 {
                break;
            }
            handled += moved;
        }
        handled
    }
}

impl Default for SagaTestApp {
    fn default() -> Self {
        Self::new()
    }
}
