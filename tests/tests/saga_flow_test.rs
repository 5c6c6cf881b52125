use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use appointment_cell::AppointmentStatus;
use booking_queue_cell::{lane_queue_name, CompletionSignal, MessageQueue, COMPLETION_QUEUE};
use country_cell::{CountryRecordStore, CountryRecordStatus};
use saga_integration_tests::SagaTestApp;
use shared_models::{CountryCode, SlotId};
use shared_utils::test_utils::TestConfig;

fn booking_body(insured_id: &str, slot_id: i64, country_code: &str) -> serde_json::Value {
    json!({"insuredId": insured_id, "slotId": slot_id, "countryCode": country_code})
}

fn appointment_id(body: &serde_json::Value) -> Uuid {
    body["data"]["appointmentId"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_booking_is_pending_then_completed_after_country_processing() {
    let app = SagaTestApp::new();

    let (status, body) = app.book(booking_body("00123", 100, "PE"), "tx-flow-1").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "pending");
    let id = appointment_id(&body);

    let pending = app.saga.booking.find(id).await.unwrap();
    assert_eq!(pending.status, AppointmentStatus::Pending);
    assert!(pending.completed_at.is_none());

    assert!(app.pump().await > 0);

    let record = app.pe_store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(record.status, CountryRecordStatus::Confirmed);
    assert_eq!(record.slot_id, SlotId::new(100).unwrap());
    assert!(!record.center_name.is_empty());
    assert!(!record.specialty_name.is_empty());
    assert!(!record.practitioner_name.is_empty());
    assert_eq!(record.metadata.get("transactionId").map(String::as_str), Some("tx-flow-1"));
    assert!(app.cl_store.is_empty().await);

    let completed = app.saga.booking.find(id).await.unwrap();
    assert_eq!(completed.status, AppointmentStatus::Completed);
    assert!(completed.completed_at.is_some());
    assert_eq!(completed.transaction_id, "tx-flow-1");
}

#[tokio::test]
async fn test_unavailable_slot_is_rejected_without_side_effects() {
    let app = SagaTestApp::new();
    app.oracle.mark_unavailable(SlotId::new(100).unwrap()).await;

    let (status, body) = app.book(booking_body("00123", 100, "PE"), "tx-busy").await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "SLOT_UNAVAILABLE");
    assert_eq!(app.store.count().await, 0);
    for country in CountryCode::ALL {
        let depth = app.queue.depth(&lane_queue_name(country)).await.unwrap();
        assert_eq!(depth.ready, 0);
    }
    assert_eq!(app.pump().await, 0);
}

#[tokio::test]
async fn test_listing_returns_most_recent_first_with_total() {
    let app = SagaTestApp::new();

    let (_, first) = app.book(booking_body("00123", 100, "PE"), "tx-list-1").await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let (_, second) = app.book(booking_body("00123", 200, "CL"), "tx-list-2").await;

    let (status, body) = app.get("/appointments/00123").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["appointmentId"].as_str().unwrap())
        .collect();
    assert_eq!(
        ids,
        vec![
            second["data"]["appointmentId"].as_str().unwrap(),
            first["data"]["appointmentId"].as_str().unwrap(),
        ]
    );
}

#[tokio::test]
async fn test_redelivered_routed_message_keeps_one_record_and_stable_completion() {
    let app = SagaTestApp::new();
    let (_, body) = app.book(booking_body("00123", 100, "PE"), "tx-dup").await;
    let id = appointment_id(&body);
    app.pump().await;
    let completed = app.saga.booking.find(id).await.unwrap();

    app.saga.router.publish(&completed.routed_message()).await.unwrap();
    app.pump().await;

    assert_eq!(app.pe_store.len().await, 1);
    let after = app.saga.booking.find(id).await.unwrap();
    assert_eq!(after.status, AppointmentStatus::Completed);
    assert_eq!(after.completed_at, completed.completed_at);
}

#[tokio::test]
async fn test_repeated_completion_signal_keeps_first_timestamp() {
    let app = SagaTestApp::new();
    let (_, body) = app.book(booking_body("00456", 300, "CL"), "tx-signal").await;
    let id = appointment_id(&body);
    app.pump().await;
    let completed = app.saga.booking.find(id).await.unwrap();

    for _ in 0..3 {
        let signal = CompletionSignal {
            appointment_id: id,
            insured_id: completed.insured_id.clone(),
            country_code: CountryCode::Cl,
            processed_at: chrono::Utc::now(),
            context: completed.trace_context(),
        };
        app.queue
            .send(COMPLETION_QUEUE, serde_json::to_string(&signal).unwrap())
            .await
            .unwrap();
    }
    app.pump().await;

    let after = app.saga.booking.find(id).await.unwrap();
    assert_eq!(after.completed_at, completed.completed_at);
    assert_eq!(after.updated_at, completed.updated_at);
    assert_eq!(app.queue.depth(COMPLETION_QUEUE).await.unwrap().dead_lettered, 0);
}

#[tokio::test]
async fn test_country_without_lane_is_rejected_at_submit() {
    let app = SagaTestApp::with_config(TestConfig {
        routed_countries: vec!["PE".to_string()],
        ..TestConfig::default()
    });

    let (status, body) = app.book(booking_body("00123", 100, "CL"), "tx-no-lane").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(app.store.count().await, 0);
    assert_eq!(app.saga.lane_consumers.len(), 1);
}

#[tokio::test]
async fn test_failed_publish_is_recovered_by_outbox() {
    let app = SagaTestApp::new();
    app.queue.faults().fail_next(1);

    let (status, body) = app.book(booking_body("00123", 100, "PE"), "tx-outbox").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "pending");
    let id = appointment_id(&body);
    assert!(app.pe_store.is_empty().await);

    // Wait out the first retry backoff.
    tokio::time::sleep(Duration::from_millis(50)).await;
    app.pump().await;

    assert!(app.pe_store.find_by_id(id).await.unwrap().is_some());
    let appointment = app.saga.booking.find(id).await.unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Completed);
}

#[tokio::test]
async fn test_poison_message_lands_on_dead_letter_endpoint() {
    let app = SagaTestApp::new();
    let lane = lane_queue_name(CountryCode::Pe);
    app.queue.send(&lane, "not json".to_string()).await.unwrap();

    app.pump().await;

    let (status, body) = app.get(&format!("/queues/{}/dead-letters", lane)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let (status, body) = app.get("/queues/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_liveness_route_answers() {
    let app = SagaTestApp::new();
    let request = axum::http::Request::builder()
        .uri("/")
        .body(axum::body::Body::empty())
        .unwrap();

    let (status, _) = app.request(request).await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_missing_application_header_uses_configured_application_id() {
    let app = SagaTestApp::new();
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/appointments")
        .header("content-type", "application/json")
        .header("Transaction-ID", "tx-no-app")
        .body(axum::body::Body::from(booking_body("00123", 100, "PE").to_string()))
        .unwrap();

    let (status, body) = app.request(request).await;
    assert_eq!(status, StatusCode::CREATED);

    let appointment = app.saga.booking.find(appointment_id(&body)).await.unwrap();
    assert_eq!(appointment.application_id, app.saga.config.application_id);
    assert_ne!(appointment.application_id, shared_models::context::DEFAULT_APPLICATION_ID);
}
