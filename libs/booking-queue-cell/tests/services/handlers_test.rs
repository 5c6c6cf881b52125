use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::Value;
use tower::ServiceExt;

use booking_queue_cell::*;
use super::QueueTestUtils;

fn app(utils: &QueueTestUtils) -> axum::Router {
    let state = QueueAdminState::new(
        utils.shared_queue(),
        vec![
            "appointments-pe".to_string(),
            "appointments-cl".to_string(),
            COMPLETION_QUEUE.to_string(),
        ],
    );
    create_booking_queue_router(state)
}

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_stats_report_every_known_queue() {
    let utils = QueueTestUtils::new();
    utils.queue.send("appointments-pe", "{}".to_string()).await.unwrap();

    let (status, body) = get_json(app(&utils), "/stats").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let stats = body["data"].as_array().unwrap();
    assert_eq!(stats.len(), 3);
    assert_eq!(stats[0]["queue"], "appointments-pe");
    assert_eq!(stats[0]["depth"]["ready"], 1);
    assert_eq!(stats[0]["queue_health"], "Healthy");
}

#[tokio::test]
async fn test_dead_letters_are_listed() {
    let utils = QueueTestUtils::new();
    utils.queue.send("appointments-cl", "garbage".to_string()).await.unwrap();
    let delivery = utils.queue.receive("appointments-cl", 1).await.unwrap().remove(0);
    utils.queue.dead_letter("appointments-cl", delivery.delivery_id).await.unwrap();

    let (status, body) = get_json(app(&utils), "/appointments-cl/dead-letters").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["payload"], "garbage");

    let (_, stats) = get_json(app(&utils), "/stats").await;
    assert!(stats["data"][1]["queue_health"]["Degraded"].is_object());
}

#[tokio::test]
async fn test_unknown_queue_is_not_found() {
    let utils = QueueTestUtils::new();

    let (status, body) = get_json(app(&utils), "/appointments-ar/dead-letters").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "NOT_FOUND");
}
