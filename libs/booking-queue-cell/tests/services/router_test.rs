use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;

use booking_queue_cell::*;
use shared_models::{CountryCode, InfraError};
use shared_utils::test_utils::TestConfig;
use super::{routed_message, QueueTestUtils};

#[tokio::test]
async fn test_message_lands_only_on_its_country_lane() {
    let utils = QueueTestUtils::new();
    let router = utils.router();

    let message = routed_message(CountryCode::Cl, "00042", 100);
    router.publish(&message).await.unwrap();

    assert!(utils.queue.receive("appointments-pe", 10).await.unwrap().is_empty());

    let delivered = utils.queue.receive("appointments-cl", 10).await.unwrap();
    assert_eq!(delivered.len(), 1);
    let decoded: RoutedBookingMessage = serde_json::from_str(&delivered[0].payload).unwrap();
    assert_eq!(decoded, message);
}

#[tokio::test]
async fn test_country_without_lane_is_refused() {
    let utils = QueueTestUtils::new();
    let router = CountryRouter::new(utils.shared_queue(), &[CountryCode::Pe], Duration::from_millis(200));

    assert_eq!(router.lane_for(CountryCode::Pe).unwrap(), "appointments-pe");
    assert_matches!(
        router.lane_for(CountryCode::Cl),
        Err(BookingQueueError::UnsupportedCountry(country)) if country == "CL"
    );

    let result = router.publish(&routed_message(CountryCode::Cl, "00042", 100)).await;
    assert_matches!(result, Err(BookingQueueError::UnsupportedCountry(_)));
    assert_eq!(utils.queue.depth("appointments-cl").await.unwrap().ready, 0);
}

#[tokio::test]
async fn test_from_config_ignores_unknown_countries() {
    let utils = QueueTestUtils::new();
    let config = TestConfig {
        routed_countries: vec!["PE".to_string(), "AR".to_string()],
        ..TestConfig::default()
    }
    .to_app_config();

    let router = CountryRouter::from_config(utils.shared_queue(), &config);
    let lanes: Vec<_> = router.lanes().collect();

    assert_eq!(lanes, vec![(CountryCode::Pe, "appointments-pe")]);
}

#[tokio::test(start_paused = true)]
async fn test_slow_fabric_times_out() {
    let queue = Arc::new(InMemoryQueue::new());
    queue.faults().set_latency(Duration::from_secs(10));
    let router = CountryRouter::new(queue.clone(), &CountryCode::ALL, Duration::from_millis(100));

    let result = router.publish(&routed_message(CountryCode::Pe, "00042", 100)).await;

    assert_matches!(
        result,
        Err(BookingQueueError::Infrastructure(InfraError::Timeout { timeout_ms: 100, .. }))
    );
}

#[tokio::test]
async fn test_completion_channel_publishes_to_completion_queue() {
    let utils = QueueTestUtils::new();
    let channel = CompletionChannel::new(utils.shared_queue(), Duration::from_millis(200));
    let message = routed_message(CountryCode::Pe, "00042", 100);

    let signal = CompletionSignal {
        appointment_id: message.appointment_id,
        insured_id: message.insured_id.clone(),
        country_code: message.country_code,
        processed_at: chrono::Utc::now(),
        context: message.context.clone(),
    };
    channel.publish(&signal).await.unwrap();

    let delivered = utils.queue.receive(COMPLETION_QUEUE, 10).await.unwrap();
    assert_eq!(delivered.len(), 1);
    let decoded: CompletionSignal = serde_json::from_str(&delivered[0].payload).unwrap();
    assert_eq!(decoded.appointment_id, message.appointment_id);
    assert_eq!(decoded.context.transaction_id, "tx-queue-test");
}
