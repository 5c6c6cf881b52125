use std::time::Duration;

use assert_matches::assert_matches;
use uuid::Uuid;

use booking_queue_cell::*;
use super::QueueTestUtils;

const LANE: &str = "appointments-pe";

#[tokio::test]
async fn test_send_then_receive_marks_delivery_in_flight() {
    let utils = QueueTestUtils::new();
    let queue = &utils.queue;

    let delivery_id = queue.send(LANE, "{}".to_string()).await.unwrap();
    let batch = queue.receive(LANE, 10).await.unwrap();

    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].delivery_id, delivery_id);
    assert_eq!(batch[0].receive_count, 1);
    assert!(batch[0].received_at.is_some());

    let depth = queue.depth(LANE).await.unwrap();
    assert_eq!(depth.ready, 0);
    assert_eq!(depth.in_flight, 1);
}

#[tokio::test]
async fn test_receive_respects_batch_size_and_fifo_order() {
    let utils = QueueTestUtils::new();
    let queue = &utils.queue;

    let first = queue.send(LANE, "1".to_string()).await.unwrap();
    let second = queue.send(LANE, "2".to_string()).await.unwrap();
    queue.send(LANE, "3".to_string()).await.unwrap();

    let batch = queue.receive(LANE, 2).await.unwrap();
    assert_eq!(
        batch.iter().map(|d| d.delivery_id).collect::<Vec<_>>(),
        vec![first, second]
    );
    assert_eq!(queue.depth(LANE).await.unwrap().ready, 1);
}

#[tokio::test]
async fn test_ack_removes_delivery() {
    let utils = QueueTestUtils::new();
    let queue = &utils.queue;

    queue.send(LANE, "{}".to_string()).await.unwrap();
    let delivery = queue.receive(LANE, 1).await.unwrap().remove(0);
    queue.ack(LANE, delivery.delivery_id).await.unwrap();

    assert_eq!(queue.depth(LANE).await.unwrap(), QueueDepth::default());

    let again = queue.ack(LANE, delivery.delivery_id).await;
    assert_matches!(again, Err(BookingQueueError::UnknownDelivery { .. }));
}

#[tokio::test]
async fn test_nack_requeues_until_max_receive_count_then_dead_letters() {
    let utils = QueueTestUtils::new();
    let queue = &utils.queue;
    queue.send(LANE, "{}".to_string()).await.unwrap();

    for attempt in 1..3 {
        let delivery = queue.receive(LANE, 1).await.unwrap().remove(0);
        assert_eq!(delivery.receive_count, attempt);
        let outcome = queue.nack(LANE, delivery.delivery_id, 3).await.unwrap();
        assert_eq!(outcome, NackOutcome::Requeued { receive_count: attempt });
    }

    let delivery = queue.receive(LANE, 1).await.unwrap().remove(0);
    let outcome = queue.nack(LANE, delivery.delivery_id, 3).await.unwrap();
    assert_eq!(outcome, NackOutcome::DeadLettered { receive_count: 3 });

    let dead = queue.dead_letters(LANE).await.unwrap();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].delivery_id, delivery.delivery_id);
    assert!(queue.receive(LANE, 1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_dead_letter_skips_remaining_attempts() {
    let utils = QueueTestUtils::new();
    let queue = &utils.queue;

    queue.send(LANE, "not json".to_string()).await.unwrap();
    let delivery = queue.receive(LANE, 1).await.unwrap().remove(0);
    queue.dead_letter(LANE, delivery.delivery_id).await.unwrap();

    let depth = queue.depth(LANE).await.unwrap();
    assert_eq!(depth.in_flight, 0);
    assert_eq!(depth.dead_lettered, 1);
}

#[tokio::test]
async fn test_recover_in_flight_redelivers_expired_deliveries() {
    let utils = QueueTestUtils::new();
    let queue = &utils.queue;

    queue.send(LANE, "{}".to_string()).await.unwrap();
    let first = queue.receive(LANE, 1).await.unwrap().remove(0);

    // Still within its visibility window.
    assert_eq!(queue.recover_in_flight(LANE, Duration::from_secs(60)).await.unwrap(), 0);

    assert_eq!(queue.recover_in_flight(LANE, Duration::ZERO).await.unwrap(), 1);
    let redelivered = queue.receive(LANE, 1).await.unwrap().remove(0);
    assert_eq!(redelivered.delivery_id, first.delivery_id);
    assert_eq!(redelivered.receive_count, 2);
}

#[tokio::test]
async fn test_queues_are_isolated_by_name() {
    let utils = QueueTestUtils::new();
    let queue = &utils.queue;

    queue.send("appointments-pe", "{}".to_string()).await.unwrap();

    assert!(queue.receive("appointments-cl", 10).await.unwrap().is_empty());
    assert_eq!(queue.depth("appointments-pe").await.unwrap().ready, 1);
}

#[tokio::test]
async fn test_nack_unknown_delivery_is_an_error() {
    let utils = QueueTestUtils::new();
    let result = utils.queue.nack(LANE, Uuid::new_v4(), 3).await;

    assert_matches!(result, Err(BookingQueueError::UnknownDelivery { .. }));
}

#[tokio::test]
async fn test_injected_send_failure_is_transient() {
    let utils = QueueTestUtils::new();
    utils.queue.faults().fail_next(1);

    let error = utils.queue.send(LANE, "{}".to_string()).await.unwrap_err();
    assert!(error.class().is_retryable());
    assert!(utils.queue.send(LANE, "{}".to_string()).await.is_ok());
}
