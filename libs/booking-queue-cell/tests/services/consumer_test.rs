use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use booking_queue_cell::*;
use super::QueueTestUtils;

const QUEUE: &str = "test-queue";

#[derive(Debug, Serialize, Deserialize)]
struct TestMessage {
    key: String,
}

/// Handler that replays a scripted sequence of outcomes per message key and
/// succeeds once the script runs out.
#[derive(Default)]
struct ScriptedHandler {
    scripts: Mutex<HashMap<String, VecDeque<HandlerError>>>,
    handled: Mutex<Vec<String>>,
}

impl ScriptedHandler {
    async fn script(&self, key: &str, failures: Vec<HandlerError>) {
        self.scripts.lock().await.insert(key.to_string(), failures.into());
    }

    async fn handled(&self) -> Vec<String> {
        self.handled.lock().await.clone()
    }
}

#[async_trait]
impl MessageHandler for ScriptedHandler {
    type Message = TestMessage;

    async fn handle(&self, message: TestMessage) -> Result<(), HandlerError> {
        self.handled.lock().await.push(message.key.clone());
        match self
            .scripts
            .lock()
            .await
            .get_mut(&message.key)
            .and_then(VecDeque::pop_front)
        {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

async fn send(utils: &QueueTestUtils, key: &str) {
    let payload = serde_json::to_string(&TestMessage { key: key.to_string() }).unwrap();
    utils.queue.send(QUEUE, payload).await.unwrap();
}

fn consumer(utils: &QueueTestUtils, handler: Arc<ScriptedHandler>, max_receive_count: u32) -> QueueConsumer<ScriptedHandler> {
    QueueConsumer::new(QUEUE, utils.shared_queue(), handler, utils.consumer_config(max_receive_count))
}

#[tokio::test]
async fn test_successful_delivery_is_acknowledged() {
    let utils = QueueTestUtils::new();
    let handler = Arc::new(ScriptedHandler::default());
    let consumer = consumer(&utils, handler.clone(), 3);

    send(&utils, "a").await;
    let report = consumer.poll_once().await.unwrap();

    assert_eq!(report.received, 1);
    assert_eq!(report.acknowledged, 1);
    assert_eq!(handler.handled().await, vec!["a".to_string()]);
    assert_eq!(utils.queue.depth(QUEUE).await.unwrap(), QueueDepth::default());
}

#[tokio::test]
async fn test_transient_failure_is_redelivered_then_succeeds() {
    let utils = QueueTestUtils::new();
    let handler = Arc::new(ScriptedHandler::default());
    handler
        .script("a", vec![HandlerError::Transient("store timed out".to_string())])
        .await;
    let consumer = consumer(&utils, handler.clone(), 3);

    send(&utils, "a").await;
    let first = consumer.poll_once().await.unwrap();
    assert_eq!(first.requeued, 1);

    let second = consumer.poll_once().await.unwrap();
    assert_eq!(second.acknowledged, 1);
    assert_eq!(handler.handled().await.len(), 2);
}

#[tokio::test]
async fn test_repeated_transient_failures_end_in_dead_letter() {
    let utils = QueueTestUtils::new();
    let handler = Arc::new(ScriptedHandler::default());
    handler
        .script("a", vec![HandlerError::Transient("down".to_string()); 5])
        .await;
    let consumer = consumer(&utils, handler.clone(), 2);

    send(&utils, "a").await;
    assert_eq!(consumer.poll_once().await.unwrap().requeued, 1);
    assert_eq!(consumer.poll_once().await.unwrap().dead_lettered, 1);
    assert_eq!(consumer.poll_once().await.unwrap().received, 0);

    assert_eq!(utils.queue.dead_letters(QUEUE).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_rejected_message_is_dead_lettered_without_retry() {
    let utils = QueueTestUtils::new();
    let handler = Arc::new(ScriptedHandler::default());
    handler
        .script("bad", vec![HandlerError::Rejected("wrong lane".to_string())])
        .await;
    let consumer = consumer(&utils, handler.clone(), 3);

    send(&utils, "bad").await;
    let report = consumer.poll_once().await.unwrap();

    assert_eq!(report.dead_lettered, 1);
    assert_eq!(handler.handled().await.len(), 1);
    assert_eq!(utils.queue.depth(QUEUE).await.unwrap().dead_lettered, 1);
}

#[tokio::test]
async fn test_undecodable_payload_never_reaches_handler() {
    let utils = QueueTestUtils::new();
    let handler = Arc::new(ScriptedHandler::default());
    let consumer = consumer(&utils, handler.clone(), 3);

    utils.queue.send(QUEUE, "{\"unexpected\":true}".to_string()).await.unwrap();
    let report = consumer.poll_once().await.unwrap();

    assert_eq!(report.dead_lettered, 1);
    assert!(handler.handled().await.is_empty());
}

#[tokio::test]
async fn test_failures_in_a_batch_do_not_affect_other_messages() {
    let utils = QueueTestUtils::new();
    let handler = Arc::new(ScriptedHandler::default());
    handler
        .script("flaky", vec![HandlerError::Transient("timeout".to_string())])
        .await;
    handler
        .script("poison", vec![HandlerError::Rejected("integrity".to_string())])
        .await;
    let consumer = consumer(&utils, handler.clone(), 3);

    for key in ["ok-1", "flaky", "poison", "ok-2"] {
        send(&utils, key).await;
    }

    let report = consumer.poll_once().await.unwrap();
    assert_eq!(report.received, 4);
    assert_eq!(report.acknowledged, 2);
    assert_eq!(report.requeued, 1);
    assert_eq!(report.dead_lettered, 1);

    // Only the flaky message comes back.
    let retry = consumer.poll_once().await.unwrap();
    assert_eq!(retry.received, 1);
    assert_eq!(retry.acknowledged, 1);
}

#[tokio::test]
async fn test_run_drains_queue_until_shutdown() {
    let utils = QueueTestUtils::new();
    let handler = Arc::new(ScriptedHandler::default());
    let consumer = Arc::new(consumer(&utils, handler.clone(), 3));

    for key in ["a", "b", "c"] {
        send(&utils, key).await;
    }

    let runner = consumer.clone();
    let task = tokio::spawn(async move { runner.run().await });

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while handler.handled().await.len() < 3 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    consumer.shutdown().await;
    tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();

    let mut handled = handler.handled().await;
    handled.sort();
    assert_eq!(handled, vec!["a", "b", "c"]);
    assert_eq!(utils.queue.depth(QUEUE).await.unwrap(), QueueDepth::default());
}
