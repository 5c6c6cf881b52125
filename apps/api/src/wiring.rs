use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use appointment_cell::{
    AppointmentBookingService, AppointmentStore, CompletionListener, InMemoryAppointmentStore, OutboxDispatcher,
    OutboxStore, RedisAppointmentStore,
};
use booking_queue_cell::{
    CompletionChannel, ConsumerConfig, CountryRouter, InMemoryQueue, MessageQueue, QueueConsumer, RedisQueue,
    COMPLETION_QUEUE,
};
use country_cell::{CountryProcessor, CountryStores};
use schedule_cell::ScheduleOracle;
use shared_config::AppConfig;
use shared_database::RedisClient;
use shared_models::InfraError;

/// Storage and messaging backends the saga runs on.
#[derive(Clone)]
pub struct Backends {
    pub appointments: Arc<dyn AppointmentStore>,
    pub outbox: Arc<dyn OutboxStore>,
    pub queue: Arc<dyn MessageQueue>,
    pub country_stores: CountryStores,
}

impl Backends {
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryAppointmentStore::new());
        Self {
            appointments: store.clone(),
            outbox: store,
            queue: Arc::new(InMemoryQueue::new()),
            country_stores: CountryStores::in_memory(),
        }
    }

    pub async fn redis(config: &AppConfig) -> Result<Self, InfraError> {
        let client = RedisClient::connect(config).await?;
        let store = Arc::new(RedisAppointmentStore::new(client.clone()));
        Ok(Self {
            appointments: store.clone(),
            outbox: store,
            queue: Arc::new(RedisQueue::new(client.clone())),
            country_stores: CountryStores::redis(&client),
        })
    }

    /// Redis when a URL is configured, process memory otherwise.
    pub async fn from_config(config: &AppConfig) -> Result<Self, InfraError> {
        if config.is_redis_configured() {
            info!("Using Redis backends");
            Self::redis(config).await
        } else {
            info!("Using in-memory backends");
            Ok(Self::in_memory())
        }
    }
}

/// Every saga participant, assembled over one set of backends.
pub struct Saga {
    pub config: AppConfig,
    pub backends: Backends,
    pub router: Arc<CountryRouter>,
    pub booking: Arc<AppointmentBookingService>,
    pub lane_consumers: Vec<Arc<QueueConsumer<CountryProcessor>>>,
    pub completion_consumer: Arc<QueueConsumer<CompletionListener>>,
    pub dispatcher: Arc<OutboxDispatcher>,
}

impl Saga {
    pub fn assemble(config: AppConfig, backends: Backends, oracle: Arc<dyn ScheduleOracle>) -> Self {
        let router = Arc::new(CountryRouter::from_config(backends.queue.clone(), &config));
        let booking = Arc::new(AppointmentBookingService::new(
            backends.appointments.clone(),
            backends.outbox.clone(),
            oracle.clone(),
            router.clone(),
            &config,
        ));

        let completions = Arc::new(CompletionChannel::new(backends.queue.clone(), config.timeouts.publish()));
        let lane_consumers = router
            .lanes()
            .map(|(country, lane)| {
                let processor = CountryProcessor::new(
                    country,
                    oracle.clone(),
                    &backends.country_stores,
                    completions.clone(),
                    config.timeouts,
                );
                Arc::new(QueueConsumer::new(
                    lane,
                    backends.queue.clone(),
                    Arc::new(processor),
                    ConsumerConfig::from_app_config(format!("{}-processor", lane), &config),
                ))
            })
            .collect();

        let listener = CompletionListener::new(backends.appointments.clone(), config.timeouts);
        let completion_consumer = Arc::new(QueueConsumer::new(
            COMPLETION_QUEUE,
            backends.queue.clone(),
            Arc::new(listener),
            ConsumerConfig::from_app_config("completion-listener", &config),
        ));

        let dispatcher = Arc::new(OutboxDispatcher::new(backends.outbox.clone(), router.clone(), &config));

        Self {
            config,
            backends,
            router,
            booking,
            lane_consumers,
            completion_consumer,
            dispatcher,
        }
    }

    /// Lane queues followed by the completion queue.
    pub fn queue_names(&self) -> Vec<String> {
        self.lane_consumers
            .iter()
            .map(|consumer| consumer.queue_name().to_string())
            .chain(std::iter::once(COMPLETION_QUEUE.to_string()))
            .collect()
    }

    pub fn spawn_workers(&self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(self.lane_consumers.len() + 2);

        for consumer in &self.lane_consumers {
            let consumer = consumer.clone();
            handles.push(tokio::spawn(async move { consumer.run().await }));
        }

        let completion = self.completion_consumer.clone();
        handles.push(tokio::spawn(async move { completion.run().await }));

        let dispatcher = self.dispatcher.clone();
        handles.push(tokio::spawn(async move { dispatcher.run().await }));

        info!("Spawned {} saga workers", handles.len());
        handles
    }

    pub async fn shutdown(&self) {
        for consumer in &self.lane_consumers {
            consumer.shutdown().await;
        }
        self.completion_consumer.shutdown().await;
        self.dispatcher.shutdown().await;
    }
}
