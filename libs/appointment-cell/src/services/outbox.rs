use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use booking_queue_cell::CountryRouter;
use shared_config::{AppConfig, OutboxSettings, TimeoutSettings};
use shared_utils::bounded;

use crate::models::AppointmentError;
use crate::store::OutboxStore;

/// When to try an entry again after `attempts` failed publishes:
/// exponential in the dispatch interval, capped at 2^8 intervals.
pub fn retry_at(now: DateTime<Utc>, attempts: u32, settings: &OutboxSettings) -> DateTime<Utc> {
    let factor = 2_i64.pow(attempts.min(8));
    now + chrono::Duration::milliseconds(settings.dispatch_interval_ms as i64 * factor)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub attempted: usize,
    pub dispatched: usize,
    pub failed: usize,
}

/// Republishes routing intents whose synchronous publish did not go
/// through, so no appointment stays PENDING with nothing to process it.
pub struct OutboxDispatcher {
    outbox: Arc<dyn OutboxStore>,
    router: Arc<CountryRouter>,
    settings: OutboxSettings,
    timeouts: TimeoutSettings,
    is_shutdown: RwLock<bool>,
}

impl OutboxDispatcher {
    pub fn new(outbox: Arc<dyn OutboxStore>, router: Arc<CountryRouter>, config: &AppConfig) -> Self {
        Self {
            outbox,
            router,
            settings: config.outbox.clone(),
            timeouts: config.timeouts,
            is_shutdown: RwLock::new(false),
        }
    }

    pub async fn dispatch_once(&self) -> Result<DispatchReport, AppointmentError> {
        let now = Utc::now();
        let due = bounded(
            "outbox.due_entries",
            self.timeouts.store(),
            self.outbox.due_entries(now, self.settings.batch_size),
        )
        .await?;

        let mut report = DispatchReport {
            attempted: due.len(),
            ..DispatchReport::default()
        };

        // Only reading the batch can fail the tick. Store errors on a single
        // entry leave it due and the rest of the batch still goes out.
        for entry in due {
            match self.router.publish(&entry.message).await {
                Ok(_) => {
                    let marked = bounded(
                        "outbox.mark_dispatched",
                        self.timeouts.store(),
                        self.outbox.mark_dispatched(entry.entry_id, Utc::now()),
                    )
                    .await;
                    match marked {
                        Ok(()) => {
                            info!(
                                "Outbox dispatched appointment {} after {} earlier attempt(s)",
                                entry.entry_id, entry.attempts
                            );
                            report.dispatched += 1;
                        }
                        Err(e) => {
                            warn!(
                                "Outbox published appointment {} but could not mark it dispatched: {}",
                                entry.entry_id, e
                            );
                            report.failed += 1;
                        }
                    }
                }
                Err(e) => {
                    let attempts = entry.attempts + 1;
                    let next_attempt_at = retry_at(Utc::now(), attempts, &self.settings);
                    warn!(
                        "Outbox publish for appointment {} failed (attempt {}), next try at {}: {}",
                        entry.entry_id, attempts, next_attempt_at, e
                    );
                    if let Err(mark_err) = bounded(
                        "outbox.mark_retry",
                        self.timeouts.store(),
                        self.outbox.mark_retry(entry.entry_id, &e.to_string(), next_attempt_at),
                    )
                    .await
                    {
                        warn!("Outbox could not reschedule appointment {}: {}", entry.entry_id, mark_err);
                    }
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    pub async fn run(&self) {
        info!(
            "Outbox dispatcher started (interval {}ms, batch {})",
            self.settings.dispatch_interval_ms, self.settings.batch_size
        );

        loop {
            if *self.is_shutdown.read().await {
                break;
            }

            match self.dispatch_once().await {
                Ok(report) if report.attempted > 0 => debug!("Outbox tick: {:?}", report),
                Ok(_) => {}
                Err(e) => error!("Outbox tick failed: {}", e),
            }

            sleep(self.settings.dispatch_interval()).await;
        }

        info!("Outbox dispatcher stopped");
    }

    pub async fn shutdown(&self) {
        *self.is_shutdown.write().await = true;
    }
}
