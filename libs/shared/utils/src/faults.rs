use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use shared_models::InfraError;

/// Latency and failure injection point for simulated dependencies.
///
/// Every simulated store, queue and oracle calls [`FaultInjector::check`]
/// before doing real work, which lets tests make a dependency slow (to hit a
/// timeout) or make its next N calls fail.
#[derive(Debug, Default)]
pub struct FaultInjector {
    latency_ms: AtomicU64,
    failures_remaining: AtomicU32,
    calls: AtomicU64,
}

impl FaultInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms.store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn fail_next(&self, calls: u32) {
        self.failures_remaining.store(calls, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.latency_ms.store(0, Ordering::SeqCst);
        self.failures_remaining.store(0, Ordering::SeqCst);
    }

    /// Number of calls observed so far, failed ones included.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn check(&self, operation: &str) -> Result<(), InfraError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        let injected = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if injected {
            return Err(InfraError::unavailable(operation, "injected failure"));
        }

        Ok(())
    }
}
