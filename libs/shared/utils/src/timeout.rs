use std::future::Future;
use std::time::Duration;

use shared_models::InfraError;

/// Runs `future` with an upper bound. An elapsed deadline becomes
/// `InfraError::Timeout`, distinct from the call failing on its own.
pub async fn bounded<T, E, F>(operation: &str, limit: Duration, future: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<InfraError>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("{} exceeded its {}ms budget", operation, limit.as_millis());
            Err(E::from(InfraError::Timeout {
                operation: operation.to_string(),
                timeout_ms: limit.as_millis() as u64,
            }))
        }
    }
}
