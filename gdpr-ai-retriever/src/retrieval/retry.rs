//! Retrying embedding calls that failed transiently.

use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Delay before retry number `attempt` (1-based): 200ms, 400ms, 800ms, ... capped at 6.4s.
pub fn backoff(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(5);
    Duration::from_millis(200 * (1u64 << exponent))
}

/// Run `operation`, retrying up to `retries` more times while it fails with a
/// retryable error. Non-retryable errors are returned immediately.
pub async fn with_retries<T, F, Fut>(retries: u32, what: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < retries => {
                attempt += 1;
                let delay = backoff(attempt);
                warn!(
                    "{} failed (attempt {} of {}): {}; retrying in {:?}",
                    what,
                    attempt,
                    retries + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
