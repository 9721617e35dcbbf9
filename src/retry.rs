//! Single bounded retry for rate-limited calls.
//!
//! Both external hosts enforce quotas. A call that fails with
//! [`TransportError::RateLimited`] is attempted exactly once more after a
//! fixed backoff; any other failure, or a second rate limit, is returned
//! as-is for the caller's placeholder policy to handle.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::error::TransportError;

pub async fn retry_once_on_rate_limit<T, F, Fut>(
    what: &str,
    backoff: Duration,
    mut call: F,
) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    match call().await {
        Err(e) if e.is_rate_limited() => {
            debug!(
                call = what,
                backoff_ms = backoff.as_millis() as u64,
                "rate limited, retrying once"
            );
            tokio::time::sleep(backoff).await;
            call().await
        }
        other => other,
    }
}
