//! Backoff for search-page fetches.
//!
//! Marketplaces throttle search traffic with 429s and the occasional 5xx
//! page. Those are retried on an exponential schedule; everything else is
//! returned to the caller on the first failure.

use std::future::Future;
use std::time::Duration;

use crate::error::ScraperError;

/// Upper bound on a server-requested `Retry-After` wait.
const MAX_RETRY_AFTER_SECS: u64 = 60;

/// How long to wait before retrying after `err` on attempt `attempt`, or
/// `None` when `err` is not worth retrying.
///
/// A 429 waits for the larger of the backoff step and the server's
/// `Retry-After` (capped at [`MAX_RETRY_AFTER_SECS`]).
fn retry_delay(err: &ScraperError, attempt: u32, backoff_base_secs: u64) -> Option<Duration> {
    let step = backoff_base_secs.saturating_mul(1u64 << attempt.min(62));
    let secs = match err {
        ScraperError::RateLimited {
            retry_after_secs, ..
        } => step.max((*retry_after_secs).min(MAX_RETRY_AFTER_SECS)),
        ScraperError::Http(_) => step,
        ScraperError::UnexpectedStatus { status, .. } if *status >= 500 => step,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}

/// Runs `operation`, retrying transient failures up to `max_retries` times.
///
/// The wait before retry `n` is `backoff_base_secs * 2^n` seconds. When the
/// retries run out the last error is returned.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let mut attempt = 0u32;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        let delay = match retry_delay(&err, attempt, backoff_base_secs) {
            Some(delay) if attempt < max_retries => delay,
            _ => return Err(err),
        };

        tracing::warn!(
            attempt,
            max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "transient page fetch error, backing off"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
