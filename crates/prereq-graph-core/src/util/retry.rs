//! Retry with exponential backoff for transient storage errors
//!
//! SQLite reports writer contention as BUSY/LOCKED. Those failures roll the
//! transaction back and are safe to re-run; everything else is returned as-is.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use tracing::{debug, error, warn};

use crate::error::{Error, Result};

/// First backoff delay
const INITIAL_BACKOFF_MS: u64 = 10;

/// Backoff ceiling
const MAX_BACKOFF_MS: u64 = 1_000;

/// Retry `operation` on transient errors until `max_wait_ms` has elapsed
///
/// Delays start at 10 ms and double up to 1 s. Once the budget is spent the
/// last transient error is wrapped in [`Error::RetriesExhausted`].
pub async fn retry_on_lock<F, Fut, T>(
    operation_name: &str,
    max_wait_ms: u64,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start = Instant::now();
    let budget = Duration::from_millis(max_wait_ms);
    let mut attempt: u32 = 0;
    let mut backoff_ms = INITIAL_BACKOFF_MS;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) => {
                let elapsed = start.elapsed();
                if elapsed >= budget {
                    error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        max_wait_ms,
                        error = %err,
                        "Giving up on locked database"
                    );
                    return Err(Error::RetriesExhausted {
                        operation: operation_name.to_string(),
                        attempts: attempt,
                        last_error: err.to_string(),
                    });
                }

                let remaining = budget.saturating_sub(elapsed);
                let delay = Duration::from_millis(backoff_ms).min(remaining);
                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient storage error, backing off"
                );
                tokio::time::sleep(delay).await;
                backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
            }
        }
    }
}

/// Retry `operation` on transient errors for at most `max_attempts` attempts
///
/// Used by the bulk runner, whose budget is counted in jobs rather than time.
pub async fn retry_attempts<F, Fut, T>(
    operation_name: &str,
    max_attempts: u32,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut backoff_ms = INITIAL_BACKOFF_MS;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) if attempt >= max_attempts => {
                error!(
                    operation = operation_name,
                    attempt,
                    error = %err,
                    "Retry attempts exhausted"
                );
                return Err(Error::RetriesExhausted {
                    operation: operation_name.to_string(),
                    attempts: attempt,
                    last_error: err.to_string(),
                });
            }
            Err(err) => {
                warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    delay_ms = backoff_ms,
                    error = %err,
                    "Transient error, retrying"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
            }
        }
    }
}
