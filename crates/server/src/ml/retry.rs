//! Bounded retry with linear backoff

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Backoff unit: the wait after failed attempt `n` is `n` times this
pub const BACKOFF_STEP: Duration = Duration::from_millis(300);

/// Run `operation` until it succeeds, at most `max_retries + 1` times.
///
/// Failed attempt `n` (1-based) is followed by a `300ms * n` sleep before the
/// next one. There is no jitter, so clients failing together retry together.
/// When every attempt fails the last error is returned; earlier errors are
/// only logged.
pub async fn call_with_retries<T, E, F, Fut>(mut operation: F, max_retries: u32) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt > max_retries => return Err(err),
            Err(err) => {
                let backoff = BACKOFF_STEP * attempt;
                tracing::warn!(
                    attempt,
                    max_attempts = max_retries + 1,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let start = Instant::now();

        let result = call_with_retries(
            move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 { Err(format!("failure {n}")) } else { Ok(n) }
            },
            2,
        )
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(900), "slept {elapsed:?}");
        assert!(elapsed < Duration::from_millis(1000), "slept {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn returns_last_error_when_exhausted() {
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: Result<(), String> = call_with_retries(
            move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(format!("failure {n}"))
            },
            1,
        )
        .await;

        assert_eq!(result, Err("failure 2".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_means_one_attempt_and_no_sleep() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let start = Instant::now();

        let result: Result<(), &str> = call_with_retries(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("down")
            },
            0,
        )
        .await;

        assert_eq!(result, Err("down"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_skips_remaining_attempts() {
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: Result<&str, &str> = call_with_retries(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("ready")
            },
            5,
        )
        .await;

        assert_eq!(result, Ok("ready"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
