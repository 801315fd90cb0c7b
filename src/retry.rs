use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::http::error::Error;

/// A retry is attempted only for transient HTTP failures. Everything else,
/// including 4xx responses and body decode failures, surfaces immediately.
pub(crate) fn shall_retry(err: &Error) -> bool {
    matches!(err.status(), Some(500) | Some(502) | Some(503))
}

/// Randomized exponential back-off. Each pause is a uniform draw on
/// `(0, current]`; the budget then doubles, capped at the ceiling.
pub(crate) struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    current: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            multiplier: 2.0,
            current: Duration::ZERO,
        }
    }
}

impl Backoff {
    pub(crate) fn pause(&mut self) -> Duration {
        if self.current.is_zero() {
            self.current = self.initial;
        }
        let budget = self.current.as_nanos() as u64;
        let pause = Duration::from_nanos(1 + rand::thread_rng().gen_range(0..budget));
        self.current = Duration::from_nanos((budget as f64 * self.multiplier) as u64);
        if self.current > self.max {
            self.current = self.max;
        }
        pause
    }
}

/// Runs `f` up to `max_retries` times, sleeping a fresh back-off pause
/// between transient failures. The last attempt's error is returned when
/// retries are exhausted.
pub(crate) async fn run_with_retries<T, F, Fut>(mut f: F, max_retries: usize) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut backoff = Backoff::default();
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= max_retries || !shall_retry(&err) {
                    return Err(err);
                }
                let pause = backoff.pause();
                tracing::trace!(attempt, pause_ms = pause.as_millis() as u64, "retrying transient failure");
                tokio::time::sleep(pause).await;
            }
        }
    }
}
