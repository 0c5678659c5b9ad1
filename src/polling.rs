//! Poll a condition until it holds or a deadline passes.
//!
//! Semantics:
//! - The predicate runs first, then once after every sleep, including one
//!   final check after the budget is spent.
//! - Sleeps are capped at the remaining budget, so overshoot past `max_wait`
//!   is bounded by one predicate call.
//! - Predicate errors propagate immediately; they are not retried.
//! - Running out of time yields [`DataApiError::Timeout`] naming the condition.
//! - A cancellation token interrupts the async sleep and is checked around the
//!   blocking sleep.
//! - Optional equal jitter draws each sleep uniformly from `[interval/2, interval]`.

use crate::clock::{Clock, MonotonicClock};
use crate::error::{DataApiError, Result};
use crate::sleeper::{Sleeper, TokioSleeper};
use rand::{rng, Rng};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Clone)]
pub struct PollingWaiter {
    interval: Duration,
    max_wait: Duration,
    jitter: bool,
    sleeper: Arc<dyn Sleeper>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for PollingWaiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingWaiter")
            .field("interval", &self.interval)
            .field("max_wait", &self.max_wait)
            .field("jitter", &self.jitter)
            .field("sleeper", &self.sleeper)
            .finish()
    }
}

impl PollingWaiter {
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        Self {
            interval,
            max_wait,
            jitter: false,
            sleeper: Arc::new(TokioSleeper),
            clock: Arc::new(MonotonicClock::default()),
        }
    }

    pub fn with_jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    pub fn with_sleeper<S: Sleeper + 'static>(mut self, sleeper: S) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Poll `predicate` until it returns `true`.
    pub async fn wait_until<F, Fut>(
        &self,
        condition: &str,
        cancel: Option<&CancellationToken>,
        mut predicate: F,
    ) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        let start = self.clock.now_millis();
        let mut attempt = 0usize;
        loop {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(DataApiError::Cancelled);
            }
            attempt += 1;
            if predicate().await? {
                return Ok(());
            }
            let nap = self.next_nap(condition, start, attempt)?;
            match cancel {
                Some(token) => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => return Err(DataApiError::Cancelled),
                        _ = self.sleeper.sleep(nap) => {}
                    }
                }
                None => self.sleeper.sleep(nap).await,
            }
        }
    }

    /// Blocking counterpart of [`PollingWaiter::wait_until`].
    pub fn wait_until_blocking<F>(
        &self,
        condition: &str,
        cancel: Option<&CancellationToken>,
        mut predicate: F,
    ) -> Result<()>
    where
        F: FnMut() -> Result<bool>,
    {
        let start = self.clock.now_millis();
        let mut attempt = 0usize;
        loop {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(DataApiError::Cancelled);
            }
            attempt += 1;
            if predicate()? {
                return Ok(());
            }
            let nap = self.next_nap(condition, start, attempt)?;
            self.sleeper.sleep_blocking(nap);
        }
    }

    fn next_nap(&self, condition: &str, start: u64, attempt: usize) -> Result<Duration> {
        let elapsed = Duration::from_millis(self.clock.now_millis().saturating_sub(start));
        if elapsed >= self.max_wait {
            debug!(
                target: "astra_data_api::polling",
                condition,
                attempt,
                elapsed_ms = elapsed.as_millis() as u64,
                "gave up waiting"
            );
            return Err(DataApiError::Timeout { condition: condition.to_string(), waited: elapsed });
        }
        debug!(
            target: "astra_data_api::polling",
            condition,
            attempt,
            elapsed_ms = elapsed.as_millis() as u64,
            "condition not met yet"
        );
        let nap = if self.jitter { equal_jitter(self.interval) } else { self.interval };
        Ok(nap.min(self.max_wait - elapsed))
    }
}

fn equal_jitter(delay: Duration) -> Duration {
    let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    if millis == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rng().random_range(millis / 2..=millis))
}
