//! Admission throughput limiter
//!
//! Admits at most `max` executions per rolling window, across all workers.
//! Concurrency is bounded separately by the worker pool's semaphore.

use crate::config::WorkerConfig;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Shared admission gate
#[derive(Clone)]
pub struct AdmissionLimiter {
    limiter: Arc<DirectRateLimiter>,
    max: NonZeroU32,
    window: Duration,
}

impl AdmissionLimiter {
    /// `max` admissions per `window`, all of them available as an initial burst
    ///
    /// A zero `max` is treated as 1 and a zero window as 1 ms.
    pub fn new(max: u32, window: Duration) -> Self {
        let max = NonZeroU32::new(max).unwrap_or(NonZeroU32::MIN);
        let window = window.max(Duration::from_millis(1));
        let replenish = (window / max.get()).max(Duration::from_nanos(1));

        let quota = Quota::with_period(replenish)
            .unwrap_or_else(|| Quota::per_second(max))
            .allow_burst(max);

        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            max,
            window,
        }
    }

    /// Waits until another execution may be admitted
    pub async fn admit(&self) {
        self.limiter.until_ready().await;
    }

    /// Admits immediately if the window has room
    pub fn try_admit(&self) -> bool {
        self.limiter.check().is_ok()
    }

    pub fn max(&self) -> u32 {
        self.max.get()
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl From<&WorkerConfig> for AdmissionLimiter {
    fn from(config: &WorkerConfig) -> Self {
        Self::new(config.rate_limit_max, config.rate_limit_window())
    }
}
