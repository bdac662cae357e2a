//! Adaptive request spacing shared by the listing strategies.

use bridge_traits::time::Clock;
use core_async::sync::Mutex;
use core_async::time::{sleep, Duration};
use std::sync::Arc;
use tracing::debug;

/// Upper bound for the delay after repeated throttling.
pub const MAX_DELAY: Duration = Duration::from_secs(60);

/// Limiter handle shared by every source talking to the same provider.
pub type SharedRateLimiter = Arc<Mutex<RateLimiter>>;

/// Enforces a minimum delay between successive requests.
///
/// The delay starts at `base_delay`. [`throttled`](Self::throttled) doubles it
/// up to [`MAX_DELAY`], and [`relax`](Self::relax) halves it back toward the
/// base after a successful request.
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    last_request_ms: Option<i64>,
    base_delay: Duration,
    current_delay: Duration,
    max_delay: Duration,
}

impl RateLimiter {
    pub fn new(delay_ms: u64, clock: Arc<dyn Clock>) -> Self {
        let base_delay = Duration::from_millis(delay_ms);
        Self {
            clock,
            last_request_ms: None,
            base_delay,
            current_delay: base_delay,
            max_delay: MAX_DELAY.max(base_delay),
        }
    }

    /// Wraps a new limiter for sharing.
    pub fn shared(delay_ms: u64, clock: Arc<dyn Clock>) -> SharedRateLimiter {
        Arc::new(Mutex::new(Self::new(delay_ms, clock)))
    }

    pub fn current_delay(&self) -> Duration {
        self.current_delay
    }

    /// Sleeps until `current_delay` has passed since the previous request,
    /// then stamps the new request time.
    pub async fn wait_if_needed(&mut self) {
        if let Some(last) = self.last_request_ms {
            let elapsed_ms = self.clock.unix_timestamp_millis() - last;
            let required_ms = self.current_delay.as_millis() as i64;
            if elapsed_ms < required_ms {
                let wait_time = Duration::from_millis((required_ms - elapsed_ms) as u64);
                debug!("Rate limiting: waiting {:?}", wait_time);
                sleep(wait_time).await;
            }
        }
        self.last_request_ms = Some(self.clock.unix_timestamp_millis());
    }

    /// The provider pushed back; double the spacing.
    pub fn throttled(&mut self) {
        let doubled = self
            .current_delay
            .max(Duration::from_millis(1))
            .saturating_mul(2);
        self.current_delay = doubled.min(self.max_delay);
        debug!(delay = ?self.current_delay, "Rate limiter backing off");
    }

    /// A request succeeded; move back toward the base delay.
    pub fn relax(&mut self) {
        if self.current_delay > self.base_delay {
            self.current_delay = (self.current_delay / 2).max(self.base_delay);
        }
    }
}
