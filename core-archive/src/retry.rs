//! Capped exponential backoff.

use core_async::time::Duration;
use rand::Rng;

/// Delay schedule between attempts.
///
/// The delay before retry `n` (`n >= 1`) is `min(base * 2^(n-1), max)`, so
/// the first retry waits `base`, plus up to `jitter_ratio` of that value
/// drawn at random.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
    pub jitter_ratio: f64,
}

impl BackoffPolicy {
    pub const fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            jitter_ratio: 0.0,
        }
    }

    /// Fetch retries: 1 s base, 60 s cap, no jitter.
    pub const fn fetch_default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }

    /// Transfer retries: 1 s base, 60 s cap, up to 10% jitter.
    pub fn upload_default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60)).with_jitter(0.1)
    }

    pub fn with_jitter(mut self, ratio: f64) -> Self {
        self.jitter_ratio = ratio;
        self
    }

    /// Deterministic part of the delay before retry `retry`. Retry 0 is
    /// treated as the first retry.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .unwrap_or(self.max)
            .min(self.max)
    }

    /// [`delay_for`](Self::delay_for) plus random jitter.
    pub fn jittered_delay(&self, retry: u32) -> Duration {
        let delay = self.delay_for(retry);
        if self.jitter_ratio <= 0.0 || delay.is_zero() {
            return delay;
        }
        let extra = rand::thread_rng().gen_range(0.0..=self.jitter_ratio);
        delay + delay.mul_f64(extra)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::fetch_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double_until_cap() {
        let policy = BackoffPolicy::fetch_default();
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(6), Duration::from_secs(32));
        assert_eq!(policy.delay_for(7), Duration::from_secs(60));
        assert_eq!(policy.delay_for(40), Duration::from_secs(60));
    }

    #[test]
    fn test_first_retry_waits_base() {
        let policy = BackoffPolicy::new(Duration::from_millis(500), Duration::from_secs(10));
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(0), policy.delay_for(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(1));
    }

    #[test]
    fn test_delays_are_non_decreasing() {
        let policy = BackoffPolicy::new(Duration::from_millis(300), Duration::from_secs(10));
        let delays: Vec<Duration> = (1..=12).map(|n| policy.delay_for(n)).collect();
        assert!(delays.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(*delays.last().unwrap(), Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_stays_within_ratio() {
        let policy = BackoffPolicy::upload_default();
        for retry in 1..=4 {
            let base = policy.delay_for(retry);
            for _ in 0..50 {
                let delay = policy.jittered_delay(retry);
                assert!(delay >= base);
                assert!(delay <= base + base.mul_f64(0.1) + Duration::from_nanos(1));
            }
        }
    }
}
