//! Time-related abstractions.
//!
//! Re-exports `tokio::time` plus [`sleep_or_cancel`] and [`sleep_in_slices`],
//! the two sleeps used at cancellation checkpoints.

pub use std::time::{Duration, Instant};
pub use tokio::time::{sleep, timeout, Sleep, Timeout};

use crate::sync::CancellationToken;

/// Sleeps for `duration` unless `token` is cancelled first.
///
/// Returns `true` when the full duration elapsed and `false` when the sleep
/// was cut short by cancellation.
pub async fn sleep_or_cancel(duration: Duration, token: &CancellationToken) -> bool {
    if token.is_cancelled() {
        return false;
    }
    tokio::select! {
        _ = token.cancelled() => false,
        _ = sleep(duration) => true,
    }
}

/// Sleeps for `total` in steps no longer than `slice`, checking `token`
/// between steps.
///
/// Returns `true` when the full duration elapsed. A zero `slice` is treated as
/// one millisecond.
pub async fn sleep_in_slices(total: Duration, slice: Duration, token: &CancellationToken) -> bool {
    let slice = slice.max(Duration::from_millis(1));
    let mut remaining = total;
    while !remaining.is_zero() {
        if token.is_cancelled() {
            return false;
        }
        let step = remaining.min(slice);
        if !sleep_or_cancel(step, token).await {
            return false;
        }
        remaining = remaining.saturating_sub(step);
    }
    !token.is_cancelled()
}
