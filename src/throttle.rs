//! Token-bucket limiter shared by every request to the rate-limited API.
//!
//! The bucket starts full. Each [`Throttler::acquire`] runs an accounting
//! pass that converts elapsed time into whole tokens, then takes one token or
//! sleeps until the next one can be minted. Only the calling task sleeps.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::trace;

use crate::config::ThrottleSettings;

#[derive(Debug)]
struct ThrottleState {
    available: u32,
    last_refill: Instant,
}

#[derive(Debug)]
pub struct Throttler {
    capacity: u32,
    refill_interval: Duration,
    state: Mutex<ThrottleState>,
}

impl Default for Throttler {
    /// Three requests per second, the published Jikan limit.
    fn default() -> Self {
        Self::new(3, interval_for_rate(3))
    }
}

/// Refill interval for `per_second` tokens a second, rounded up to the next
/// nanosecond so the steady-state rate never exceeds `per_second`.
pub fn interval_for_rate(per_second: u32) -> Duration {
    let per_second = u64::from(per_second.max(1));
    Duration::from_nanos((1_000_000_000 + per_second - 1) / per_second)
}

impl Throttler {
    /// Panics if `capacity` or `refill_interval` is zero.
    pub fn new(capacity: u32, refill_interval: Duration) -> Self {
        assert!(capacity > 0, "throttle capacity must be positive");
        assert!(!refill_interval.is_zero(), "refill interval must be positive");

        Self {
            capacity,
            refill_interval,
            state: Mutex::new(ThrottleState {
                available: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn from_settings(settings: &ThrottleSettings) -> Self {
        Self::new(
            settings.capacity,
            interval_for_rate(settings.requests_per_second),
        )
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn refill_interval(&self) -> Duration {
        self.refill_interval
    }

    /// Waits for a token and takes it. Has no timeout; wrap the call in
    /// `tokio::time::timeout` to bound the wait.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                self.refill(&mut state, now);

                if state.available > 0 {
                    state.available -= 1;
                    trace!(available = state.available, "Throttle token granted");
                    return;
                }

                self.refill_interval
                    .saturating_sub(now.saturating_duration_since(state.last_refill))
            };

            trace!(wait_ms = wait.as_millis() as u64, "Throttle bucket empty, waiting");
            sleep(wait).await;
        }
    }

    /// Tokens available right now, after an accounting pass.
    pub async fn available(&self) -> u32 {
        let mut state = self.state.lock().await;
        self.refill(&mut state, Instant::now());
        state.available
    }

    /// Adds whole elapsed intervals. `last_refill` only moves by the time
    /// actually converted, so a partial interval keeps counting.
    fn refill(&self, state: &mut ThrottleState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill);
        let minted = elapsed.as_nanos() / self.refill_interval.as_nanos();
        if minted == 0 {
            return;
        }

        let minted = u32::try_from(minted).unwrap_or(u32::MAX);
        state.available = state.available.saturating_add(minted).min(self.capacity);

        if state.available == self.capacity {
            state.last_refill = now;
        } else {
            state.last_refill += self.refill_interval * minted;
        }
    }
}
