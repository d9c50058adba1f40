//! Reconnect backoff.
//!
//! Capped exponential backoff with full jitter: the delay before attempt `n`
//! is drawn uniformly from `[0, min(cap, base * 2^n)]`.

use std::time::Duration;

use rand::Rng;

/// Backoff state for one reconnect sequence.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap: cap.max(base),
            attempt: 0,
        }
    }

    /// Number of delays handed out since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Upper bound of the delay for `attempt` (0-based).
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let base_ms = self.base.as_millis() as u64;
        let exponential = base_ms.saturating_mul(1u64 << attempt.min(31));
        Duration::from_millis(exponential).min(self.cap)
    }

    /// Delay before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let ceiling = self.ceiling(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        full_jitter(ceiling)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Uniform random duration in `[0, ceiling]`.
pub fn full_jitter(ceiling: Duration) -> Duration {
    let ms = ceiling.as_millis() as u64;
    if ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=ms))
}
