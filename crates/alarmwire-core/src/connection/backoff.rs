// Retry timing for the push channel.

use std::time::Duration;

/// How the connection manager spaces out automatic reconnects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Wait before the first automatic retry.
    pub initial_delay: Duration,
    /// Ceiling for the doubled delay, before jitter.
    pub max_delay: Duration,
    /// Automatic retries after the first failed attempt. One more failure
    /// ends in `max-retries-exceeded`.
    pub max_retries: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: 5,
        }
    }
}

/// Largest jitter, as a share of the capped delay.
const JITTER_SPREAD: f64 = 0.25;

impl ReconnectConfig {
    /// Delay after `attempt` consecutive failures: the initial delay doubled
    /// per failure, capped at `max_delay`, then stretched by up to
    /// [`JITTER_SPREAD`]. The first retry is never stretched.
    ///
    /// Jitter is derived from the attempt number so a schedule is
    /// reproducible under a paused clock.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let doublings = attempt.min(20);
        let scaled = self
            .initial_delay
            .checked_mul(1_u32 << doublings)
            .unwrap_or(self.max_delay);
        let capped = scaled.min(self.max_delay);
        capped.mul_f64(1.0 + JITTER_SPREAD * jitter_fraction(attempt))
    }
}

/// Spread attempt numbers over `[0, 1)`; 0 for the first attempt.
fn jitter_fraction(attempt: u32) -> f64 {
    let mixed = attempt.wrapping_mul(0x9E37_79B9) >> 16;
    f64::from(mixed) / 65_536.0
}
