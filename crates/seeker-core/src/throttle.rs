//! Politeness delay between listing activations.
//!
//! The crawler opens listings one after another in a single session; a short
//! randomized pause between items keeps it from bursting requests at the site.

use std::time::Duration;

/// Configuration for the pause between consecutive items.
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Minimum pause between two items.
    pub delay: Duration,

    /// Maximum random jitter added on top of `delay` (uniform [0, jitter)).
    ///
    /// Set to `Duration::ZERO` to disable.
    pub jitter: Duration,
}

impl ThrottleConfig {
    /// Create a new config with the given delay and no jitter.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            jitter: Duration::ZERO,
        }
    }

    /// No pause at all. Intended for tests and fake sessions.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Add random jitter (uniform [0, jitter)) on top of the base delay.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Compute the effective delay for a single pause (delay + random jitter).
    pub fn effective_delay(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.delay;
        }
        self.delay + Duration::from_millis(fastrand::u64(0..jitter_ms))
    }

    /// Sleep for one effective delay.
    pub async fn pause(&self) {
        let delay = self.effective_delay();
        if delay.is_zero() {
            return;
        }
        tracing::debug!(sleep_ms = %delay.as_millis(), "Pausing between items");
        tokio::time::sleep(delay).await;
    }
}

impl Default for ThrottleConfig {
    /// 2 seconds plus up to 2 seconds of jitter.
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            jitter: Duration::from_secs(2),
        }
    }
}
