//! Reconnection backoff.
//!
//! The connection actor never reconnects by itself. The registry consults a
//! [`ReconnectPolicy`] when a session drops before the stream finished.

use std::time::Duration;

use rand::Rng;

/// Bounded exponential backoff with jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Maximum reconnection attempts in a row (0 disables reconnection).
    pub max_attempts: u32,
    /// Delay before the first attempt.
    pub initial_delay: Duration,
    /// Upper bound for any delay, jitter included.
    pub max_delay: Duration,
    /// Growth factor between consecutive attempts.
    pub multiplier: f64,
    /// Jitter fraction (0.0 to 1.0) applied symmetrically around the delay.
    pub jitter: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

impl ReconnectPolicy {
    /// A policy that never reconnects.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Whether any reconnection attempt is allowed.
    pub const fn is_enabled(&self) -> bool {
        self.max_attempts > 0
    }

    /// Whether attempt number `attempt` (0-based) is allowed.
    pub const fn allows(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before attempt number `attempt` (0-based), without jitter.
    #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        Self::capped(secs, self.max_delay)
    }

    /// Delay before attempt number `attempt` (0-based), jittered and capped.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt).as_secs_f64();
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 || base == 0.0 {
            return Self::capped(base, self.max_delay);
        }
        let spread = base * jitter;
        let jittered = rand::thread_rng().gen_range((base - spread)..=(base + spread));
        Self::capped(jittered, self.max_delay)
    }

    /// `secs` as a duration no longer than `max`; overflow and NaN map to `max`.
    fn capped(secs: f64, max: Duration) -> Duration {
        Duration::try_from_secs_f64(secs.max(0.0)).map_or(max, |delay| delay.min(max))
    }
}
