//! Reconnection backoff policy.
//!
//! Capped exponential backoff with jitter, driving the connection
//! manager's retry loop. An attempt budget of zero means retry forever.

use std::time::Duration;

use rand::Rng;

/// Backoff configuration.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the delay between retries.
    pub max_delay: Duration,
    /// Growth factor applied to the delay after every attempt.
    pub multiplier: f64,
    /// Jitter as a fraction of the delay (0.1 = ±10%).
    pub jitter: f64,
    /// Attempt budget; 0 retries without limit.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.1,
            max_attempts: 0,
        }
    }
}

/// Stateful backoff tracker for one reconnect loop.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    current: Duration,
    attempts: u32,
}

impl ReconnectPolicy {
    /// Fresh policy starting at the configured initial delay.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        let current = config.initial_delay;
        Self {
            config,
            current,
            attempts: 0,
        }
    }

    /// Delay to wait before the next attempt, or `None` when the budget
    /// is spent. Advances the internal schedule.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.config.max_attempts != 0 && self.attempts >= self.config.max_attempts {
            return None;
        }
        self.attempts += 1;

        let delay = self.jittered(self.current);

        let scaled = self.current.as_secs_f64() * self.config.multiplier;
        self.current = if scaled.is_finite() && scaled > 0.0 {
            Duration::from_secs_f64(scaled).min(self.config.max_delay)
        } else {
            self.config.max_delay
        };

        Some(delay)
    }

    /// Attempts made since the last reset.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Restart the schedule after a healthy connection.
    pub const fn reset(&mut self) {
        self.current = self.config.initial_delay;
        self.attempts = 0;
    }

    fn jittered(&self, base: Duration) -> Duration {
        if self.config.jitter <= 0.0 || base.is_zero() {
            return base;
        }
        let base_secs = base.as_secs_f64();
        let spread = base_secs * self.config.jitter;
        let offset: f64 = rand::rng().random_range(-spread..=spread);
        Duration::from_secs_f64((base_secs + offset).max(0.001))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_without_jitter(max_attempts: u32) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(2000),
            multiplier: 2.0,
            jitter: 0.0,
            max_attempts,
        }
    }

    #[test]
    fn delays_grow_exponentially_up_to_the_cap() {
        let mut policy = ReconnectPolicy::new(config_without_jitter(0));

        assert_eq!(policy.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(200)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(400)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(800)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(1600)));
        // Capped from here on.
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(2000)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(2000)));
    }

    #[test]
    fn budget_is_enforced() {
        let mut policy = ReconnectPolicy::new(config_without_jitter(2));
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_some());
        assert_eq!(policy.attempts(), 2);
        assert!(policy.next_delay().is_none());
    }

    #[test]
    fn reset_restarts_the_schedule() {
        let mut policy = ReconnectPolicy::new(config_without_jitter(3));
        let _ = policy.next_delay();
        let _ = policy.next_delay();

        policy.reset();
        assert_eq!(policy.attempts(), 0);
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        for _ in 0..200 {
            let mut policy = ReconnectPolicy::new(ReconnectConfig {
                initial_delay: Duration::from_millis(1000),
                jitter: 0.1,
                ..config_without_jitter(0)
            });
            let delay = policy.next_delay().unwrap();
            assert!(delay >= Duration::from_millis(900), "delay {delay:?}");
            assert!(delay <= Duration::from_millis(1100), "delay {delay:?}");
        }
    }

    #[test]
    fn zero_budget_means_unlimited() {
        let mut policy = ReconnectPolicy::new(config_without_jitter(0));
        for _ in 0..500 {
            assert!(policy.next_delay().is_some());
        }
    }
}
