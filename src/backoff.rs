use std::time::Duration;

/// Delay between failed attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffConfig {
    pub delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(1))
    }
}

impl BackoffConfig {
    /// The same delay after every failure
    pub fn fixed(delay: Duration) -> Self {
        Self { delay }
    }
}

/// Tracks consecutive failures and yields the next delay
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Record a failure and return how long to wait before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        self.config.delay
    }

    /// Forget previous failures
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Consecutive failures since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }
}
