//! Exponential backoff shared by the watcher and the cgit scraper.

use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1000;

/// Maximum backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Configuration for retry operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Minimum delay between retries.
    pub min_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Maximum number of retry attempts.
    pub max_retries: usize,
    /// Whether to add jitter to delays.
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_delay: Duration::from_millis(MAX_BACKOFF_MS),
            max_retries: 5,
            with_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom values.
    #[must_use]
    pub fn new(min_delay: Duration, max_delay: Duration, max_retries: usize) -> Self {
        Self {
            min_delay,
            max_delay,
            max_retries,
            with_jitter: true,
        }
    }

    /// Set whether to use jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    /// Build an exponential backoff strategy from this configuration.
    #[must_use]
    pub fn into_backoff(self) -> ExponentialBuilder {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries);

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }
}

/// A resettable stream of backoff delays.
///
/// `next_delay` yields `None` once `max_retries` delays were handed out;
/// `reset` starts over after a success.
#[derive(Debug)]
pub struct Backoff {
    config: RetryConfig,
    current: ExponentialBackoff,
    attempts: usize,
}

impl Backoff {
    pub fn new(config: RetryConfig) -> Self {
        let current = config.clone().into_backoff().build();
        Self {
            config,
            current,
            attempts: 0,
        }
    }

    /// Delay before the next attempt, or `None` when the budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        let delay = self.current.next()?;
        self.attempts += 1;
        Some(delay)
    }

    /// Like [`next_delay`](Self::next_delay), but keeps returning `max_delay`
    /// once the budget is spent.
    pub fn next_delay_saturating(&mut self) -> Duration {
        self.next_delay().unwrap_or(self.config.max_delay)
    }

    /// Consecutive failures recorded since the last reset.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.current = self.config.clone().into_backoff().build();
        self.attempts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();

        assert_eq!(config.min_delay, Duration::from_millis(INITIAL_BACKOFF_MS));
        assert_eq!(config.max_delay, Duration::from_millis(MAX_BACKOFF_MS));
        assert_eq!(config.max_retries, 5);
        assert!(config.with_jitter);
    }

    #[test]
    fn test_retry_config_without_jitter() {
        let config = RetryConfig::default().with_jitter(false);
        assert!(!config.with_jitter);
    }

    #[test]
    fn backoff_doubles_until_max_and_then_runs_out() {
        let config =
            RetryConfig::new(Duration::from_secs(1), Duration::from_secs(3), 3).with_jitter(false);
        let mut backoff = Backoff::new(config);

        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(1)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(2)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(3)));
        assert_eq!(backoff.attempts(), 3);
        assert_eq!(backoff.next_delay(), None);
        assert_eq!(backoff.next_delay_saturating(), Duration::from_secs(3));
    }

    #[test]
    fn reset_starts_over() {
        let config =
            RetryConfig::new(Duration::from_millis(10), Duration::from_secs(1), 2).with_jitter(false);
        let mut backoff = Backoff::new(config);
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.next_delay(), None);

        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(10)));
    }
}
