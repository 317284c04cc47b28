use core::time::Duration;

use crate::{Error, Result};

/// How long [`Allocator::get`] waits for an identifier by default.
///
/// [`Allocator::get`]: crate::Allocator::get
pub const DEFAULT_GET_TIMEOUT: Duration = Duration::from_secs(1);

/// How long the refill loop waits between failed reload attempts by default.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Construction parameters for an [`Allocator`].
///
/// Only the business key and buffer capacity are required; both timings
/// default to one second.
///
/// # Example
///
/// ```
/// use core::time::Duration;
/// use segid::AllocatorConfig;
///
/// let config = AllocatorConfig::new("orders", 1024)
///     .with_get_timeout(Duration::from_millis(250))
///     .with_retry_backoff(Duration::from_millis(500));
/// assert!(config.validate().is_ok());
/// ```
///
/// [`Allocator`]: crate::Allocator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Name of the identifier series in the counter store.
    pub business: String,
    /// Number of identifiers buffered ahead of demand.
    pub capacity: usize,
    /// Upper bound on how long a single `get` waits.
    pub get_timeout: Duration,
    /// Pause between failed reload attempts.
    pub retry_backoff: Duration,
}

impl AllocatorConfig {
    pub fn new(business: impl Into<String>, capacity: usize) -> Self {
        Self {
            business: business.into(),
            capacity,
            get_timeout: DEFAULT_GET_TIMEOUT,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    #[must_use]
    pub const fn with_get_timeout(mut self, get_timeout: Duration) -> Self {
        self.get_timeout = get_timeout;
        self
    }

    #[must_use]
    pub const fn with_retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    /// Checks the configuration before any task is spawned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the business key is empty, the
    /// capacity is zero, or either duration is zero. A zero backoff would turn
    /// a store outage into a request storm.
    pub fn validate(&self) -> Result<()> {
        if self.business.is_empty() {
            return Err(invalid("business key must not be empty"));
        }
        if self.capacity == 0 {
            return Err(invalid("buffer capacity must be greater than 0"));
        }
        if self.get_timeout.is_zero() {
            return Err(invalid("get timeout must be greater than 0"));
        }
        if self.retry_backoff.is_zero() {
            return Err(invalid("retry backoff must be greater than 0"));
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> Error {
    Error::InvalidConfig {
        reason: reason.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_one_second() {
        let config = AllocatorConfig::new("b1", 8);
        assert_eq!(config.get_timeout, Duration::from_secs(1));
        assert_eq!(config.retry_backoff, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_invalid_values() {
        let cases = [
            AllocatorConfig::new("", 8),
            AllocatorConfig::new("b1", 0),
            AllocatorConfig::new("b1", 8).with_get_timeout(Duration::ZERO),
            AllocatorConfig::new("b1", 8).with_retry_backoff(Duration::ZERO),
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(Error::InvalidConfig { .. })),
                "accepted {config:?}"
            );
        }
    }
}
