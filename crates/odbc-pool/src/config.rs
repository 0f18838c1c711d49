//! Pool configuration.

use std::time::Duration;

use crate::error::PoolError;

/// Configuration for a connection pool.
///
/// Immutable once the pool has been constructed.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Sessions created when the pool starts, and the floor kept by idle
    /// eviction.
    pub min_connections: usize,

    /// Upper bound on the number of sessions, idle and active combined.
    pub max_connections: usize,

    /// How long a session may sit idle before the health checker evicts it.
    pub max_idle_time: Duration,

    /// Default deadline for [`Pool::get`](crate::Pool::get).
    pub acquire_timeout: Duration,

    /// Period of the background health checker.
    pub validation_interval: Duration,

    /// Probe liveness before handing an idle session out.
    pub test_on_borrow: bool,

    /// Probe liveness before putting a returned session back.
    pub test_on_return: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 5,
            max_connections: 20,
            max_idle_time: Duration::from_secs(300),
            acquire_timeout: Duration::from_secs(30),
            validation_interval: Duration::from_secs(60),
            test_on_borrow: true,
            test_on_return: false,
        }
    }
}

impl PoolConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum number of connections.
    #[must_use]
    pub fn min_connections(mut self, count: usize) -> Self {
        self.min_connections = count;
        self
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub fn max_connections(mut self, count: usize) -> Self {
        self.max_connections = count;
        self
    }

    /// Set the maximum idle time.
    #[must_use]
    pub fn max_idle_time(mut self, timeout: Duration) -> Self {
        self.max_idle_time = timeout;
        self
    }

    /// Set the default acquisition timeout.
    #[must_use]
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set the health check period.
    #[must_use]
    pub fn validation_interval(mut self, interval: Duration) -> Self {
        self.validation_interval = interval;
        self
    }

    /// Enable or disable liveness probing on checkout.
    #[must_use]
    pub fn test_on_borrow(mut self, enabled: bool) -> Self {
        self.test_on_borrow = enabled;
        self
    }

    /// Enable or disable liveness probing on return.
    #[must_use]
    pub fn test_on_return(mut self, enabled: bool) -> Self {
        self.test_on_return = enabled;
        self
    }

    /// Check the configuration for inconsistent values.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_connections == 0 {
            return Err(PoolError::Config(
                "max_connections must be greater than zero".into(),
            ));
        }

        if self.min_connections > self.max_connections {
            return Err(PoolError::Config(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }

        if self.validation_interval.is_zero() {
            return Err(PoolError::Config(
                "validation_interval must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.min_connections, 5);
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.max_idle_time, Duration::from_secs(300));
        assert_eq!(config.acquire_timeout, Duration::from_secs(30));
        assert_eq!(config.validation_interval, Duration::from_secs(60));
        assert!(config.test_on_borrow);
        assert!(!config.test_on_return);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fluent_setters() {
        let config = PoolConfig::new()
            .min_connections(2)
            .max_connections(3)
            .acquire_timeout(Duration::from_secs(2))
            .test_on_borrow(false)
            .test_on_return(true);

        assert_eq!(config.min_connections, 2);
        assert_eq!(config.max_connections, 3);
        assert_eq!(config.acquire_timeout, Duration::from_secs(2));
        assert!(!config.test_on_borrow);
        assert!(config.test_on_return);
    }

    #[test]
    fn test_validate_rejects_min_above_max() {
        let err = PoolConfig::new()
            .min_connections(4)
            .max_connections(2)
            .validate()
            .unwrap_err();
        assert!(matches!(err, PoolError::Config(_)));
        assert!(err.to_string().contains("min_connections (4)"));
    }

    #[test]
    fn test_validate_rejects_zero_max() {
        let result = PoolConfig::new()
            .min_connections(0)
            .max_connections(0)
            .validate();
        assert!(matches!(result, Err(PoolError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let result = PoolConfig::new()
            .validation_interval(Duration::ZERO)
            .validate();
        assert!(matches!(result, Err(PoolError::Config(_))));
    }

    #[test]
    fn test_min_equal_to_max_is_valid() {
        assert!(
            PoolConfig::new()
                .min_connections(3)
                .max_connections(3)
                .validate()
                .is_ok()
        );
    }
}
