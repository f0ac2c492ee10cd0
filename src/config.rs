//! Pool configuration options

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What `release` does with a resource the pool does not consider busy.
///
/// This covers releasing a resource twice, releasing something that was
/// never acquired, and releasing a borrow that a `close_now` abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ReleasePolicy {
    /// Silently accept the call and change nothing.
    #[default]
    Ignore,

    /// Fail with `PoolError::UnknownResource`.
    Reject,
}

/// Configuration for resource pool behavior
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{PoolConfiguration, ReleasePolicy};
///
/// let config = PoolConfiguration::new()
///     .with_name("connections")
///     .with_open_on_create(true)
///     .with_release_policy(ReleasePolicy::Reject);
///
/// assert_eq!(config.name, "connections");
/// assert!(config.open_on_create);
/// assert_eq!(config.release_policy, ReleasePolicy::Reject);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfiguration {
    /// Label used in log lines and exported metrics
    pub name: String,

    /// Whether the pool starts in the open state
    pub open_on_create: bool,

    /// Handling of releases for resources that are not busy
    pub release_policy: ReleasePolicy,

    /// Utilization (0.0 to 1.0) above which the pool reports itself unhealthy
    pub high_utilization_threshold: f64,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            name: "pool".to_string(),
            open_on_create: false,
            release_policy: ReleasePolicy::Ignore,
            high_utilization_threshold: 0.9,
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Open the pool as soon as it is constructed
    pub fn with_open_on_create(mut self, open: bool) -> Self {
        self.open_on_create = open;
        self
    }

    /// Set the release policy
    pub fn with_release_policy(mut self, policy: ReleasePolicy) -> Self {
        self.release_policy = policy;
        self
    }

    /// Set the utilization threshold for health reporting
    ///
    /// Values outside `0.0..=1.0` are clamped.
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::new().with_high_utilization_threshold(1.5);
    /// assert_eq!(config.high_utilization_threshold, 1.0);
    /// ```
    pub fn with_high_utilization_threshold(mut self, threshold: f64) -> Self {
        self.high_utilization_threshold = threshold.clamp(0.0, 1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfiguration::default();
        assert_eq!(config.name, "pool");
        assert!(!config.open_on_create);
        assert_eq!(config.release_policy, ReleasePolicy::Ignore);
        assert_eq!(config.high_utilization_threshold, 0.9);
    }

    #[test]
    fn test_builder_chain() {
        let config = PoolConfiguration::new()
            .with_name("workers")
            .with_high_utilization_threshold(-0.5);

        assert_eq!(config.name, "workers");
        assert_eq!(config.high_utilization_threshold, 0.0);
        assert_eq!(config.release_policy, ReleasePolicy::Ignore);
    }
}
