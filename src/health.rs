//! Health monitoring for resource pools

use crate::metrics::Occupancy;

/// Health status of a resource pool
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{ObjectPool, PoolConfiguration};
/// use std::sync::Arc;
///
/// let pool = ObjectPool::with_resources(
///     vec![Arc::new(1), Arc::new(2), Arc::new(3)],
///     PoolConfiguration::new().with_open_on_create(true),
/// );
///
/// let health = pool.get_health_status();
/// assert!(health.is_healthy());
/// assert_eq!(health.available_resources, 3);
/// ```
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Whether the pool accepts acquisitions
    pub is_open: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Current pool utilization (0.0 to 1.0)
    pub utilization: f64,

    /// Available resources count
    pub available_resources: usize,

    /// Busy resources count
    pub busy_resources: usize,

    /// Busy resources waiting to be removed on release
    pub pending_removals: usize,

    /// Callers waiting in `acquire`, threads and async tasks alike
    pub waiting_acquirers: usize,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    pub(crate) fn new(occupancy: Occupancy, high_utilization_threshold: f64) -> Self {
        let utilization = occupancy.utilization();
        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if !occupancy.open {
            warnings.push("Pool is closed".to_string());
            is_healthy = false;
        }

        if utilization > high_utilization_threshold {
            warnings.push(format!("High utilization: {:.1}%", utilization * 100.0));
            is_healthy = false;
        }

        if occupancy.waiting > 0 && occupancy.available == 0 {
            warnings.push(format!(
                "{} acquirer(s) waiting with no available resources",
                occupancy.waiting
            ));
        }

        if occupancy.pending_removal > 0 {
            warnings.push(format!(
                "{} resource(s) pending removal",
                occupancy.pending_removal
            ));
        }

        Self {
            is_healthy,
            is_open: occupancy.open,
            warning_count: warnings.len(),
            utilization,
            available_resources: occupancy.available,
            busy_resources: occupancy.busy,
            pending_removals: occupancy.pending_removal,
            waiting_acquirers: occupancy.waiting,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_pool_is_unhealthy() {
        let health = HealthStatus::new(Occupancy::default(), 0.9);
        assert!(!health.is_healthy());
        assert_eq!(health.warnings, vec!["Pool is closed".to_string()]);
    }

    #[test]
    fn test_starved_waiters_warn_without_failing() {
        let health = HealthStatus::new(
            Occupancy {
                available: 0,
                busy: 1,
                pending_removal: 1,
                waiting: 2,
                open: true,
            },
            1.0,
        );

        assert!(health.is_healthy());
        assert_eq!(health.warning_count, 2);
        assert_eq!(health.utilization, 1.0);
    }

    #[test]
    fn test_high_utilization() {
        let health = HealthStatus::new(
            Occupancy {
                available: 1,
                busy: 9,
                pending_removal: 0,
                waiting: 0,
                open: true,
            },
            0.5,
        );

        assert!(!health.is_healthy());
        assert_eq!(health.warnings, vec!["High utilization: 90.0%".to_string()]);
    }
}
