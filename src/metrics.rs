//! Metrics collection and export for resource pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "metrics")]
use crate::errors::{PoolError, PoolResult};
#[cfg(feature = "metrics")]
use serde::Serialize;

/// Metrics data for a pool
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
/// let _resource = pool.acquire().unwrap();
/// let metrics = pool.get_metrics();
/// assert_eq!(metrics.total_acquired, 1);
/// assert_eq!(metrics.busy_resources, 1);
/// assert_eq!(metrics.available_resources, 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "metrics", derive(Serialize))]
pub struct PoolMetrics {
    /// Total successful acquisitions
    pub total_acquired: usize,

    /// Total releases that returned a resource to the available set
    pub total_released: usize,

    /// Total resources newly added
    pub total_added: usize,

    /// Total resources removed through `remove`, `remove_now` or a pending removal
    pub total_removed: usize,

    /// Timed acquisitions that expired without a resource
    pub acquire_timeouts: usize,

    /// Acquisitions refused because the pool was not open
    pub not_open_rejections: usize,

    /// Blocking calls abandoned through a cancel token
    pub cancellations: usize,

    /// Current available resources
    pub available_resources: usize,

    /// Current busy resources
    pub busy_resources: usize,

    /// Busy resources flagged for removal
    pub pending_removals: usize,

    /// Callers currently waiting in `acquire`, threads and async tasks alike
    pub waiting_acquirers: usize,

    /// Whether the pool accepts acquisitions
    pub is_open: bool,

    /// Busy share of all tracked resources (0.0 to 1.0)
    pub utilization: f64,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_acquired".to_string(), self.total_acquired.to_string());
        metrics.insert("total_released".to_string(), self.total_released.to_string());
        metrics.insert("total_added".to_string(), self.total_added.to_string());
        metrics.insert("total_removed".to_string(), self.total_removed.to_string());
        metrics.insert("acquire_timeouts".to_string(), self.acquire_timeouts.to_string());
        metrics.insert("not_open_rejections".to_string(), self.not_open_rejections.to_string());
        metrics.insert("cancellations".to_string(), self.cancellations.to_string());
        metrics.insert("available_resources".to_string(), self.available_resources.to_string());
        metrics.insert("busy_resources".to_string(), self.busy_resources.to_string());
        metrics.insert("pending_removals".to_string(), self.pending_removals.to_string());
        metrics.insert("waiting_acquirers".to_string(), self.waiting_acquirers.to_string());
        metrics.insert("is_open".to_string(), self.is_open.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// Every series carries a `pool` label plus the given tags. A tag key that
    /// is not a valid Prometheus label name fails with `PoolError::MetricsExport`.
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::{ObjectPool, PoolConfiguration};
    /// use std::collections::HashMap;
    /// use std::sync::Arc;
    ///
    /// let pool = ObjectPool::with_resources(vec![Arc::new(1)], PoolConfiguration::default());
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = pool.export_metrics_prometheus("my_pool", Some(&tags)).unwrap();
    /// assert!(output.contains("resourcepool_resources_available"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> PoolResult<String> {
        use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};

        let mut labels = tags.cloned().unwrap_or_default();
        if let Some(key) = labels.keys().find(|key| !is_valid_label_name(key)) {
            return Err(PoolError::MetricsExport(format!("invalid label name: {key:?}")));
        }
        labels.insert("pool".to_string(), pool_name.to_string());
        let registry = Registry::new_custom(None, Some(labels)).map_err(export_error)?;

        let gauges = [
            ("resourcepool_resources_available", "Current available resources", metrics.available_resources),
            ("resourcepool_resources_busy", "Current busy resources", metrics.busy_resources),
            ("resourcepool_resources_pending_removal", "Busy resources flagged for removal", metrics.pending_removals),
            ("resourcepool_acquirers_waiting", "Acquirers waiting for a resource", metrics.waiting_acquirers),
            ("resourcepool_open", "Whether the pool accepts acquisitions", usize::from(metrics.is_open)),
        ];
        for (name, help, value) in gauges {
            let gauge = IntGauge::new(name, help).map_err(export_error)?;
            gauge.set(value as i64);
            registry.register(Box::new(gauge)).map_err(export_error)?;
        }

        let utilization = Gauge::new("resourcepool_utilization", "Pool utilization ratio")
            .map_err(export_error)?;
        utilization.set(metrics.utilization);
        registry.register(Box::new(utilization)).map_err(export_error)?;

        let counters = [
            ("resourcepool_acquired_total", "Total resources acquired", metrics.total_acquired),
            ("resourcepool_released_total", "Total resources released", metrics.total_released),
            ("resourcepool_added_total", "Total resources added", metrics.total_added),
            ("resourcepool_removed_total", "Total resources removed", metrics.total_removed),
            ("resourcepool_acquire_timeouts_total", "Timed acquisitions that expired", metrics.acquire_timeouts),
            ("resourcepool_not_open_total", "Acquisitions refused by a closed pool", metrics.not_open_rejections),
            ("resourcepool_cancellations_total", "Blocking calls cancelled", metrics.cancellations),
        ];
        for (name, help, value) in counters {
            let counter = IntCounter::new(name, help).map_err(export_error)?;
            counter.inc_by(value as u64);
            registry.register(Box::new(counter)).map_err(export_error)?;
        }

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .map_err(export_error)?;
        String::from_utf8(buffer).map_err(export_error)
    }
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`, with the `__` prefix reserved
#[cfg(feature = "metrics")]
fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    !name.starts_with("__") && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(feature = "metrics")]
fn export_error(error: impl std::fmt::Display) -> PoolError {
    PoolError::MetricsExport(error.to_string())
}

/// Running counters, updated outside the pool lock
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub total_acquired: AtomicUsize,
    pub total_released: AtomicUsize,
    pub total_added: AtomicUsize,
    pub total_removed: AtomicUsize,
    pub acquire_timeouts: AtomicUsize,
    pub not_open_rejections: AtomicUsize,
    pub cancellations: AtomicUsize,
}

/// Gauges read under the pool lock
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Occupancy {
    pub available: usize,
    pub busy: usize,
    pub pending_removal: usize,
    pub waiting: usize,
    pub open: bool,
}

impl Occupancy {
    pub fn utilization(&self) -> f64 {
        let tracked = self.available + self.busy;
        if tracked > 0 {
            self.busy as f64 / tracked as f64
        } else {
            0.0
        }
    }
}

impl MetricsTracker {
    pub fn record(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, occupancy: Occupancy) -> PoolMetrics {
        PoolMetrics {
            total_acquired: self.total_acquired.load(Ordering::Relaxed),
            total_released: self.total_released.load(Ordering::Relaxed),
            total_added: self.total_added.load(Ordering::Relaxed),
            total_removed: self.total_removed.load(Ordering::Relaxed),
            acquire_timeouts: self.acquire_timeouts.load(Ordering::Relaxed),
            not_open_rejections: self.not_open_rejections.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
            available_resources: occupancy.available,
            busy_resources: occupancy.busy,
            pending_removals: occupancy.pending_removal,
            waiting_acquirers: occupancy.waiting,
            is_open: occupancy.open,
            utilization: occupancy.utilization(),
        }
    }
}
