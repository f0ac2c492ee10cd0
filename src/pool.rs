//! Core resource pool implementation

use crate::cancel::CancelToken;
use crate::config::{PoolConfiguration, ReleasePolicy};
use crate::errors::{PoolError, PoolResult};
use crate::health::HealthStatus;
#[cfg(feature = "metrics")]
use crate::metrics::MetricsExporter;
use crate::metrics::{MetricsTracker, Occupancy, PoolMetrics};
use crate::state::{PoolState, ReleaseOutcome, ResourceKey};

use log::{debug, trace, warn};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// A borrowed resource that is released back to its pool when dropped
pub struct Lease<R: ?Sized + Send + Sync + 'static> {
    resource: Option<Arc<R>>,
    pool: ObjectPool<R>,
}

impl<R: ?Sized + Send + Sync + 'static> Lease<R> {
    fn new(resource: Arc<R>, pool: ObjectPool<R>) -> Self {
        Self {
            resource: Some(resource),
            pool,
        }
    }

    /// The shared handle of the borrowed resource
    pub fn resource(&self) -> &Arc<R> {
        self.resource.as_ref().expect("Resource already detached")
    }

    /// Take the resource out without releasing it.
    ///
    /// The resource stays busy until passed to [`ObjectPool::release`].
    pub fn detach(mut self) -> Arc<R> {
        self.resource.take().expect("Resource already detached")
    }
}

impl<R: ?Sized + Send + Sync + 'static> Deref for Lease<R> {
    type Target = R;

    fn deref(&self) -> &Self::Target {
        self.resource()
    }
}

impl<R: ?Sized + Send + Sync + 'static> Drop for Lease<R> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take()
            && let Err(error) = self.pool.release(&resource)
        {
            warn!("{}: lease dropped: {}", self.pool.name(), error);
        }
    }
}

/// Counts a suspended async acquirer; the count drops with the future.
struct WaitingAcquirer<'a, R: ?Sized> {
    shared: &'a Shared<R>,
}

impl<R: ?Sized> Drop for WaitingAcquirer<'_, R> {
    fn drop(&mut self) {
        self.shared.state.lock().waiting_acquirers -= 1;
    }
}

struct Shared<R: ?Sized> {
    state: Mutex<PoolState<R>>,
    /// A resource became available, or the pool stopped accepting acquisitions.
    available: Condvar,
    /// The busy set is empty.
    drained: Condvar,
    /// A pending removal resolved.
    removed: Condvar,
    /// Async counterpart of `available`.
    async_available: Notify,
    metrics: MetricsTracker,
    config: PoolConfiguration,
}

impl<R: ?Sized> Shared<R> {
    fn signal_available(&self) {
        self.available.notify_one();
        self.async_available.notify_one();
    }

    fn wake_all(&self) {
        self.available.notify_all();
        self.drained.notify_all();
        self.removed.notify_all();
        self.async_available.notify_waiters();
    }
}

/// Thread-safe pool of caller-supplied resources
///
/// Resources are tracked by the identity of their `Arc`, never by value.
/// The pool starts closed unless configured otherwise; resources can be
/// added in any state but are only handed out while it is open.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{ObjectPool, PoolConfiguration};
/// use std::sync::Arc;
///
/// let pool = ObjectPool::new(PoolConfiguration::default());
/// let connection = Arc::new("connection".to_string());
/// pool.add(Arc::clone(&connection)).unwrap();
/// pool.open();
///
/// let borrowed = pool.acquire().unwrap();
/// assert!(Arc::ptr_eq(&borrowed, &connection));
/// pool.release(&borrowed).unwrap();
///
/// pool.close().unwrap();
/// assert!(!pool.is_open());
/// ```
pub struct ObjectPool<R: ?Sized> {
    shared: Arc<Shared<R>>,
}

impl<R: ?Sized> Clone for ObjectPool<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R: ?Sized + Send + Sync + 'static> ObjectPool<R> {
    /// Create an empty pool
    pub fn new(config: PoolConfiguration) -> Self {
        Self::with_resources(Vec::new(), config)
    }

    /// Create a pool populated with initial resources
    ///
    /// Duplicate handles to the same allocation are added once.
    pub fn with_resources<I>(resources: I, config: PoolConfiguration) -> Self
    where
        I: IntoIterator<Item = Arc<R>>,
    {
        let mut state = PoolState::new(config.open_on_create);
        let metrics = MetricsTracker::default();
        for resource in resources {
            if state.insert_available(resource) {
                MetricsTracker::record(&metrics.total_added);
            }
        }
        debug!(
            "{}: created with {} resource(s), open: {}",
            config.name,
            state.available_len(),
            state.open
        );

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                available: Condvar::new(),
                drained: Condvar::new(),
                removed: Condvar::new(),
                async_available: Notify::new(),
                metrics,
                config,
            }),
        }
    }

    /// Name from the pool configuration
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Start accepting acquisitions
    pub fn open(&self) {
        let mut state = self.shared.state.lock();
        if !state.open {
            state.open = true;
            debug!("{}: opened", self.name());
        }
    }

    /// Whether the pool currently accepts acquisitions
    pub fn is_open(&self) -> bool {
        self.shared.state.lock().open
    }

    /// Stop accepting acquisitions, wait for every busy resource to come back,
    /// then forget all resources.
    ///
    /// Threads blocked in `acquire` fail with `PoolError::NotOpen` right away.
    pub fn close(&self) -> PoolResult<()> {
        self.close_inner(None)
    }

    /// [`close`](Self::close) that gives up when `token` is cancelled.
    ///
    /// A cancelled close leaves the pool closed but keeps its resources.
    pub fn close_cancellable(&self, token: &CancelToken) -> PoolResult<()> {
        self.check_token(token)?;
        self.close_inner(Some(token))
    }

    fn close_inner(&self, token: Option<&CancelToken>) -> PoolResult<()> {
        let shared = &*self.shared;
        let mut state = shared.state.lock();
        state.open = false;
        debug!("{}: closing, {} busy resource(s)", self.name(), state.busy_len());

        shared.available.notify_all();
        shared.async_available.notify_waiters();

        while state.busy_len() > 0 {
            if is_cancelled(token) {
                drop(state);
                debug!("{}: close cancelled", self.name());
                MetricsTracker::record(&shared.metrics.cancellations);
                return Err(PoolError::Cancelled);
            }
            shared.drained.wait(&mut state);
        }

        state.clear();
        shared.wake_all();
        debug!("{}: closed", self.name());
        Ok(())
    }

    /// Close without waiting; outstanding borrows are abandoned.
    ///
    /// Blocked acquirers fail with `PoolError::NotOpen`, blocked removers and
    /// closers complete.
    pub fn close_now(&self) {
        let shared = &*self.shared;
        let mut state = shared.state.lock();
        state.open = false;
        let abandoned = state.busy_len();
        state.clear();
        shared.wake_all();
        drop(state);
        debug!("{}: closed now, abandoned {} busy resource(s)", self.name(), abandoned);
    }

    /// Borrow a resource, blocking until one is available
    pub fn acquire(&self) -> PoolResult<Arc<R>> {
        loop {
            if let Some(resource) = self.wait_for_resource(None, None)? {
                return Ok(resource);
            }
        }
    }

    /// [`acquire`](Self::acquire) that gives up when `token` is cancelled.
    pub fn acquire_cancellable(&self, token: &CancelToken) -> PoolResult<Arc<R>> {
        self.check_token(token)?;
        loop {
            if let Some(resource) = self.wait_for_resource(None, Some(token))? {
                return Ok(resource);
            }
        }
    }

    /// Borrow a resource, waiting at most `timeout`
    ///
    /// Returns `Ok(None)` when the timeout elapses. A pool that is not open
    /// fails with `PoolError::NotOpen` instead.
    pub fn acquire_timeout(&self, timeout: Duration) -> PoolResult<Option<Arc<R>>> {
        let deadline = deadline_after(timeout)?;
        self.wait_for_resource(Some(deadline), None)
    }

    /// [`acquire_timeout`](Self::acquire_timeout) that gives up when `token` is cancelled.
    pub fn acquire_timeout_cancellable(
        &self,
        timeout: Duration,
        token: &CancelToken,
    ) -> PoolResult<Option<Arc<R>>> {
        let deadline = deadline_after(timeout)?;
        self.check_token(token)?;
        self.wait_for_resource(Some(deadline), Some(token))
    }

    /// Borrow a resource if one is available right now
    pub fn try_acquire(&self) -> PoolResult<Option<Arc<R>>> {
        let shared = &*self.shared;
        let mut state = shared.state.lock();
        if !state.open {
            drop(state);
            MetricsTracker::record(&shared.metrics.not_open_rejections);
            return Err(PoolError::NotOpen);
        }
        let resource = state.take_available();
        drop(state);
        if resource.is_some() {
            MetricsTracker::record(&shared.metrics.total_acquired);
        }
        Ok(resource)
    }

    fn wait_for_resource(
        &self,
        deadline: Option<Instant>,
        token: Option<&CancelToken>,
    ) -> PoolResult<Option<Arc<R>>> {
        let shared = &*self.shared;
        let mut state = shared.state.lock();
        loop {
            if !state.open {
                drop(state);
                MetricsTracker::record(&shared.metrics.not_open_rejections);
                return Err(PoolError::NotOpen);
            }
            if let Some(resource) = state.take_available() {
                drop(state);
                trace!("{}: acquired resource", self.name());
                MetricsTracker::record(&shared.metrics.total_acquired);
                return Ok(Some(resource));
            }
            if is_cancelled(token) {
                drop(state);
                debug!("{}: acquire cancelled", self.name());
                MetricsTracker::record(&shared.metrics.cancellations);
                return Err(PoolError::Cancelled);
            }

            trace!("{}: no resource available, waiting", self.name());
            state.waiting_acquirers += 1;
            let timed_out = match deadline {
                Some(deadline) => shared.available.wait_until(&mut state, deadline).timed_out(),
                None => {
                    shared.available.wait(&mut state);
                    false
                }
            };
            state.waiting_acquirers -= 1;

            if timed_out && state.open && state.available_len() == 0 {
                drop(state);
                trace!("{}: acquire timed out", self.name());
                MetricsTracker::record(&shared.metrics.acquire_timeouts);
                return Ok(None);
            }
        }
    }

    /// Borrow a resource without blocking a thread
    ///
    /// Dropping the returned future abandons the wait and leaves the pool
    /// untouched. While suspended the caller counts as a waiting acquirer.
    pub async fn acquire_async(&self) -> PoolResult<Arc<R>> {
        let shared = &*self.shared;
        loop {
            let notified = shared.async_available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = shared.state.lock();
                if !state.open {
                    drop(state);
                    MetricsTracker::record(&shared.metrics.not_open_rejections);
                    return Err(PoolError::NotOpen);
                }
                if let Some(resource) = state.take_available() {
                    drop(state);
                    trace!("{}: acquired resource asynchronously", self.name());
                    MetricsTracker::record(&shared.metrics.total_acquired);
                    return Ok(resource);
                }
                state.waiting_acquirers += 1;
            }

            let _waiting = WaitingAcquirer { shared };
            notified.await;
        }
    }

    /// Async borrow bounded by `timeout`, `Ok(None)` on expiry
    pub async fn acquire_async_timeout(&self, timeout: Duration) -> PoolResult<Option<Arc<R>>> {
        deadline_after(timeout)?;
        match tokio::time::timeout(timeout, self.acquire_async()).await {
            Ok(result) => result.map(Some),
            Err(_) => {
                MetricsTracker::record(&self.shared.metrics.acquire_timeouts);
                Ok(None)
            }
        }
    }

    /// Borrow a resource wrapped in a [`Lease`] that releases it on drop
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::{ObjectPool, PoolConfiguration};
    /// use std::sync::Arc;
    ///
    /// let pool = ObjectPool::with_resources(
    ///     vec![Arc::new(7)],
    ///     PoolConfiguration::new().with_open_on_create(true),
    /// );
    ///
    /// {
    ///     let lease = pool.lease().unwrap();
    ///     assert_eq!(*lease, 7);
    ///     assert_eq!(pool.busy_count(), 1);
    /// }
    ///
    /// assert_eq!(pool.available_count(), 1);
    /// ```
    pub fn lease(&self) -> PoolResult<Lease<R>> {
        let resource = self.acquire()?;
        Ok(Lease::new(resource, self.clone()))
    }

    /// [`lease`](Self::lease) waiting at most `timeout`
    pub fn lease_timeout(&self, timeout: Duration) -> PoolResult<Option<Lease<R>>> {
        let resource = self.acquire_timeout(timeout)?;
        Ok(resource.map(|resource| Lease::new(resource, self.clone())))
    }

    /// Hand a borrowed resource back
    ///
    /// A resource pending removal leaves the pool instead of becoming
    /// available. Works whether or not the pool is open. Resources that are
    /// not busy are handled according to [`ReleasePolicy`].
    pub fn release(&self, resource: &Arc<R>) -> PoolResult<()> {
        let shared = &*self.shared;
        let mut state = shared.state.lock();
        let outcome = state.release(ResourceKey::of(resource));
        match outcome {
            ReleaseOutcome::Returned => shared.signal_available(),
            ReleaseOutcome::Dropped => {
                shared.removed.notify_all();
            }
            ReleaseOutcome::NotBusy => {}
        }
        if outcome != ReleaseOutcome::NotBusy && state.busy_len() == 0 {
            shared.drained.notify_all();
        }
        debug_assert!(state.invariants_hold());
        drop(state);

        match outcome {
            ReleaseOutcome::Returned => {
                trace!("{}: released resource", self.name());
                MetricsTracker::record(&shared.metrics.total_released);
                Ok(())
            }
            ReleaseOutcome::Dropped => {
                trace!("{}: released resource pending removal, dropped", self.name());
                MetricsTracker::record(&shared.metrics.total_removed);
                Ok(())
            }
            ReleaseOutcome::NotBusy => match shared.config.release_policy {
                ReleasePolicy::Ignore => {
                    trace!("{}: ignored release of a resource that is not busy", self.name());
                    Ok(())
                }
                ReleasePolicy::Reject => Err(PoolError::UnknownResource),
            },
        }
    }

    /// Make a resource available
    ///
    /// Returns `Ok(false)` if it already was. Adding is allowed while the pool
    /// is closed. A resource that is currently borrowed cannot be added.
    pub fn add(&self, resource: Arc<R>) -> PoolResult<bool> {
        let shared = &*self.shared;
        let mut state = shared.state.lock();
        if state.is_busy(ResourceKey::of(&resource)) {
            return Err(PoolError::IllegalResource("resource is currently borrowed"));
        }
        let added = state.insert_available(resource);
        if added {
            shared.signal_available();
        }
        drop(state);

        if added {
            trace!("{}: added resource", self.name());
            MetricsTracker::record(&shared.metrics.total_added);
        }
        Ok(added)
    }

    /// Remove a resource, waiting for it to be released if it is borrowed
    ///
    /// Returns `Ok(false)` if the pool does not track the resource. A
    /// borrowed resource is flagged for removal and the call returns once it
    /// is released, evicted with `remove_now`, or the pool is closed.
    pub fn remove(&self, resource: &Arc<R>) -> PoolResult<bool> {
        self.remove_inner(resource, None)
    }

    /// [`remove`](Self::remove) that gives up when `token` is cancelled.
    ///
    /// The removal request is withdrawn unless another caller is still
    /// waiting for the same resource.
    pub fn remove_cancellable(&self, resource: &Arc<R>, token: &CancelToken) -> PoolResult<bool> {
        self.check_token(token)?;
        self.remove_inner(resource, Some(token))
    }

    fn remove_inner(&self, resource: &Arc<R>, token: Option<&CancelToken>) -> PoolResult<bool> {
        let shared = &*self.shared;
        let key = ResourceKey::of(resource);
        let mut state = shared.state.lock();

        if state.remove_available(key) {
            drop(state);
            trace!("{}: removed available resource", self.name());
            MetricsTracker::record(&shared.metrics.total_removed);
            return Ok(true);
        }
        if !state.is_busy(key) {
            trace!("{}: resource to remove not found", self.name());
            return Ok(false);
        }

        let ticket = state.mark_pending(key);
        trace!("{}: resource to remove is busy, waiting for release", self.name());
        while state.is_pending(ticket) {
            if is_cancelled(token) {
                state.withdraw_pending(ticket);
                drop(state);
                debug!("{}: remove cancelled", self.name());
                MetricsTracker::record(&shared.metrics.cancellations);
                return Err(PoolError::Cancelled);
            }
            shared.removed.wait(&mut state);
        }
        trace!("{}: pending removal resolved", self.name());
        Ok(true)
    }

    /// Remove a resource immediately, even if it is borrowed
    ///
    /// Threads blocked in `remove` for the same resource are released.
    pub fn remove_now(&self, resource: &Arc<R>) -> bool {
        let shared = &*self.shared;
        let mut state = shared.state.lock();
        let eviction = state.evict(ResourceKey::of(resource));
        if eviction.cancelled_pending {
            shared.removed.notify_all();
        }
        if eviction.removed && state.busy_len() == 0 {
            shared.drained.notify_all();
        }
        drop(state);

        if eviction.removed {
            trace!("{}: removed resource now", self.name());
            MetricsTracker::record(&shared.metrics.total_removed);
        }
        eviction.removed
    }

    /// Issue a token for the cancellable variants of the blocking calls
    ///
    /// Only this pool's cancellable calls accept the token.
    pub fn cancel_token(&self) -> CancelToken {
        let shared = Arc::downgrade(&self.shared);
        CancelToken::new(self.identity(), Arc::new(move || {
            if let Some(shared) = shared.upgrade() {
                let _state = shared.state.lock();
                shared.wake_all();
            }
        }))
    }

    /// Address of the shared allocation. Issued tokens hold a `Weak` to it,
    /// so it is not reused while any token exists.
    fn identity(&self) -> usize {
        Arc::as_ptr(&self.shared) as *const () as usize
    }

    fn check_token(&self, token: &CancelToken) -> PoolResult<()> {
        if token.is_issued_by(self.identity()) {
            Ok(())
        } else {
            Err(PoolError::ForeignCancelToken)
        }
    }

    /// Whether the resource is tracked, available or busy
    pub fn contains(&self, resource: &Arc<R>) -> bool {
        let key = ResourceKey::of(resource);
        let state = self.shared.state.lock();
        state.is_available(key) || state.is_busy(key)
    }

    /// Whether the resource is currently borrowed
    pub fn is_busy(&self, resource: &Arc<R>) -> bool {
        self.shared.state.lock().is_busy(ResourceKey::of(resource))
    }

    /// Get available count
    pub fn available_count(&self) -> usize {
        self.shared.state.lock().available_len()
    }

    /// Get busy count
    pub fn busy_count(&self) -> usize {
        self.shared.state.lock().busy_len()
    }

    /// Get the number of busy resources flagged for removal
    pub fn pending_removal_count(&self) -> usize {
        self.shared.state.lock().pending_len()
    }

    /// Get health status
    pub fn get_health_status(&self) -> HealthStatus {
        HealthStatus::new(self.occupancy(), self.shared.config.high_utilization_threshold)
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolMetrics {
        self.shared.metrics.get_metrics(self.occupancy())
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format
    #[cfg(feature = "metrics")]
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> PoolResult<String> {
        MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }

    fn occupancy(&self) -> Occupancy {
        let state = self.shared.state.lock();
        Occupancy {
            available: state.available_len(),
            busy: state.busy_len(),
            pending_removal: state.pending_len(),
            waiting: state.waiting_acquirers,
            open: state.open,
        }
    }
}

impl<R: ?Sized + Send + Sync + 'static> Default for ObjectPool<R> {
    fn default() -> Self {
        Self::new(PoolConfiguration::default())
    }
}

impl<R: ?Sized> fmt::Debug for ObjectPool<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("ObjectPool")
            .field("name", &self.shared.config.name)
            .field("open", &state.open)
            .field("available", &state.available_len())
            .field("busy", &state.busy_len())
            .field("pending_removal", &state.pending_len())
            .finish()
    }
}

fn deadline_after(timeout: Duration) -> PoolResult<Instant> {
    Instant::now()
        .checked_add(timeout)
        .ok_or(PoolError::InvalidTimeout(timeout))
}

fn is_cancelled(token: Option<&CancelToken>) -> bool {
    token.is_some_and(CancelToken::is_cancelled)
}
