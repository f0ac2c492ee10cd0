//! Cancellation of blocking pool calls

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Handle that aborts blocking calls made with it
///
/// Tokens are issued by [`ObjectPool::cancel_token`](crate::ObjectPool::cancel_token).
/// Cancelling wakes every waiter of the issuing pool; those holding this
/// token return `PoolError::Cancelled`, the rest go back to waiting.
/// A cancelled token stays cancelled, so any later blocking call made with
/// it fails as soon as it would have to wait. Passing a token to a pool
/// other than its issuer fails with `PoolError::ForeignCancelToken`.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{ObjectPool, PoolConfiguration, PoolError};
/// use std::thread;
///
/// let pool = ObjectPool::<String>::new(PoolConfiguration::new().with_open_on_create(true));
/// let token = pool.cancel_token();
///
/// let waiter = {
///     let pool = pool.clone();
///     let token = token.clone();
///     thread::spawn(move || pool.acquire_cancellable(&token))
/// };
///
/// token.cancel();
/// assert_eq!(waiter.join().unwrap(), Err(PoolError::Cancelled));
/// ```
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    wake: Arc<dyn Fn() + Send + Sync>,
    issuer: usize,
}

impl CancelToken {
    /// `issuer` identifies the pool whose waiters `wake` reaches.
    pub(crate) fn new(issuer: usize, wake: Arc<dyn Fn() + Send + Sync>) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            wake,
            issuer,
        }
    }

    pub(crate) fn is_issued_by(&self, issuer: usize) -> bool {
        self.issuer == issuer
    }

    /// Cancel every call waiting on this token
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            (self.wake)();
        }
    }

    /// Check whether `cancel` has been called
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_cancel_wakes_once() {
        let wakes = Arc::new(AtomicUsize::new(0));
        let token = {
            let wakes = Arc::clone(&wakes);
            CancelToken::new(1, Arc::new(move || {
                wakes.fetch_add(1, Ordering::SeqCst);
            }))
        };
        let clone = token.clone();

        assert!(!clone.is_cancelled());
        token.cancel();
        clone.cancel();

        assert!(clone.is_cancelled());
        assert_eq!(wakes.load(Ordering::SeqCst), 1);
        assert!(clone.is_issued_by(1));
        assert!(!clone.is_issued_by(2));
    }
}
