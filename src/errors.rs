//! Error types for the resource pool

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The pool was not open when the call started, or was closed while the
    /// caller waited for a resource.
    #[error("Pool is not open")]
    NotOpen,

    #[error("Illegal resource: {0}")]
    IllegalResource(&'static str),

    /// The deadline `now + timeout` cannot be represented.
    #[error("Invalid timeout {0:?}")]
    InvalidTimeout(Duration),

    #[error("Operation was cancelled")]
    Cancelled,

    /// A cancellable call was given a token issued by a different pool.
    #[error("Cancel token was issued by another pool")]
    ForeignCancelToken,

    /// Returned by `release` under `ReleasePolicy::Reject` when the resource
    /// is not currently borrowed from this pool.
    #[error("Resource is not borrowed from this pool")]
    UnknownResource,

    #[cfg(feature = "metrics")]
    #[error("Metrics export failed: {0}")]
    MetricsExport(String),
}

pub type PoolResult<T> = Result<T, PoolError>;
