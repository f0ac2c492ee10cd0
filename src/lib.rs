//! # EsoxSolutions.ResourcePool
//!
//! Thread-safe pool of caller-supplied resources with an explicit
//! open/close lifecycle.
//!
//! ## Features
//!
//! - Resources tracked by `Arc` identity, never by value
//! - Blocking, timed, cancellable and async acquisition
//! - Graceful close that waits for borrowed resources, and forced close
//! - Removal of borrowed resources once they are released, or immediately
//! - Automatic release via RAII leases (Drop trait)
//! - Health monitoring and metrics
//! - Prometheus metrics export
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_resourcepool::{ObjectPool, PoolConfiguration};
//! use std::sync::Arc;
//!
//! let pool = ObjectPool::with_resources(
//!     vec![Arc::new(1), Arc::new(2), Arc::new(3)],
//!     PoolConfiguration::new().with_open_on_create(true),
//! );
//! {
//!     let lease = pool.lease().unwrap();
//!     println!("Got: {}", *lease);
//!     // Resource automatically released when `lease` goes out of scope
//! }
//! assert_eq!(pool.available_count(), 3);
//! ```

mod cancel;
mod config;
mod errors;
mod health;
mod metrics;
mod pool;
mod state;

pub use cancel::CancelToken;
pub use config::{PoolConfiguration, ReleasePolicy};
pub use errors::{PoolError, PoolResult};
pub use health::HealthStatus;
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use metrics::PoolMetrics;
pub use pool::{Lease, ObjectPool};
