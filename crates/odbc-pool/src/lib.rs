//! # odbc-pool
//!
//! Bounded, thread-safe connection pool for database sessions.
//!
//! Establishing a database session is slow, and servers cap how many they
//! accept. The pool keeps a bounded set of sessions alive and lends them out
//! through [`PooledConnection`] handles that return themselves on drop.
//!
//! ## Features
//!
//! - Configurable min/max pool sizes with best-effort pre-warming
//! - Blocking checkout with a deadline, no busy polling
//! - Session creation and liveness probes run outside the pool lock
//! - Optional liveness probes on borrow and on return
//! - Background health checker evicting dead and long-idle sessions
//! - Handles hold only a weak reference to the pool, so they can outlive it
//! - Idempotent shutdown that disconnects every session exactly once
//! - Comprehensive metrics for observability
//!
//! ## Example
//!
//! ```rust,ignore
//! use odbc_pool::{Pool, PoolConfig};
//! use std::time::Duration;
//!
//! // Using the builder pattern
//! let pool = Pool::<OdbcSession>::builder()
//!     .session_config(connection_config)
//!     .min_connections(5)
//!     .max_connections(20)
//!     .max_idle_time(Duration::from_secs(300))
//!     .test_on_borrow(true)
//!     .build()?;
//!
//! // Or using PoolConfig directly
//! let config = PoolConfig::new()
//!     .min_connections(5)
//!     .max_connections(20);
//!
//! let pool = Pool::<OdbcSession>::new(config, connection_config)?;
//!
//! // Get a connection from the pool
//! let mut conn = pool.acquire(Duration::from_secs(5))?;
//! let rows = conn.query("SELECT id, name FROM users")?;
//! // Connection automatically returned to pool on drop
//!
//! // Check pool status
//! let status = pool.status();
//! println!("Pool utilization: {:.1}%", status.utilization());
//!
//! // Get metrics
//! let metrics = pool.metrics();
//! println!("Checkout success rate: {:.2}", metrics.checkout_success_rate());
//!
//! // Tear down; handles still out disconnect their sessions when dropped
//! pool.shutdown();
//! ```
//!
//! ## Sharing a pool
//!
//! There is no global pool. Construct one where the application is wired up
//! and pass it around as `Arc<Pool<S>>`. Call [`Pool::shutdown`] (or drop
//! the last `Arc`) before the session driver itself is torn down.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod error;
mod health;
pub mod lifecycle;
pub mod pool;

// Configuration
pub use config::PoolConfig;

// Error types
pub use error::PoolError;

// Pool types
pub use connection::PooledConnection;
pub use pool::{Pool, PoolBuilder, PoolMetrics, PoolStatus};

// Lifecycle management
pub use lifecycle::{ConnectionMetadata, ConnectionState, HealthCheckReport};

// Session contract
pub use odbc_session::{Session, SessionError};
