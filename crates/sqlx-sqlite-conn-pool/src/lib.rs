//! # sqlx-sqlite-conn-pool
//!
//! A small, bounded pool of SQLx SQLite connections with fail-fast locking.
//!
//! ## Core Types
//!
//! - **[`ConnectionPool`]**: Lazily grown pool with FIFO waiting and an orderly shutdown
//! - **[`ConnectionPoolConfig`]**: Pool sizing
//! - **[`Connect`]** / **[`PooledConnection`]**: Scoped checkout that returns the connection on drop
//! - **[`Error`]**: Error type for pool operations
//!
//! ## Connection Policy
//!
//! - **Lazy growth**: Connections are opened on demand, up to `max_size`
//! - **WAL mode**: Every connection is opened with `journal_mode = WAL`
//! - **No driver-level waiting**: `busy_timeout = 0`, so lock contention is
//!   reported as `SQLITE_BUSY` immediately and retried by the caller instead

mod checkout;
mod config;
mod error;
mod pool;
mod session;

// Re-export public types
pub use checkout::{Connect, PooledConnection};
pub use config::{ConnectionPoolConfig, DEFAULT_MAX_SIZE};
pub use error::{Error, Result};
pub use pool::ConnectionPool;
pub use session::is_in_transaction;
