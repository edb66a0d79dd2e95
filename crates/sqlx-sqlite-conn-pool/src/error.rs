//! Error types for sqlx-sqlite-conn-pool

use thiserror::Error;

/// Errors that may occur when working with sqlx-sqlite-conn-pool
#[derive(Error, Debug)]
pub enum Error {
   /// IO error when accessing database files. Standard library IO errors
   /// are converted to this variant.
   #[error("IO error: {0}")]
   Io(#[from] std::io::Error),

   /// Error from the sqlx library. Standard sqlx errors are converted to this variant
   #[error("Sqlx error: {0}")]
   Sqlx(#[from] sqlx::Error),

   /// Pool has been closed and hands out no more connections
   #[error("Connection pool has been closed")]
   PoolClosed,

   /// A pool must be allowed at least one connection
   #[error("Connection pool max_size must be at least 1")]
   InvalidMaxSize,
}

/// A type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
