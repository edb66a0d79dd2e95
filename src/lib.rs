//! Bounded SQLite connection pool with transactions that retry on lock contention.
//!
//! This crate bundles [`sqlx_sqlite_conn_pool`] and [`sqlx_sqlite_txn`]
//! behind one import.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use sqlite_txpool::{ConnectionPool, ConnectionPoolConfig, PoolTransactionExt};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = ConnectionPool::open("app.db", Some(ConnectionPoolConfig { max_size: 4 }))?;
//!
//! pool
//!    .immediate()
//!    .timeout(Duration::from_secs(5))
//!    .run(|conn| {
//!       Box::pin(async move {
//!          sqlx::query("INSERT INTO events (name) VALUES ('started')")
//!             .execute(&mut *conn)
//!             .await?;
//!          Ok::<_, sqlite_txpool::TransactionError>(())
//!       })
//!    })
//!    .await?;
//!
//! pool.close().await?;
//! # Ok(())
//! # }
//! ```

pub use sqlx_sqlite_conn_pool::{
   Connect, ConnectionPool, ConnectionPoolConfig, DEFAULT_MAX_SIZE, Error as PoolError,
   PooledConnection, Result as PoolResult, is_in_transaction,
};
pub use sqlx_sqlite_txn::{
   ActiveTransaction, BEGIN_RETRY_INTERVAL, ConnectionTransactionExt, Error as TransactionError,
   PoolTransactionExt, Result as TransactionResult, Transaction, TransactionKind,
   is_lock_contention,
};
