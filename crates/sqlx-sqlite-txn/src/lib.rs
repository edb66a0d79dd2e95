//! # sqlx-sqlite-txn
//!
//! SQLite transactions for [`sqlx_sqlite_conn_pool`] that wait out lock
//! contention instead of failing on the first `SQLITE_BUSY`.
//!
//! Pooled connections run with `busy_timeout = 0`, so a `BEGIN` that cannot
//! get the lock fails immediately. [`Transaction`] catches exactly that case
//! and retries on a fixed interval, up to an optional timeout. Every other
//! error is returned to the caller untouched.
//!
//! ## Core Types
//!
//! - **[`Transaction`]**: Builder for a transaction on a pool or a held connection
//! - **[`ActiveTransaction`]**: An open transaction, finished by commit or rollback
//! - **[`TransactionKind`]**: `DEFERRED`, `IMMEDIATE` or `EXCLUSIVE`
//! - **[`Error`]**: Error type, with [`Error::Timeout`] distinct from driver errors

mod error;
mod ext;
mod kind;
mod transaction;

pub use error::{Error, Result, is_lock_contention};
pub use ext::{ConnectionTransactionExt, PoolTransactionExt};
pub use kind::TransactionKind;
pub use transaction::{ActiveTransaction, BEGIN_RETRY_INTERVAL, Transaction};
