//! Per-connection session policy

use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode};

use crate::Result;

/// Applies the session settings every pooled connection is opened with.
///
/// - `journal_mode = WAL` so readers keep working while a writer holds the lock
/// - `busy_timeout = 0` so lock contention comes back as `SQLITE_BUSY` right
///   away instead of parking the task inside the driver
///
/// These always win over whatever the caller put in `options`.
pub(crate) fn apply_session_settings(options: SqliteConnectOptions) -> SqliteConnectOptions {
   options
      .journal_mode(SqliteJournalMode::Wal)
      .busy_timeout(Duration::ZERO)
}

/// Returns `true` when `conn` is inside an open transaction.
///
/// Reads SQLite's autocommit flag directly, so it also sees transactions
/// started with raw `BEGIN` statements that sqlx does not track.
pub async fn is_in_transaction(conn: &mut SqliteConnection) -> Result<bool> {
   let mut handle = conn.lock_handle().await?;
   let db = handle.as_raw_handle().as_ptr();

   // SAFETY: `db` comes from the locked handle, which keeps the connection
   // alive and unused by the worker thread until `handle` is dropped.
   let autocommit = unsafe { libsqlite3_sys::sqlite3_get_autocommit(db) };

   Ok(autocommit == 0)
}
