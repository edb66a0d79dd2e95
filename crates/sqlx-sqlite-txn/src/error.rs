use std::time::Duration;

/// Result type alias for transaction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Primary result code SQLite reports when another connection holds the lock.
const SQLITE_BUSY: i32 = 5;

/// Error types for transaction operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Error from SQLx operations.
   #[error(transparent)]
   Sqlx(#[from] sqlx::Error),

   /// Error from the connection pool.
   #[error(transparent)]
   Pool(#[from] sqlx_sqlite_conn_pool::Error),

   /// The database stayed locked for longer than the transaction's timeout.
   #[error("timed out after {timeout:?} waiting for the database lock")]
   Timeout { timeout: Duration },
}

impl Error {
   /// Extract a structured error code from the error type.
   ///
   /// This provides machine-readable error codes for error handling.
   pub fn error_code(&self) -> String {
      match self {
         Error::Sqlx(e) => {
            if let Some(code) = e.as_database_error().and_then(|db_err| db_err.code()) {
               return format!("SQLITE_{}", code);
            }
            "SQLX_ERROR".to_string()
         }
         Error::Pool(sqlx_sqlite_conn_pool::Error::PoolClosed) => "POOL_CLOSED".to_string(),
         Error::Pool(_) => "CONNECTION_ERROR".to_string(),
         Error::Timeout { .. } => "TIMEOUT".to_string(),
      }
   }

   /// Whether the pool was closed before a connection could be checked out.
   pub fn is_pool_closed(&self) -> bool {
      matches!(self, Error::Pool(sqlx_sqlite_conn_pool::Error::PoolClosed))
   }

   /// Whether this is a give-up-waiting timeout rather than a rejected statement.
   pub fn is_timeout(&self) -> bool {
      matches!(self, Error::Timeout { .. })
   }
}

/// Returns `true` if `err` means "database is locked" (`SQLITE_BUSY`).
///
/// Extended codes such as `SQLITE_BUSY_SNAPSHOT` count as contention too.
/// Table-level `SQLITE_LOCKED` does not.
pub fn is_lock_contention(err: &sqlx::Error) -> bool {
   err.as_database_error()
      .and_then(|db_err| db_err.code())
      .and_then(|code| code.parse::<i32>().ok())
      .is_some_and(|code| code & 0xff == SQLITE_BUSY)
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_error_code_timeout() {
      let err = Error::Timeout {
         timeout: Duration::from_millis(250),
      };
      assert_eq!(err.error_code(), "TIMEOUT");
      assert!(err.is_timeout());
      assert!(err.to_string().contains("250ms"));
   }

   #[test]
   fn test_error_code_pool_closed() {
      let err = Error::from(sqlx_sqlite_conn_pool::Error::PoolClosed);
      assert_eq!(err.error_code(), "POOL_CLOSED");
      assert!(err.is_pool_closed());
      assert!(!err.is_timeout());
   }

   #[test]
   fn test_error_code_other_pool_error() {
      let err = Error::from(sqlx_sqlite_conn_pool::Error::InvalidMaxSize);
      assert_eq!(err.error_code(), "CONNECTION_ERROR");
      assert!(!err.is_pool_closed());
   }

   #[test]
   fn test_error_code_sqlx_non_database() {
      // RowNotFound is not a database error, so no SQLite code
      let err = Error::Sqlx(sqlx::Error::RowNotFound);
      assert_eq!(err.error_code(), "SQLX_ERROR");
   }

   #[test]
   fn test_non_database_error_is_not_contention() {
      assert!(!is_lock_contention(&sqlx::Error::RowNotFound));
      assert!(!is_lock_contention(&sqlx::Error::PoolClosed));
   }
}
