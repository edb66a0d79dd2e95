//! Configuration for SQLite connection pools

use serde::Deserialize;

/// Default upper bound on simultaneously open connections.
pub const DEFAULT_MAX_SIZE: usize = 8;

/// Configuration for [`ConnectionPool`](crate::ConnectionPool)
///
/// # Examples
///
/// ```
/// use sqlx_sqlite_conn_pool::ConnectionPoolConfig;
///
/// // Use defaults
/// let config = ConnectionPoolConfig::default();
/// assert_eq!(config.max_size, 8);
///
/// // Customize
/// let config = ConnectionPoolConfig { max_size: 4 };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionPoolConfig {
   /// Maximum number of connections the pool keeps open at the same time
   ///
   /// Connections are opened lazily, so a lightly used pool never reaches
   /// this number. Must be at least 1.
   ///
   /// Default: 8
   pub max_size: usize,
}

impl Default for ConnectionPoolConfig {
   fn default() -> Self {
      Self {
         max_size: DEFAULT_MAX_SIZE,
      }
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_default_max_size() {
      assert_eq!(ConnectionPoolConfig::default().max_size, DEFAULT_MAX_SIZE);
   }

   #[test]
   fn test_deserialize_fills_missing_fields() {
      let config: ConnectionPoolConfig = serde_json::from_str("{}").unwrap();
      assert_eq!(config, ConnectionPoolConfig::default());

      let config: ConnectionPoolConfig = serde_json::from_str(r#"{"max_size": 2}"#).unwrap();
      assert_eq!(config.max_size, 2);
   }
}
