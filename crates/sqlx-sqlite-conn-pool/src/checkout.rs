//! Scoped checkouts that return their connection on drop

use std::future::{Future, IntoFuture};
use std::ops::{Deref, DerefMut};
use std::pin::Pin;

use sqlx::sqlite::SqliteConnection;

use crate::Result;
use crate::pool::ConnectionPool;

/// Checkout builder returned by [`ConnectionPool::connect`].
///
/// Await it to get a [`PooledConnection`]:
///
/// ```no_run
/// # async fn demo(pool: sqlx_sqlite_conn_pool::ConnectionPool) -> sqlx_sqlite_conn_pool::Result<()> {
/// {
///    let mut conn = pool.connect().await?;
///    sqlx::query("SELECT 1").execute(&mut *conn).await?;
/// } // returned to the pool here
///
/// // Or take the raw connection and hand it back yourself
/// let conn = pool.connect().await?.detach();
/// pool.release(conn);
/// # Ok(())
/// # }
/// ```
#[must_use = "a checkout does nothing unless awaited"]
pub struct Connect {
   pool: ConnectionPool,
}

impl Connect {
   pub(crate) fn new(pool: ConnectionPool) -> Self {
      Self { pool }
   }

   /// Acquire the connection. Same semantics as [`ConnectionPool::acquire`].
   pub async fn acquire(self) -> Result<PooledConnection> {
      let conn = self.pool.acquire().await?;

      Ok(PooledConnection {
         conn: Some(conn),
         pool: self.pool,
      })
   }
}

impl IntoFuture for Connect {
   type Output = Result<PooledConnection>;
   type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

   fn into_future(self) -> Self::IntoFuture {
      Box::pin(self.acquire())
   }
}

/// RAII guard for a connection checked out of a [`ConnectionPool`].
///
/// Dereferences to [`SqliteConnection`]. Dropping the guard releases the
/// connection back to the pool, whatever state the caller left it in.
#[must_use = "if unused, the connection is immediately returned to the pool"]
pub struct PooledConnection {
   conn: Option<SqliteConnection>,
   pool: ConnectionPool,
}

impl PooledConnection {
   /// The pool this connection belongs to
   pub fn pool(&self) -> &ConnectionPool {
      &self.pool
   }

   /// Take the connection out of the guard without returning it.
   ///
   /// The caller becomes responsible for passing it to
   /// [`ConnectionPool::release`] or [`ConnectionPool::discard`].
   pub fn detach(mut self) -> SqliteConnection {
      self.conn.take().expect("connection already taken")
   }

   /// Destroy the connection instead of returning it to the pool.
   pub fn discard(mut self) {
      if let Some(conn) = self.conn.take() {
         self.pool.discard(conn);
      }
   }
}

impl Deref for PooledConnection {
   type Target = SqliteConnection;

   fn deref(&self) -> &Self::Target {
      self.conn.as_ref().expect("connection already taken")
   }
}

impl DerefMut for PooledConnection {
   fn deref_mut(&mut self) -> &mut Self::Target {
      self.conn.as_mut().expect("connection already taken")
   }
}

impl Drop for PooledConnection {
   fn drop(&mut self) {
      if let Some(conn) = self.conn.take() {
         self.pool.release(conn);
      }
   }
}
