//! Transactions that wait out lock contention at BEGIN

use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use sqlx::sqlite::SqliteConnection;
use sqlx_sqlite_conn_pool::{ConnectionPool, PooledConnection, is_in_transaction};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result, is_lock_contention};
use crate::kind::TransactionKind;

/// Pause between BEGIN attempts while the database is locked.
pub const BEGIN_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Where a transaction gets its connection from
enum Source<'c> {
   Pool(ConnectionPool),
   Connection(&'c mut SqliteConnection),
}

/// The connection a transaction runs on once it has one
enum Bound<'c> {
   /// Checked out by the transaction; goes back to the pool afterwards
   Checkout(PooledConnection),
   /// Supplied by the caller and left with them
   Borrowed(&'c mut SqliteConnection),
}

impl Bound<'_> {
   fn connection(&self) -> &SqliteConnection {
      match self {
         Bound::Checkout(conn) => &**conn,
         Bound::Borrowed(conn) => &**conn,
      }
   }

   fn connection_mut(&mut self) -> &mut SqliteConnection {
      match self {
         Bound::Checkout(conn) => &mut **conn,
         Bound::Borrowed(conn) => &mut **conn,
      }
   }
}

/// A transaction that has not begun yet.
///
/// Built from a pool (the transaction checks a connection out and returns
/// it when done) or from a connection the caller already holds.
///
/// If `BEGIN` fails because another connection holds the lock, it is retried
/// on the same connection every [`BEGIN_RETRY_INTERVAL`] until it succeeds
/// or the optional timeout has elapsed. Nothing else is retried.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use sqlx_sqlite_conn_pool::ConnectionPool;
/// use sqlx_sqlite_txn::{Transaction, TransactionKind};
///
/// # async fn demo(pool: ConnectionPool) -> sqlx_sqlite_txn::Result<()> {
/// Transaction::new(&pool)
///    .kind(TransactionKind::Immediate)
///    .timeout(Duration::from_secs(5))
///    .run(|conn| {
///       Box::pin(async move {
///          sqlx::query("UPDATE accounts SET balance = balance - 10 WHERE id = 1")
///             .execute(&mut *conn)
///             .await?;
///          Ok::<_, sqlx_sqlite_txn::Error>(())
///       })
///    })
///    .await
/// # }
/// ```
#[must_use = "a transaction does nothing until begun"]
pub struct Transaction<'c> {
   source: Source<'c>,
   kind: Option<TransactionKind>,
   timeout: Option<Duration>,
}

impl Transaction<'static> {
   /// Transaction on a connection checked out of `pool`
   pub fn new(pool: &ConnectionPool) -> Self {
      Self {
         source: Source::Pool(pool.clone()),
         kind: None,
         timeout: None,
      }
   }
}

impl<'c> Transaction<'c> {
   /// Transaction on a connection the caller already holds
   pub fn on(conn: &'c mut SqliteConnection) -> Self {
      Self {
         source: Source::Connection(conn),
         kind: None,
         timeout: None,
      }
   }

   /// BEGIN mode; unset means SQLite's default
   pub fn kind(mut self, kind: TransactionKind) -> Self {
      self.kind = Some(kind);
      self
   }

   /// Stop retrying a locked BEGIN once this much time has passed.
   ///
   /// The clock starts before the pool checkout, so time spent waiting for a
   /// connection counts toward the timeout.
   pub fn timeout(mut self, timeout: Duration) -> Self {
      self.timeout = Some(timeout);
      self
   }

   /// Check out a connection if needed and issue BEGIN.
   ///
   /// # Errors
   ///
   /// - [`Error::Timeout`] if the database was still locked when the timeout ran out
   /// - [`Error::Pool`] if no connection could be checked out
   /// - [`Error::Sqlx`] for any other BEGIN failure, returned without retrying
   ///
   /// A connection checked out by this call is back in the pool whenever an
   /// error is returned.
   pub async fn begin(self) -> Result<ActiveTransaction<'c>> {
      let Self {
         source,
         kind,
         timeout,
      } = self;

      let started = Instant::now();
      let mut bound = match source {
         Source::Pool(pool) => Bound::Checkout(pool.connect().await?),
         Source::Connection(conn) => Bound::Borrowed(conn),
      };

      let statement = TransactionKind::begin_statement(kind);
      let mut attempts = 0u32;

      loop {
         attempts += 1;

         match sqlx::query(statement).execute(bound.connection_mut()).await {
            Ok(_) => break,
            Err(err) if is_lock_contention(&err) => {
               if let Some(timeout) = timeout
                  && started.elapsed() >= timeout
               {
                  debug!(attempts, ?timeout, "Gave up waiting for the database lock");
                  // Dropping `bound` hands an owned checkout back to the pool
                  return Err(Error::Timeout { timeout });
               }

               trace!(attempts, "Database is locked, retrying BEGIN");
               tokio::time::sleep(BEGIN_RETRY_INTERVAL).await;
            }
            Err(err) => return Err(err.into()),
         }
      }

      debug!(statement, attempts, "Transaction started");

      Ok(ActiveTransaction {
         bound: Some(bound),
         settled: false,
      })
   }

   /// Run `f` inside the transaction.
   ///
   /// Commits when `f` returns `Ok` and rolls back when it returns `Err`.
   /// The body's error is returned as is; if the rollback fails as well, that
   /// failure is logged rather than replacing it.
   pub async fn run<F, T, E>(self, f: F) -> std::result::Result<T, E>
   where
      F: for<'t> FnOnce(&'t mut SqliteConnection) -> BoxFuture<'t, std::result::Result<T, E>>,
      E: From<Error>,
   {
      let mut tx = self.begin().await?;

      match f(&mut *tx).await {
         Ok(value) => {
            tx.commit().await?;
            Ok(value)
         }
         Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
               warn!(error = %rollback_err, "Rollback after failed transaction body also failed");
            }
            Err(err)
         }
      }
   }
}

/// A transaction between a successful BEGIN and COMMIT/ROLLBACK.
///
/// Dereferences to the underlying [`SqliteConnection`]. Finish it with
/// [`commit`](Self::commit) or [`rollback`](Self::rollback). If it is
/// dropped while the transaction is still open, a pool-owned connection is
/// discarded rather than returned mid-transaction.
#[must_use = "if unused, the transaction is immediately abandoned"]
pub struct ActiveTransaction<'c> {
   bound: Option<Bound<'c>>,

   /// Connection is known to be out of its transaction
   settled: bool,
}

impl ActiveTransaction<'_> {
   /// Whether the connection goes back to a pool when this transaction ends
   pub fn owns_checkout(&self) -> bool {
      matches!(self.bound, Some(Bound::Checkout(_)))
   }

   /// Commit the transaction.
   ///
   /// If COMMIT fails and leaves the transaction open, a ROLLBACK is
   /// attempted before the COMMIT error is returned.
   pub async fn commit(self) -> Result<()> {
      self.finish(true).await
   }

   /// Roll the transaction back.
   pub async fn rollback(self) -> Result<()> {
      self.finish(false).await
   }

   async fn finish(mut self, commit: bool) -> Result<()> {
      let result = end_transaction(&mut self, commit).await;

      // Anything short of a confirmed clean connection gets discarded on drop
      self.settled = matches!(is_in_transaction(&mut self).await, Ok(false));

      result
   }
}

/// COMMIT or ROLLBACK, skipped when no transaction is open on `conn`.
async fn end_transaction(conn: &mut SqliteConnection, commit: bool) -> Result<()> {
   if !is_in_transaction(conn).await? {
      trace!("No open transaction, nothing to end");
      return Ok(());
   }

   if !commit {
      sqlx::query("ROLLBACK").execute(&mut *conn).await?;
      debug!("Transaction rolled back");
      return Ok(());
   }

   match sqlx::query("COMMIT").execute(&mut *conn).await {
      Ok(_) => {
         debug!("Transaction committed");
         Ok(())
      }
      Err(err) => {
         // A failed COMMIT (e.g. SQLITE_BUSY) can leave the transaction open
         if matches!(is_in_transaction(conn).await, Ok(true))
            && let Err(rollback_err) = sqlx::query("ROLLBACK").execute(&mut *conn).await
         {
            warn!(error = %rollback_err, "Rollback after failed COMMIT also failed");
         }
         Err(err.into())
      }
   }
}

impl Deref for ActiveTransaction<'_> {
   type Target = SqliteConnection;

   fn deref(&self) -> &Self::Target {
      self
         .bound
         .as_ref()
         .expect("connection already taken")
         .connection()
   }
}

impl DerefMut for ActiveTransaction<'_> {
   fn deref_mut(&mut self) -> &mut Self::Target {
      self
         .bound
         .as_mut()
         .expect("connection already taken")
         .connection_mut()
   }
}

impl Drop for ActiveTransaction<'_> {
   fn drop(&mut self) {
      match self.bound.take() {
         Some(Bound::Checkout(conn)) if !self.settled => {
            warn!("Transaction dropped while open, discarding its connection");
            conn.discard();
         }
         Some(Bound::Borrowed(_)) if !self.settled => {
            warn!("Transaction dropped while open on a caller-supplied connection");
         }
         // A settled checkout returns to the pool as the guard drops
         _ => {}
      }
   }
}
