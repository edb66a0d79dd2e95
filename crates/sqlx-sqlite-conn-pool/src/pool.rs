//! Bounded SQLite connection pool with lazy growth and FIFO waiting

use std::collections::VecDeque;
use std::fmt;
use std::path::Path;
use std::pin::pin;
use std::sync::Arc;

use parking_lot::Mutex;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, trace, warn};

use crate::checkout::Connect;
use crate::config::ConnectionPoolConfig;
use crate::error::{Error, Result};
use crate::session::apply_session_settings;

/// A bounded set of connections to one SQLite database.
///
/// ## Lifecycle
///
/// Connections are opened lazily: [`acquire`](Self::acquire) opens a new one
/// when nothing is idle and fewer than `max_size` exist, and otherwise waits
/// for one to be [`release`](Self::release)d. Waiters are served
/// first-come, first-served.
///
/// [`close`](Self::close) stops handing out connections immediately, then
/// waits for every checked-out connection to come back and closes them all.
///
/// ## Bookkeeping
///
/// - **`size`**: connections opened and not yet destroyed
/// - **`available`**: connections sitting idle in the pool
///
/// `available <= size <= max_size` holds at every suspension point.
///
/// Cloning is cheap; every clone refers to the same pool.
#[derive(Clone)]
pub struct ConnectionPool {
   shared: Arc<Shared>,
}

struct Shared {
   /// Driver options with the session policy already applied
   options: SqliteConnectOptions,

   max_size: usize,

   state: Mutex<PoolState>,

   /// One permit per idle connection not yet claimed by a waiter. Closed by
   /// `close()` to wake every pending `acquire` with `PoolClosed`.
   idle_permits: Semaphore,

   /// Signalled whenever a connection is released or a slot is forfeited
   returned: Notify,

   /// Signalled when a capacity slot frees up without a connection to hand over
   freed: Notify,
}

#[derive(Default)]
struct PoolState {
   idle: VecDeque<SqliteConnection>,
   size: usize,
   closed: bool,
}

impl ConnectionPool {
   /// Create a pool for the database described by `options`.
   ///
   /// `options` are passed through to every connection the pool opens, with
   /// WAL journaling and a zero busy timeout forced on top. No connection is
   /// opened until the first [`acquire`](Self::acquire).
   pub fn new(options: SqliteConnectOptions, config: Option<ConnectionPoolConfig>) -> Result<Self> {
      let config = config.unwrap_or_default();

      if config.max_size == 0 {
         return Err(Error::InvalidMaxSize);
      }

      Ok(Self {
         shared: Arc::new(Shared {
            options: apply_session_settings(options),
            max_size: config.max_size,
            state: Mutex::new(PoolState::default()),
            idle_permits: Semaphore::new(0),
            returned: Notify::new(),
            freed: Notify::new(),
         }),
      })
   }

   /// Create a pool for the database file at `path`, creating the file on
   /// first connect if it does not exist.
   pub fn open(path: impl AsRef<Path>, config: Option<ConnectionPoolConfig>) -> Result<Self> {
      let options = SqliteConnectOptions::new()
         .filename(path)
         .create_if_missing(true);

      Self::new(options, config)
   }

   /// Upper bound on simultaneously open connections
   pub fn max_size(&self) -> usize {
      self.shared.max_size
   }

   /// Number of connections opened and not yet destroyed
   pub fn size(&self) -> usize {
      self.shared.state.lock().size
   }

   /// Number of idle connections currently held by the pool
   pub fn available(&self) -> usize {
      self.shared.state.lock().idle.len()
   }

   /// Whether [`close`](Self::close) has been called
   pub fn is_closed(&self) -> bool {
      self.shared.state.lock().closed
   }

   /// Check out a connection.
   ///
   /// Opens a new connection if none is idle and the pool is below
   /// `max_size`; otherwise waits until one is released. There is no
   /// timeout: this waits until a connection is released or the pool closes.
   ///
   /// Cancel safe. Dropping the future while it waits never consumes a
   /// connection, and dropping it while a new connection is being opened
   /// gives the reserved slot back.
   ///
   /// # Errors
   ///
   /// - [`Error::PoolClosed`] if the pool is closed, including while waiting
   /// - [`Error::Sqlx`] if opening a new connection fails
   pub async fn acquire(&self) -> Result<SqliteConnection> {
      loop {
         // Registered before inspecting state so a slot freed in between is not missed
         let mut freed = pin!(self.shared.freed.notified());
         freed.as_mut().enable();

         let reserved_slot = {
            let mut state = self.shared.state.lock();

            if state.closed {
               return Err(Error::PoolClosed);
            }

            let grow = state.idle.is_empty() && state.size < self.shared.max_size;
            if grow {
               state.size += 1;
            }
            grow
         };

         if reserved_slot {
            return self.create_connection().await;
         }

         // A permit assigned in the same poll as `freed` must win, or FIFO breaks
         tokio::select! {
            biased;

            permit = self.shared.idle_permits.acquire() => {
               // Only `close()` closes the semaphore
               let permit = permit.map_err(|_| Error::PoolClosed)?;
               permit.forget();

               let mut state = self.shared.state.lock();

               // Leave the connection idle so `close()` reclaims it
               if state.closed {
                  return Err(Error::PoolClosed);
               }

               // Permits never outnumber idle connections while the pool is open
               let Some(conn) = state.idle.pop_front() else {
                  return Err(Error::PoolClosed);
               };

               trace!(available = state.idle.len(), "Handed out idle connection");
               return Ok(conn);
            }
            _ = freed.as_mut() => {
               trace!("Capacity freed while waiting, re-checking pool");
            }
         }
      }
   }

   /// Return a checked-out connection to the idle queue.
   ///
   /// Never blocks. Wakes the longest-waiting [`acquire`](Self::acquire), if
   /// any. The connection must have come from this pool.
   pub fn release(&self, conn: SqliteConnection) {
      {
         let mut state = self.shared.state.lock();
         state.idle.push_back(conn);
         self.shared.idle_permits.add_permits(1);
         trace!(available = state.idle.len(), size = state.size, "Connection released");
      }

      self.shared.returned.notify_waiters();
   }

   /// Destroy a checked-out connection instead of returning it.
   ///
   /// Use this for connections left in an unusable state (for example stuck
   /// inside a transaction). The connection's slot is freed, so a waiting
   /// [`acquire`](Self::acquire) can open a replacement.
   pub fn discard(&self, conn: SqliteConnection) {
      // Dropping a sqlx connection closes it (rolling back any open
      // transaction) on the driver's worker thread.
      drop(conn);
      debug!("Discarded pooled connection");
      self.forfeit_slot();
   }

   /// Returns a checkout builder.
   ///
   /// Awaiting it yields a [`PooledConnection`](crate::PooledConnection)
   /// that goes back to the pool when dropped.
   pub fn connect(&self) -> Connect {
      Connect::new(self.clone())
   }

   /// Close the pool and every connection it opened.
   ///
   /// The pool is marked closed before anything else, so pending and future
   /// [`acquire`](Self::acquire) calls fail with [`Error::PoolClosed`]. This
   /// then waits for all checked-out connections to be released, closing
   /// each one as soon as it is available. Closes run concurrently.
   ///
   /// Calling `close` again (or concurrently) is a no-op that returns
   /// `Ok(())` immediately.
   ///
   /// # Errors
   ///
   /// Returns the first error raised while closing a connection. All
   /// connections are still reclaimed and `size` is reset either way.
   pub async fn close(&self) -> Result<()> {
      {
         let mut state = self.shared.state.lock();
         if state.closed {
            return Ok(());
         }
         state.closed = true;
         debug!(size = state.size, available = state.idle.len(), "Closing connection pool");
      }

      self.shared.idle_permits.close();

      let mut closing = JoinSet::new();
      let mut reclaimed = 0usize;

      loop {
         let mut returned = pin!(self.shared.returned.notified());
         returned.as_mut().enable();

         let outstanding = {
            let mut state = self.shared.state.lock();
            for conn in state.idle.drain(..) {
               closing.spawn(conn.close());
               reclaimed += 1;
            }
            state.size.saturating_sub(reclaimed)
         };

         if outstanding == 0 {
            break;
         }

         trace!(outstanding, "Waiting for checked-out connections");
         returned.await;
      }

      let mut first_error = None;
      while let Some(joined) = closing.join_next().await {
         match joined {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
               warn!(error = %err, "Failed to close pooled connection");
               first_error.get_or_insert(Error::Sqlx(err));
            }
            Err(err) => {
               warn!(error = %err, "Connection close task did not finish");
               first_error.get_or_insert(Error::Io(std::io::Error::other(err)));
            }
         }
      }

      self.shared.state.lock().size = 0;
      debug!(closed = reclaimed, "Connection pool closed");

      first_error.map_or(Ok(()), Err)
   }

   /// Open a connection for a slot already counted in `size`.
   async fn create_connection(&self) -> Result<SqliteConnection> {
      let mut reservation = SlotReservation {
         pool: self,
         armed: true,
      };

      let conn = self
         .shared
         .options
         .connect()
         .await
         .inspect_err(|err| warn!(error = %err, "Failed to open pooled connection"))?;

      reservation.armed = false;
      debug!(size = self.size(), max_size = self.shared.max_size, "Opened pooled connection");

      if self.is_closed() {
         // Closed while connecting: park it where `close()` will find it
         self.release(conn);
         return Err(Error::PoolClosed);
      }

      Ok(conn)
   }

   /// Give back a slot whose connection no longer exists.
   fn forfeit_slot(&self) {
      {
         let mut state = self.shared.state.lock();
         state.size = state.size.saturating_sub(1);
      }

      self.shared.freed.notify_waiters();
      self.shared.returned.notify_waiters();
   }
}

impl fmt::Debug for ConnectionPool {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      let state = self.shared.state.lock();
      f.debug_struct("ConnectionPool")
         .field("max_size", &self.shared.max_size)
         .field("size", &state.size)
         .field("available", &state.idle.len())
         .field("closed", &state.closed)
         .finish()
   }
}

/// Slot counted in `size` before its connection exists.
///
/// Dropped armed (open failed, or the acquiring future was cancelled), it
/// returns the slot to the pool.
struct SlotReservation<'a> {
   pool: &'a ConnectionPool,
   armed: bool,
}

impl Drop for SlotReservation<'_> {
   fn drop(&mut self) {
      if self.armed {
         self.pool.forfeit_slot();
      }
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   fn memory_pool(max_size: usize) -> ConnectionPool {
      let options = SqliteConnectOptions::new().in_memory(true);
      ConnectionPool::new(options, Some(ConnectionPoolConfig { max_size })).unwrap()
   }

   #[test]
   fn test_zero_max_size_rejected() {
      let options = SqliteConnectOptions::new().in_memory(true);
      let err = ConnectionPool::new(options, Some(ConnectionPoolConfig { max_size: 0 })).unwrap_err();
      assert!(matches!(err, Error::InvalidMaxSize));
   }

   #[test]
   fn test_new_pool_is_empty() {
      let pool = memory_pool(3);
      assert_eq!(pool.max_size(), 3);
      assert_eq!(pool.size(), 0);
      assert_eq!(pool.available(), 0);
      assert!(!pool.is_closed());
   }

   #[tokio::test]
   async fn test_acquire_prefers_idle_connection() {
      let pool = memory_pool(2);

      let conn = pool.acquire().await.unwrap();
      pool.release(conn);
      assert_eq!((pool.size(), pool.available()), (1, 1));

      // Reuses the idle connection rather than opening a second one
      let conn = pool.acquire().await.unwrap();
      assert_eq!((pool.size(), pool.available()), (1, 0));

      pool.release(conn);
      pool.close().await.unwrap();
   }

   #[tokio::test]
   async fn test_discard_frees_slot() {
      let pool = memory_pool(1);

      let conn = pool.acquire().await.unwrap();
      pool.discard(conn);
      assert_eq!((pool.size(), pool.available()), (0, 0));

      let conn = pool.acquire().await.unwrap();
      assert_eq!(pool.size(), 1);

      pool.release(conn);
      pool.close().await.unwrap();
   }

   #[tokio::test]
   async fn test_debug_reports_counters() {
      let pool = memory_pool(2);
      let conn = pool.acquire().await.unwrap();

      let rendered = format!("{pool:?}");
      assert!(rendered.contains("max_size: 2"));
      assert!(rendered.contains("size: 1"));

      pool.release(conn);
      pool.close().await.unwrap();
   }
}
