//! Shorthand constructors for [`Transaction`]

use sqlx::sqlite::SqliteConnection;
use sqlx_sqlite_conn_pool::ConnectionPool;

use crate::kind::TransactionKind;
use crate::transaction::Transaction;

/// Start transactions straight from a [`ConnectionPool`].
pub trait PoolTransactionExt {
   /// Transaction with SQLite's default BEGIN mode
   fn transaction(&self) -> Transaction<'static>;

   fn deferred(&self) -> Transaction<'static> {
      self.transaction().kind(TransactionKind::Deferred)
   }

   fn immediate(&self) -> Transaction<'static> {
      self.transaction().kind(TransactionKind::Immediate)
   }

   fn exclusive(&self) -> Transaction<'static> {
      self.transaction().kind(TransactionKind::Exclusive)
   }
}

impl PoolTransactionExt for ConnectionPool {
   fn transaction(&self) -> Transaction<'static> {
      Transaction::new(self)
   }
}

/// Start transactions on a connection the caller already holds.
///
/// Plain `BEGIN` is covered by [`Transaction::on`]; these pick the mode.
pub trait ConnectionTransactionExt {
   fn deferred(&mut self) -> Transaction<'_>;
   fn immediate(&mut self) -> Transaction<'_>;
   fn exclusive(&mut self) -> Transaction<'_>;
}

impl ConnectionTransactionExt for SqliteConnection {
   fn deferred(&mut self) -> Transaction<'_> {
      Transaction::on(self).kind(TransactionKind::Deferred)
   }

   fn immediate(&mut self) -> Transaction<'_> {
      Transaction::on(self).kind(TransactionKind::Immediate)
   }

   fn exclusive(&mut self) -> Transaction<'_> {
      Transaction::on(self).kind(TransactionKind::Exclusive)
   }
}
