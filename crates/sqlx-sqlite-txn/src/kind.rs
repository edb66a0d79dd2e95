//! BEGIN modes

use serde::Deserialize;

/// How eagerly `BEGIN` takes the database lock.
///
/// A transaction without a kind issues a plain `BEGIN TRANSACTION`, which
/// SQLite treats as deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
   /// Take locks on first read or write
   Deferred,
   /// Take the write lock at BEGIN
   Immediate,
   /// Take the write lock at BEGIN; outside WAL mode also blocks readers
   Exclusive,
}

impl TransactionKind {
   pub fn as_str(&self) -> &'static str {
      match self {
         TransactionKind::Deferred => "DEFERRED",
         TransactionKind::Immediate => "IMMEDIATE",
         TransactionKind::Exclusive => "EXCLUSIVE",
      }
   }

   pub(crate) fn begin_statement(kind: Option<Self>) -> &'static str {
      match kind {
         None => "BEGIN TRANSACTION",
         Some(TransactionKind::Deferred) => "BEGIN DEFERRED TRANSACTION",
         Some(TransactionKind::Immediate) => "BEGIN IMMEDIATE TRANSACTION",
         Some(TransactionKind::Exclusive) => "BEGIN EXCLUSIVE TRANSACTION",
      }
   }
}
