//! Crate-wide error type.
//!
//! Every failure the core can surface to an operator is one of the variants
//! below. `TransactionAborted` is special: it is recoverable only by rolling
//! back the whole transaction, and the caller must still invoke
//! [`complete_transaction`](crate::storage::BufferPool::complete_transaction)
//! with `commit = false` to release locks and drop dirty pages.

use std::fmt;

use crate::storage::error::StorageError;
use crate::storage::page::TableId;

/// Errors surfaced by the storage and transaction core.
#[derive(Debug)]
pub enum DbError {
    /// Lock acquisition timed out; the transaction must be rolled back.
    TransactionAborted,
    /// A heap page has no free slot for the tuple being inserted.
    CapacityFull,
    /// The buffer pool is at capacity and every cached page is dirty, so no
    /// clean eviction victim exists (NO STEAL forbids evicting dirty pages).
    OutOfBufferSpace,
    /// The requested aggregate is not defined for the field type.
    UnsupportedAggregate(String),
    /// A tuple's schema disagrees with the schema expected by the operation.
    TupleDescMismatch(String),
    /// The named tuple does not exist (or the cursor is exhausted).
    NoSuchTuple,
    /// No heap file is registered under this table id.
    NoSuchTable(TableId),
    /// The underlying storage failed.
    Storage(StorageError),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::TransactionAborted => {
                write!(f, "transaction aborted: lock acquisition timed out")
            }
            DbError::CapacityFull => write!(f, "page has no free slot"),
            DbError::OutOfBufferSpace => {
                write!(f, "out of buffer space: too many dirty pages")
            }
            DbError::UnsupportedAggregate(msg) => {
                write!(f, "unsupported aggregate: {}", msg)
            }
            DbError::TupleDescMismatch(msg) => {
                write!(f, "tuple descriptor mismatch: {}", msg)
            }
            DbError::NoSuchTuple => write!(f, "no such tuple"),
            DbError::NoSuchTable(id) => write!(f, "no such table: {:?}", id),
            DbError::Storage(e) => write!(f, "storage error: {}", e),
        }
    }
}

impl std::error::Error for DbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DbError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for DbError {
    fn from(e: StorageError) -> Self {
        DbError::Storage(e)
    }
}

impl From<std::io::Error> for DbError {
    fn from(e: std::io::Error) -> Self {
        DbError::Storage(StorageError::Io(e))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DbError>;
