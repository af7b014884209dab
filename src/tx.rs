//! Transaction identity and page-access permissions.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of transaction ids. Process-wide so that ids stay unique across
/// independent [`Database`](crate::db::Database) instances in one test run.
static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(0);

/// A globally unique, monotonically assigned transaction identity.
///
/// A transaction holds every lock it acquires until
/// [`complete_transaction`](crate::storage::BufferPool::complete_transaction)
/// (strict two-phase locking).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Allocates the next transaction id.
    pub fn new() -> Self {
        Self(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id value.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx{}", self.0)
    }
}

/// Requested access mode for a page fetch.
///
/// `ReadOnly` acquires a shared lock, `ReadWrite` an exclusive lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Perm {
    ReadOnly,
    ReadWrite,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let a = TransactionId::new();
        let b = TransactionId::new();
        let c = TransactionId::new();
        assert!(a < b && b < c);
        assert_ne!(a, b);
    }
}
