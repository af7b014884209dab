//! Page-granularity shared/exclusive lock table.
//!
//! Deadlock handling is avoidance by randomized timeout, not detection:
//! each acquisition fixes a deadline drawn uniformly from
//! `[0, MAX_LOCK_TIMEOUT)` at entry and polls until it either gets the lock
//! or the deadline passes, at which point the call fails with
//! `TransactionAborted` and the caller must roll back the whole
//! transaction. Randomization makes it likely that of two deadlocked
//! transactions one backs off first.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::warn;

use crate::error::{DbError, Result};
use crate::storage::page::PageId;
use crate::tx::TransactionId;

/// Upper bound of the randomized lock-acquisition deadline.
pub const MAX_LOCK_TIMEOUT: Duration = Duration::from_millis(1000);

/// Pause between lock-acquisition attempts.
const RETRY_INTERVAL: Duration = Duration::from_millis(2);

/// State of one locked page.
#[derive(Debug)]
enum PageLock {
    /// Held by one or more readers.
    Shared(HashSet<TransactionId>),
    /// Held by a single writer.
    Exclusive(TransactionId),
}

/// Lock table mapping pages to their lock state.
///
/// An entry exists iff at least one transaction holds a lock on the page,
/// so a shared and an exclusive lock can never coexist. All transitions
/// happen under a single mutex; the critical sections are a few map
/// operations and never include I/O.
pub struct LockTable {
    locks: Mutex<HashMap<PageId, PageLock>>,
}

impl LockTable {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquires a shared lock on `pid` for `tid`.
    ///
    /// Joins an existing reader set, or no-ops when `tid` already holds the
    /// exclusive lock (a stronger lock subsumes the request).
    ///
    /// # Errors
    ///
    /// Returns `DbError::TransactionAborted` when the randomized deadline
    /// passes before the lock is granted.
    pub async fn acquire_shared(&self, tid: TransactionId, pid: PageId) -> Result<()> {
        let deadline = Instant::now() + MAX_LOCK_TIMEOUT.mul_f64(rand::random::<f64>());
        loop {
            if self.try_shared(tid, pid) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                warn!(%tid, ?pid, "shared lock acquisition timed out");
                return Err(DbError::TransactionAborted);
            }
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
    }

    /// Acquires an exclusive lock on `pid` for `tid`.
    ///
    /// Upgrades in place when `tid` is the sole reader; no-ops when `tid`
    /// already owns the exclusive lock.
    ///
    /// # Errors
    ///
    /// Returns `DbError::TransactionAborted` when the randomized deadline
    /// passes before the lock is granted.
    pub async fn acquire_exclusive(&self, tid: TransactionId, pid: PageId) -> Result<()> {
        let deadline = Instant::now() + MAX_LOCK_TIMEOUT.mul_f64(rand::random::<f64>());
        loop {
            if self.try_exclusive(tid, pid) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                warn!(%tid, ?pid, "exclusive lock acquisition timed out");
                return Err(DbError::TransactionAborted);
            }
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
    }

    fn try_shared(&self, tid: TransactionId, pid: PageId) -> bool {
        let mut locks = self.locks.lock();
        match locks.get_mut(&pid) {
            None => {
                locks.insert(pid, PageLock::Shared(HashSet::from([tid])));
                true
            }
            Some(PageLock::Shared(readers)) => {
                readers.insert(tid);
                true
            }
            Some(PageLock::Exclusive(owner)) => *owner == tid,
        }
    }

    fn try_exclusive(&self, tid: TransactionId, pid: PageId) -> bool {
        let mut locks = self.locks.lock();
        match locks.get_mut(&pid) {
            None => {
                locks.insert(pid, PageLock::Exclusive(tid));
                true
            }
            Some(PageLock::Shared(readers)) => {
                if readers.len() == 1 && readers.contains(&tid) {
                    locks.insert(pid, PageLock::Exclusive(tid));
                    true
                } else {
                    false
                }
            }
            Some(PageLock::Exclusive(owner)) => *owner == tid,
        }
    }

    /// Releases `tid`'s lock on `pid`, dropping the entry when it becomes
    /// empty. A no-op if `tid` holds no lock on the page.
    pub fn release(&self, tid: TransactionId, pid: PageId) {
        let mut locks = self.locks.lock();
        match locks.get_mut(&pid) {
            Some(PageLock::Shared(readers)) => {
                readers.remove(&tid);
                if readers.is_empty() {
                    locks.remove(&pid);
                }
            }
            Some(PageLock::Exclusive(owner)) if *owner == tid => {
                locks.remove(&pid);
            }
            _ => {}
        }
    }

    /// Returns whether `tid` holds any lock on `pid`.
    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        match self.locks.lock().get(&pid) {
            None => false,
            Some(PageLock::Shared(readers)) => readers.contains(&tid),
            Some(PageLock::Exclusive(owner)) => *owner == tid,
        }
    }

    /// Returns every page `tid` holds a lock on, paired with whether `tid`
    /// is the sole holder (exclusive owner or only reader).
    pub fn held_by(&self, tid: TransactionId) -> Vec<(PageId, bool)> {
        self.locks
            .lock()
            .iter()
            .filter_map(|(pid, lock)| match lock {
                PageLock::Shared(readers) if readers.contains(&tid) => {
                    Some((*pid, readers.len() == 1))
                }
                PageLock::Exclusive(owner) if *owner == tid => Some((*pid, true)),
                _ => None,
            })
            .collect()
    }

    /// Releases every lock held by `tid`.
    pub fn release_all(&self, tid: TransactionId) {
        self.locks.lock().retain(|_, lock| match lock {
            PageLock::Shared(readers) => {
                readers.remove(&tid);
                !readers.is_empty()
            }
            PageLock::Exclusive(owner) => *owner != tid,
        });
    }

    /// Returns the number of pages with at least one lock held.
    pub fn locked_pages(&self) -> usize {
        self.locks.lock().len()
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}
