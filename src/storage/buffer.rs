//! Buffer management: the page lock table and the bounded page cache.
//!
//! The buffer pool is the single gateway between operators and heap files.
//! Every page access names a transaction and a permission; the pool
//! acquires the matching page lock before consulting its cache, and keeps
//! all locks until the transaction completes (strict two-phase locking).
//!
//! Eviction is NO STEAL (a dirty page is never evicted) and commits are
//! FORCE (a committing transaction's dirty pages are written before its
//! locks are released). Together these make a redo log unnecessary: the disk
//! never holds uncommitted bytes, and committed bytes are on disk before
//! anyone else can observe the commit.

pub mod locks;
pub mod pool;

pub use locks::{LockTable, MAX_LOCK_TIMEOUT};
pub use pool::{BufferPool, BufferPoolConfig, PageRef};
