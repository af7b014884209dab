//! Bounded page cache with two-phase locking and NO STEAL / FORCE
//! transaction semantics.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::catalog::Catalog;
use crate::error::{DbError, Result};
use crate::heap::page::HeapPage;
use crate::storage::page::{PageId, TableId};
use crate::tuple::Tuple;
use crate::tx::{Perm, TransactionId};

use super::locks::LockTable;

/// Shared handle to a cached page.
///
/// All transactions reading a page observe the same in-memory object; the
/// `RwLock` is a short-lived latch for memory safety, while real isolation
/// comes from the page lock table.
pub type PageRef = Arc<RwLock<HeapPage>>;

/// Buffer pool configuration.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Maximum number of pages held in the cache.
    pub capacity: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self { capacity: 50 }
    }
}

/// The buffer pool: a bounded page cache layered above the heap files.
///
/// All page traffic flows through [`get_page`](Self::get_page), which
/// acquires the page lock matching the requested permission before touching
/// the cache. Locks are strict two-phase: nothing is released until
/// [`complete_transaction`](Self::complete_transaction).
///
/// # Latch discipline
///
/// The cache map and the lock table each sit behind their own mutex, and
/// neither is ever held across disk I/O or across an `.await`. Page reads
/// on a cache miss happen with only the page lock held; eviction is pure
/// in-memory work because only clean pages are ever victims.
///
/// # Failure semantics
///
/// - `TransactionAborted`: a lock acquisition timed out. The transaction
///   must be rolled back via `complete_transaction(tid, false)`.
/// - `OutOfBufferSpace`: the cache is full of dirty pages and nothing can
///   be evicted. Committing or aborting the dirtying transactions clears
///   the condition.
pub struct BufferPool {
    catalog: Arc<Catalog>,
    capacity: usize,
    cache: Mutex<HashMap<PageId, PageRef>>,
    locks: LockTable,
}

impl BufferPool {
    /// Creates a buffer pool that caches up to `config.capacity` pages and
    /// resolves table ids through `catalog`.
    ///
    /// # Panics
    ///
    /// Panics if the capacity is zero.
    pub fn new(catalog: Arc<Catalog>, config: BufferPoolConfig) -> Self {
        assert!(config.capacity > 0, "buffer pool capacity must be > 0");
        Self {
            catalog,
            capacity: config.capacity,
            cache: Mutex::new(HashMap::with_capacity(config.capacity)),
            locks: LockTable::new(),
        }
    }

    /// Returns the catalog this pool resolves heap files through.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Returns the configured cache capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of pages currently cached.
    pub fn cached_pages(&self) -> usize {
        self.cache.lock().len()
    }

    /// Fetches a page on behalf of `tid` with the given permission.
    ///
    /// Acquires a shared (`ReadOnly`) or exclusive (`ReadWrite`) lock
    /// first, then serves the page from the cache, reading it from its heap
    /// file on a miss and evicting a clean page if the cache is full.
    ///
    /// # Errors
    ///
    /// - `DbError::TransactionAborted` if the lock wait times out.
    /// - `DbError::OutOfBufferSpace` if no clean eviction victim exists.
    /// - `DbError::Storage` if the page cannot be read.
    pub async fn get_page(&self, tid: TransactionId, pid: PageId, perm: Perm) -> Result<PageRef> {
        match perm {
            Perm::ReadOnly => self.locks.acquire_shared(tid, pid).await?,
            Perm::ReadWrite => self.locks.acquire_exclusive(tid, pid).await?,
        }

        if let Some(page) = self.cache.lock().get(&pid) {
            return Ok(page.clone());
        }

        debug!(%tid, ?pid, "cache miss, reading page");
        let file = self.catalog.file(pid.table())?;
        let page = file.read_page(pid).await?;
        self.admit(page)
    }

    /// Releases `tid`'s lock on `pid` without completing the transaction.
    ///
    /// This breaks two-phase locking and can expose uncommitted state to
    /// other transactions; it exists for specialized call sites that know a
    /// page can never be revisited. Correctness of commit/abort never
    /// depends on it.
    pub fn release_page(&self, tid: TransactionId, pid: PageId) {
        self.locks.release(tid, pid);
    }

    /// Returns whether `tid` holds a lock on `pid`.
    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.locks.holds_lock(tid, pid)
    }

    /// Inserts a tuple into `table` on behalf of `tid`.
    ///
    /// Delegates slot placement to the heap file, then marks every dirtied
    /// page and makes sure the cache holds the current version of each.
    pub async fn insert_tuple(
        &self,
        tid: TransactionId,
        table: TableId,
        tuple: Tuple,
    ) -> Result<()> {
        let file = self.catalog.file(table)?;
        let dirtied = file.insert_tuple(self, tid, tuple).await?;
        self.mark_and_cache(tid, dirtied)
    }

    /// Deletes the tuple at `tuple.record_id()` on behalf of `tid`.
    pub async fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<()> {
        let rid = tuple.record_id().ok_or(DbError::NoSuchTuple)?;
        let file = self.catalog.file(rid.page_id.table())?;
        let dirtied = file.delete_tuple(self, tid, tuple).await?;
        self.mark_and_cache(tid, dirtied)
    }

    /// Commits `tid`: flush its pages, then release its locks.
    pub async fn commit(&self, tid: TransactionId) -> Result<()> {
        self.complete_transaction(tid, true).await
    }

    /// Aborts `tid`: discard its pages, then release its locks.
    pub async fn abort(&self, tid: TransactionId) -> Result<()> {
        self.complete_transaction(tid, false).await
    }

    /// Completes a transaction.
    ///
    /// On commit, every page solely held by `tid` (exclusively locked, or
    /// shared with no other reader) is flushed; flushing clears the dirty
    /// marker and resets the before-image (FORCE). On abort, those pages
    /// are discarded from the cache instead: NO STEAL guarantees the disk
    /// copy predates the transaction, so dropping the in-memory version is
    /// a complete rollback. All locks are released afterwards.
    pub async fn complete_transaction(&self, tid: TransactionId, commit: bool) -> Result<()> {
        let held = self.locks.held_by(tid);
        for (pid, solely) in &held {
            if !solely {
                continue;
            }
            if commit {
                let page = self.cache.lock().get(pid).cloned();
                if let Some(page) = page {
                    self.flush_page_ref(*pid, &page).await?;
                }
            } else {
                self.discard_page(*pid);
            }
        }
        self.locks.release_all(tid);
        debug!(%tid, commit, pages = held.len(), "transaction complete");
        Ok(())
    }

    /// Writes every cached dirty page to disk. Intended for shutdown and
    /// tests; under NO STEAL the pool never needs this during normal
    /// operation.
    pub async fn flush_all_pages(&self) -> Result<()> {
        let pages: Vec<(PageId, PageRef)> = self
            .cache
            .lock()
            .iter()
            .map(|(pid, page)| (*pid, page.clone()))
            .collect();
        for (pid, page) in pages {
            self.flush_page_ref(pid, &page).await?;
        }
        Ok(())
    }

    /// Writes the page at `pid` if it is cached and dirty.
    pub async fn flush_page(&self, pid: PageId) -> Result<()> {
        let page = self.cache.lock().get(&pid).cloned();
        match page {
            Some(page) => self.flush_page_ref(pid, &page).await,
            None => Ok(()),
        }
    }

    /// Drops the page at `pid` from the cache without writing it. Locks are
    /// untouched.
    pub fn discard_page(&self, pid: PageId) {
        self.cache.lock().remove(&pid);
    }

    /// Writes `page` if dirty, then marks it clean and resets its
    /// before-image to the bytes just written.
    async fn flush_page_ref(&self, pid: PageId, page: &PageRef) -> Result<()> {
        let data = {
            let guard = page.read();
            if guard.dirtier().is_none() {
                return Ok(());
            }
            guard.page_data()
        };

        let file = self.catalog.file(pid.table())?;
        file.write_raw(pid.page_no(), &data).await?;

        let mut guard = page.write();
        guard.set_before_image();
        guard.mark_clean();
        debug!(?pid, "flushed dirty page");
        Ok(())
    }

    /// Marks the given pages dirty by `tid` and installs each in the cache,
    /// replacing any stale cached version.
    fn mark_and_cache(&self, tid: TransactionId, pages: Vec<PageRef>) -> Result<()> {
        for page in pages {
            let pid = {
                let mut guard = page.write();
                guard.mark_dirty(tid);
                guard.pid()
            };
            let mut cache = self.cache.lock();
            if !cache.contains_key(&pid) && cache.len() >= self.capacity {
                Self::evict_locked(&mut cache)?;
            }
            cache.insert(pid, page.clone());
        }
        Ok(())
    }

    /// Installs a freshly read page, resolving races with concurrent
    /// readers of the same page in favor of the copy already cached.
    fn admit(&self, page: HeapPage) -> Result<PageRef> {
        let pid = page.pid();
        let mut cache = self.cache.lock();
        if let Some(existing) = cache.get(&pid) {
            // Another transaction loaded this page while we were reading.
            return Ok(existing.clone());
        }
        if cache.len() >= self.capacity {
            Self::evict_locked(&mut cache)?;
        }
        let page = Arc::new(RwLock::new(page));
        cache.insert(pid, page.clone());
        Ok(page)
    }

    /// Evicts the first clean page found. Dirty pages are never victims
    /// (NO STEAL), so eviction performs no I/O.
    fn evict_locked(cache: &mut HashMap<PageId, PageRef>) -> Result<()> {
        let victim = cache.iter().find_map(|(pid, page)| {
            page.try_read()
                .filter(|guard| guard.dirtier().is_none())
                .map(|_| *pid)
        });
        match victim {
            Some(pid) => {
                cache.remove(&pid);
                debug!(?pid, "evicted clean page");
                Ok(())
            }
            None => Err(DbError::OutOfBufferSpace),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::{Field, Type};
    use crate::db::{Database, DbConfig};
    use crate::tuple::TupleDesc;
    use tempfile::TempDir;

    async fn small_db(capacity: usize) -> (TempDir, Database, TableId) {
        let dir = TempDir::new().unwrap();
        let db = Database::with_config(DbConfig {
            page_size: 64,
            buffer_capacity: capacity,
        });
        let table = db
            .open_table(
                dir.path().join("t.dat"),
                TupleDesc::new(vec![Type::Int]),
                "t",
            )
            .await
            .unwrap();
        (dir, db, table)
    }

    fn int_tuple(v: i32) -> Tuple {
        Tuple::new(TupleDesc::new(vec![Type::Int]), vec![Field::Int(v)]).unwrap()
    }

    #[tokio::test]
    async fn test_get_page_returns_shared_handle() {
        let (_dir, db, table) = small_db(4).await;
        let pool = db.pool();

        let tid = TransactionId::new();
        pool.insert_tuple(tid, table, int_tuple(1)).await.unwrap();
        pool.commit(tid).await.unwrap();

        let tid = TransactionId::new();
        let pid = PageId::new(table, 0);
        let first = pool.get_page(tid, pid, Perm::ReadOnly).await.unwrap();
        let second = pool.get_page(tid, pid, Perm::ReadOnly).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(pool.cached_pages(), 1);
        pool.commit(tid).await.unwrap();
    }

    #[tokio::test]
    async fn test_cache_never_exceeds_capacity() {
        let (_dir, db, table) = small_db(2).await;
        let pool = db.pool();

        // Three pages' worth of tuples, committing per batch so pages come
        // clean and evictable.
        for batch in 0..4 {
            let tid = TransactionId::new();
            for i in 0..15 {
                pool.insert_tuple(tid, table, int_tuple(batch * 15 + i))
                    .await
                    .unwrap();
                assert!(pool.cached_pages() <= 2);
            }
            pool.commit(tid).await.unwrap();
        }

        let file = db.catalog().file(table).unwrap();
        assert_eq!(file.page_count(), 4);
        assert!(pool.cached_pages() <= 2);
    }

    #[tokio::test]
    async fn test_all_dirty_pages_is_out_of_buffer_space() {
        let (_dir, db, table) = small_db(1).await;
        let pool = db.pool();

        let tid = TransactionId::new();
        // Fill page 0 (15 slots). The 16th insert appends page 1, and the
        // only cached page is dirty, so nothing can be evicted.
        for i in 0..15 {
            pool.insert_tuple(tid, table, int_tuple(i)).await.unwrap();
        }
        let result = pool.insert_tuple(tid, table, int_tuple(99)).await;
        assert!(matches!(result, Err(DbError::OutOfBufferSpace)));
        pool.abort(tid).await.unwrap();
    }

    #[tokio::test]
    async fn test_flush_all_pages_writes_and_cleans() {
        let (_dir, db, table) = small_db(4).await;
        let pool = db.pool();

        let tid = TransactionId::new();
        pool.insert_tuple(tid, table, int_tuple(7)).await.unwrap();

        let pid = PageId::new(table, 0);
        {
            let cache = pool.cache.lock();
            assert_eq!(cache[&pid].read().dirtier(), Some(tid));
        }

        pool.flush_all_pages().await.unwrap();
        {
            let cache = pool.cache.lock();
            assert_eq!(cache[&pid].read().dirtier(), None);
        }

        // The tuple reached disk.
        let file = db.catalog().file(table).unwrap();
        let on_disk = file.read_page(pid).await.unwrap();
        assert_eq!(on_disk.iter().count(), 1);
        pool.commit(tid).await.unwrap();
    }

    #[tokio::test]
    async fn test_discard_page_drops_uncommitted_state() {
        let (_dir, db, table) = small_db(4).await;
        let pool = db.pool();

        let tid = TransactionId::new();
        pool.insert_tuple(tid, table, int_tuple(5)).await.unwrap();

        let pid = PageId::new(table, 0);
        pool.discard_page(pid);
        assert_eq!(pool.cached_pages(), 0);

        // A re-read sees the on-disk (empty) page; the lock is still held.
        let page = pool.get_page(tid, pid, Perm::ReadWrite).await.unwrap();
        assert_eq!(page.read().iter().count(), 0);
        pool.abort(tid).await.unwrap();
    }

    #[tokio::test]
    async fn test_release_page_escape_hatch() {
        let (_dir, db, table) = small_db(4).await;
        let pool = db.pool();

        let tid = TransactionId::new();
        pool.insert_tuple(tid, table, int_tuple(1)).await.unwrap();
        pool.commit(tid).await.unwrap();

        let pid = PageId::new(table, 0);
        let a = TransactionId::new();
        pool.get_page(a, pid, Perm::ReadWrite).await.unwrap();
        assert!(pool.holds_lock(a, pid));

        pool.release_page(a, pid);
        assert!(!pool.holds_lock(a, pid));

        // Another transaction can now take the exclusive lock immediately.
        let b = TransactionId::new();
        pool.get_page(b, pid, Perm::ReadWrite).await.unwrap();
        pool.commit(b).await.unwrap();
        pool.commit(a).await.unwrap();
    }
}
