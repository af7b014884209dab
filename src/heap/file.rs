//! Heap file: durable page storage for one table.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{DbError, Result};
use crate::storage::buffer::{BufferPool, PageRef};
use crate::storage::error::StorageError;
use crate::storage::page::{PageId, TableId};
use crate::tuple::{Tuple, TupleDesc};
use crate::tx::{Perm, TransactionId};

use super::page::{HeapPage, slots_per_page};
use super::scan::HeapScan;

/// A file of fixed-size heap pages backing one table.
///
/// Pages are laid out contiguously with no file header, so
/// `page_count = file_length / page_size`. Raw page reads and writes go
/// directly to the file; tuple-level operations go through the buffer pool
/// so that locking, caching, and dirty tracking stay coherent.
///
/// # Concurrency
///
/// The file handle sits behind a `tokio::sync::Mutex` that serializes I/O;
/// the page count is kept in an `AtomicU64` so it can be read without
/// touching the file.
pub struct HeapFile {
    path: PathBuf,
    id: TableId,
    desc: TupleDesc,
    page_size: usize,
    file: Mutex<File>,
    page_count: AtomicU64,
}

impl HeapFile {
    /// Opens or creates the heap file at `path`.
    ///
    /// The table id is derived from the canonical path, so reopening the
    /// same file yields the same id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Corrupted` if the existing file length is not
    /// a multiple of `page_size`.
    /// # Panics
    ///
    /// Panics if `page_size` cannot hold a single tuple of `desc`.
    pub async fn open(
        path: impl Into<PathBuf>,
        desc: TupleDesc,
        page_size: usize,
    ) -> Result<Self> {
        assert!(
            slots_per_page(&desc, page_size) > 0,
            "page size {} cannot hold a tuple of schema {}",
            page_size,
            desc
        );
        let path = path.into();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await
            .map_err(StorageError::Io)?;

        let canonical = tokio::fs::canonicalize(&path)
            .await
            .map_err(StorageError::Io)?;
        let id = TableId::from_path(&canonical);

        let file_len = file.metadata().await.map_err(StorageError::Io)?.len();
        if file_len % page_size as u64 != 0 {
            return Err(StorageError::Corrupted(format!(
                "file length {} is not a multiple of page size {}",
                file_len, page_size
            ))
            .into());
        }

        Ok(Self {
            path,
            id,
            desc,
            page_size,
            file: Mutex::new(file),
            page_count: AtomicU64::new(file_len / page_size as u64),
        })
    }

    /// Returns the table id of this file.
    pub fn id(&self) -> TableId {
        self.id
    }

    /// Returns the tuple schema of this table.
    pub fn desc(&self) -> &TupleDesc {
        &self.desc
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the page size of this file in bytes.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the number of pages currently in the file.
    pub fn page_count(&self) -> u64 {
        self.page_count.load(Ordering::Acquire)
    }

    /// Reads and decodes the page at `pid` directly from disk.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::PageOutOfRange` if `pid` lies past the end of
    /// the file.
    pub async fn read_page(&self, pid: PageId) -> Result<HeapPage> {
        debug_assert_eq!(pid.table(), self.id);

        let page_count = self.page_count();
        if pid.page_no() >= page_count {
            return Err(StorageError::PageOutOfRange {
                page_no: pid.page_no(),
                page_count,
            }
            .into());
        }

        let mut data = vec![0u8; self.page_size];
        {
            let mut file = self.file.lock().await;
            file.seek(std::io::SeekFrom::Start(pid.byte_offset(self.page_size)))
                .await
                .map_err(StorageError::Io)?;
            file.read_exact(&mut data).await.map_err(StorageError::Io)?;
        }

        Ok(HeapPage::from_bytes(
            pid,
            self.desc.clone(),
            self.page_size,
            &data,
        )?)
    }

    /// Writes the canonical image of `page` at its offset.
    pub async fn write_page(&self, page: &HeapPage) -> Result<()> {
        self.write_raw(page.pid().page_no(), &page.page_data()).await
    }

    /// Writes a raw page image at `page_no * page_size`.
    ///
    /// The image must be exactly `page_size` bytes.
    pub async fn write_raw(&self, page_no: u64, data: &[u8]) -> Result<()> {
        debug_assert_eq!(data.len(), self.page_size);

        let mut file = self.file.lock().await;
        file.seek(std::io::SeekFrom::Start(page_no * self.page_size as u64))
            .await
            .map_err(StorageError::Io)?;
        file.write_all(data).await.map_err(StorageError::Io)?;
        Ok(())
    }

    /// Appends one zeroed page to the file and returns its page number.
    pub async fn append_empty_page(&self) -> Result<u64> {
        let mut file = self.file.lock().await;
        let page_no = self.page_count.load(Ordering::Acquire);
        file.seek(std::io::SeekFrom::Start(page_no * self.page_size as u64))
            .await
            .map_err(StorageError::Io)?;
        file.write_all(&vec![0u8; self.page_size])
            .await
            .map_err(StorageError::Io)?;
        self.page_count.store(page_no + 1, Ordering::Release);

        debug!(table = self.id.value(), page_no, "heap file grew by one page");
        Ok(page_no)
    }

    /// Inserts a tuple on behalf of `tid`, fetching candidate pages through
    /// the buffer pool in read-write mode.
    ///
    /// The first existing page with a free slot takes the tuple; if none
    /// has room, a fresh page is appended to the file and inserted into.
    /// Returns the pages dirtied by the operation; the caller (the buffer
    /// pool) is responsible for marking them dirty and keeping them cached.
    pub async fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: Tuple,
    ) -> Result<Vec<PageRef>> {
        for page_no in 0..self.page_count() {
            let pid = PageId::new(self.id, page_no);
            let page = pool.get_page(tid, pid, Perm::ReadWrite).await?;
            let inserted = {
                let mut guard = page.write();
                if guard.free_slot_count() > 0 {
                    guard.insert_tuple(tuple.clone())?;
                    true
                } else {
                    false
                }
            };
            if inserted {
                return Ok(vec![page]);
            }
        }

        let page_no = self.append_empty_page().await?;
        let page = pool
            .get_page(tid, PageId::new(self.id, page_no), Perm::ReadWrite)
            .await?;
        page.write().insert_tuple(tuple)?;
        Ok(vec![page])
    }

    /// Deletes the tuple at `tuple.record_id()` on behalf of `tid`.
    ///
    /// Returns the dirtied page; the caller marks it.
    pub async fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageRef>> {
        let rid = tuple.record_id().ok_or(DbError::NoSuchTuple)?;
        debug_assert_eq!(rid.page_id.table(), self.id);

        let page = pool.get_page(tid, rid.page_id, Perm::ReadWrite).await?;
        page.write().delete_tuple(tuple)?;
        Ok(vec![page])
    }

    /// Returns a restartable scan cursor over all tuples of this table.
    ///
    /// Pages are fetched one at a time through the buffer pool in read-only
    /// mode; the shared locks stay with `tid` until the transaction
    /// completes.
    pub fn scan<'a>(self: &Arc<Self>, pool: &'a BufferPool, tid: TransactionId) -> HeapScan<'a> {
        HeapScan::new(Arc::clone(self), pool, tid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::{Field, Type};
    use tempfile::tempdir;

    fn int_desc() -> TupleDesc {
        TupleDesc::new(vec![Type::Int])
    }

    async fn open_file(dir: &tempfile::TempDir, page_size: usize) -> HeapFile {
        HeapFile::open(dir.path().join("t.dat"), int_desc(), page_size)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_new_file_is_empty() {
        let dir = tempdir().unwrap();
        let file = open_file(&dir, 64).await;
        assert_eq!(file.page_count(), 0);
        assert!(file.path().exists());
    }

    #[tokio::test]
    async fn test_id_is_stable_across_opens() {
        let dir = tempdir().unwrap();
        let first = open_file(&dir, 64).await.id();
        let second = open_file(&dir, 64).await.id();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_read_page_out_of_range() {
        let dir = tempdir().unwrap();
        let file = open_file(&dir, 64).await;
        let result = file.read_page(PageId::new(file.id(), 0)).await;
        assert!(matches!(
            result,
            Err(DbError::Storage(StorageError::PageOutOfRange { .. }))
        ));
    }

    #[tokio::test]
    async fn test_append_and_roundtrip() {
        let dir = tempdir().unwrap();
        let file = open_file(&dir, 64).await;

        let page_no = file.append_empty_page().await.unwrap();
        assert_eq!(page_no, 0);
        assert_eq!(file.page_count(), 1);

        let pid = PageId::new(file.id(), 0);
        let mut page = file.read_page(pid).await.unwrap();
        page.insert_tuple(Tuple::new(int_desc(), vec![Field::Int(42)]).unwrap())
            .unwrap();
        file.write_page(&page).await.unwrap();

        let reread = file.read_page(pid).await.unwrap();
        assert_eq!(reread.page_data(), page.page_data());
        assert_eq!(reread.iter().count(), 1);
    }

    #[tokio::test]
    async fn test_page_count_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let file = open_file(&dir, 64).await;
            file.append_empty_page().await.unwrap();
            file.append_empty_page().await.unwrap();
        }
        let file = open_file(&dir, 64).await;
        assert_eq!(file.page_count(), 2);
    }

    #[tokio::test]
    async fn test_open_rejects_ragged_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.dat");
        tokio::fs::write(&path, vec![0u8; 100]).await.unwrap();
        let result = HeapFile::open(&path, int_desc(), 64).await;
        assert!(matches!(
            result,
            Err(DbError::Storage(StorageError::Corrupted(_)))
        ));
    }
}
