//! Restartable transactional scan over a heap file.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::{DbError, Result};
use crate::exec::DbIterator;
use crate::storage::buffer::BufferPool;
use crate::storage::page::PageId;
use crate::tuple::{Tuple, TupleDesc};
use crate::tx::{Perm, TransactionId};

use super::file::HeapFile;

/// Cursor over every tuple of a heap file, in page order.
///
/// Pages are fetched one at a time through the buffer pool in read-only
/// mode and their occupied tuples buffered, so the cursor never holds a
/// page latch between steps. The shared page locks it acquires belong to
/// the scanning transaction and persist until the transaction completes;
/// [`close`](DbIterator::close) only releases cursor state.
pub struct HeapScan<'a> {
    file: Arc<HeapFile>,
    pool: &'a BufferPool,
    tid: TransactionId,
    opened: bool,
    next_page: u64,
    buffered: VecDeque<Tuple>,
}

impl<'a> HeapScan<'a> {
    pub(crate) fn new(file: Arc<HeapFile>, pool: &'a BufferPool, tid: TransactionId) -> Self {
        Self {
            file,
            pool,
            tid,
            opened: false,
            next_page: 0,
            buffered: VecDeque::new(),
        }
    }

    /// Pulls pages until a tuple is buffered or the file is exhausted.
    async fn fill(&mut self) -> Result<()> {
        while self.buffered.is_empty() && self.next_page < self.file.page_count() {
            let pid = PageId::new(self.file.id(), self.next_page);
            self.next_page += 1;
            let page = self.pool.get_page(self.tid, pid, Perm::ReadOnly).await?;
            let guard = page.read();
            self.buffered.extend(guard.iter().cloned());
        }
        Ok(())
    }
}

impl DbIterator for HeapScan<'_> {
    fn tuple_desc(&self) -> &TupleDesc {
        self.file.desc()
    }

    async fn open(&mut self) -> Result<()> {
        self.opened = true;
        self.next_page = 0;
        self.buffered.clear();
        Ok(())
    }

    async fn has_next(&mut self) -> Result<bool> {
        if !self.opened {
            return Ok(false);
        }
        self.fill().await?;
        Ok(!self.buffered.is_empty())
    }

    async fn next(&mut self) -> Result<Tuple> {
        if !self.has_next().await? {
            return Err(DbError::NoSuchTuple);
        }
        self.buffered.pop_front().ok_or(DbError::NoSuchTuple)
    }

    async fn rewind(&mut self) -> Result<()> {
        self.next_page = 0;
        self.buffered.clear();
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
        self.next_page = 0;
        self.buffered.clear();
    }
}
