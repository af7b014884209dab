//! Insert and delete operators.
//!
//! Both drain their child through the buffer pool and emit exactly one
//! output tuple, a single `Int` holding the number of affected rows, then
//! report end of stream. Rewinding arms them for another round.

use crate::datum::{Field, Type};
use crate::error::{DbError, Result};
use crate::storage::buffer::BufferPool;
use crate::storage::page::TableId;
use crate::tuple::{Tuple, TupleDesc};
use crate::tx::TransactionId;

use super::DbIterator;

fn count_desc() -> TupleDesc {
    TupleDesc::new(vec![Type::Int])
}

/// Inserts the tuples produced by a child cursor into a table.
pub struct Insert<'a, C> {
    pool: &'a BufferPool,
    tid: TransactionId,
    child: C,
    table: TableId,
    desc: TupleDesc,
    done: bool,
}

impl<'a, C: DbIterator> Insert<'a, C> {
    /// Creates the operator, validating the child's schema against the
    /// target table.
    ///
    /// # Errors
    ///
    /// Returns `DbError::TupleDescMismatch` if the child's tuples do not
    /// fit the table, and `DbError::NoSuchTable` for an unknown table id.
    pub fn new(
        pool: &'a BufferPool,
        tid: TransactionId,
        child: C,
        table: TableId,
    ) -> Result<Self> {
        let table_desc = pool.catalog().tuple_desc(table)?;
        if table_desc != *child.tuple_desc() {
            return Err(DbError::TupleDescMismatch(format!(
                "cannot insert {} into table of {}",
                child.tuple_desc(),
                table_desc
            )));
        }
        Ok(Self {
            pool,
            tid,
            child,
            table,
            desc: count_desc(),
            done: false,
        })
    }
}

impl<C: DbIterator> DbIterator for Insert<'_, C> {
    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }

    async fn open(&mut self) -> Result<()> {
        self.child.open().await?;
        self.done = false;
        Ok(())
    }

    async fn has_next(&mut self) -> Result<bool> {
        Ok(!self.done)
    }

    async fn next(&mut self) -> Result<Tuple> {
        if self.done {
            return Err(DbError::NoSuchTuple);
        }
        let mut inserted = 0;
        while self.child.has_next().await? {
            let tuple = self.child.next().await?;
            self.pool.insert_tuple(self.tid, self.table, tuple).await?;
            inserted += 1;
        }
        self.done = true;
        Tuple::new(self.desc.clone(), vec![Field::Int(inserted)])
    }

    async fn rewind(&mut self) -> Result<()> {
        self.done = false;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
    }
}

/// Deletes the tuples produced by a child cursor from their tables.
///
/// Each child tuple must carry a record id (i.e. come from a scan); the
/// owning table is resolved from it.
pub struct Delete<'a, C> {
    pool: &'a BufferPool,
    tid: TransactionId,
    child: C,
    desc: TupleDesc,
    done: bool,
}

impl<'a, C: DbIterator> Delete<'a, C> {
    /// Creates the operator.
    pub fn new(pool: &'a BufferPool, tid: TransactionId, child: C) -> Self {
        Self {
            pool,
            tid,
            child,
            desc: count_desc(),
            done: false,
        }
    }
}

impl<C: DbIterator> DbIterator for Delete<'_, C> {
    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }

    async fn open(&mut self) -> Result<()> {
        self.child.open().await?;
        self.done = false;
        Ok(())
    }

    async fn has_next(&mut self) -> Result<bool> {
        Ok(!self.done)
    }

    async fn next(&mut self) -> Result<Tuple> {
        if self.done {
            return Err(DbError::NoSuchTuple);
        }
        let mut deleted = 0;
        while self.child.has_next().await? {
            let tuple = self.child.next().await?;
            self.pool.delete_tuple(self.tid, &tuple).await?;
            deleted += 1;
        }
        self.done = true;
        Tuple::new(self.desc.clone(), vec![Field::Int(deleted)])
    }

    async fn rewind(&mut self) -> Result<()> {
        self.done = false;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
    }
}
