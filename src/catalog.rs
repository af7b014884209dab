//! Table catalog: resolves table ids and names to heap files.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{DbError, Result};
use crate::heap::file::HeapFile;
use crate::storage::page::TableId;
use crate::tuple::TupleDesc;

#[derive(Default)]
struct CatalogInner {
    tables: HashMap<TableId, Arc<HeapFile>>,
    names: HashMap<String, TableId>,
}

/// Registry of the heap files a database knows about.
///
/// The buffer pool holds a shared catalog handle and refers to files by
/// [`TableId`] only; the catalog is the single place a table id turns back
/// into a file.
pub struct Catalog {
    inner: RwLock<CatalogInner>,
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(CatalogInner::default()),
        }
    }

    /// Registers a heap file under `name` and returns its table id.
    ///
    /// Re-registering a name replaces the previous mapping.
    pub fn add_table(&self, file: Arc<HeapFile>, name: impl Into<String>) -> TableId {
        let id = file.id();
        let mut inner = self.inner.write();
        inner.tables.insert(id, file);
        inner.names.insert(name.into(), id);
        id
    }

    /// Resolves a table id to its heap file.
    ///
    /// # Errors
    ///
    /// Returns `DbError::NoSuchTable` for an unregistered id.
    pub fn file(&self, id: TableId) -> Result<Arc<HeapFile>> {
        self.inner
            .read()
            .tables
            .get(&id)
            .cloned()
            .ok_or(DbError::NoSuchTable(id))
    }

    /// Resolves a table name to its id.
    pub fn table_id(&self, name: &str) -> Option<TableId> {
        self.inner.read().names.get(name).copied()
    }

    /// Returns the tuple schema of a table.
    ///
    /// # Errors
    ///
    /// Returns `DbError::NoSuchTable` for an unregistered id.
    pub fn tuple_desc(&self, id: TableId) -> Result<TupleDesc> {
        Ok(self.file(id)?.desc().clone())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
