//! Database context: configuration, catalog, and buffer pool.
//!
//! There is no process-wide singleton; everything that needs the catalog or
//! the pool receives a handle. Tests build as many independent databases as
//! they like, each with its own page size and cache capacity.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::heap::file::HeapFile;
use crate::storage::buffer::{BufferPool, BufferPoolConfig};
use crate::storage::page::{DEFAULT_PAGE_SIZE, TableId};
use crate::tuple::TupleDesc;

/// Database-wide configuration.
///
/// The page size is fixed for the lifetime of the database; shrinking it is
/// useful only to force multi-page behavior in tests.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Size of every heap page in bytes.
    pub page_size: usize,
    /// Maximum number of pages the buffer pool caches.
    pub buffer_capacity: usize,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            buffer_capacity: 50,
        }
    }
}

/// A self-contained database instance.
pub struct Database {
    config: DbConfig,
    catalog: Arc<Catalog>,
    pool: BufferPool,
}

impl Database {
    /// Creates a database with the default configuration.
    pub fn new() -> Self {
        Self::with_config(DbConfig::default())
    }

    /// Creates a database with the given configuration.
    pub fn with_config(config: DbConfig) -> Self {
        let catalog = Arc::new(Catalog::new());
        let pool = BufferPool::new(
            catalog.clone(),
            BufferPoolConfig {
                capacity: config.buffer_capacity,
            },
        );
        Self {
            config,
            catalog,
            pool,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Returns the catalog.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Returns the buffer pool.
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Opens (or creates) the heap file at `path` and registers it in the
    /// catalog under `name`.
    pub async fn open_table(
        &self,
        path: impl Into<PathBuf>,
        desc: TupleDesc,
        name: impl Into<String>,
    ) -> Result<TableId> {
        let name = name.into();
        let file = Arc::new(HeapFile::open(path, desc, self.config.page_size).await?);
        let id = self.catalog.add_table(file, &name);
        info!(table = %name, id = id.value(), "opened table");
        Ok(id)
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}
