//! Page and table identity.

use std::hash::{Hash, Hasher};
use std::path::Path;

/// Default page size in bytes. Databases may be configured with a smaller
/// size for tests (see [`DbConfig`](crate::db::DbConfig)).
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Stable identity of one heap file.
///
/// Derived deterministically from the file's canonical on-disk path, so
/// reopening the same file always yields the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(u64);

impl TableId {
    /// Creates a table id from a raw value.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Derives the table id for a heap file path.
    pub fn from_path(path: &Path) -> Self {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        path.hash(&mut hasher);
        Self(hasher.finish())
    }

    /// Returns the raw id value.
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// Unique identifier of a page: the owning table plus a 0-based page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    table: TableId,
    page_no: u64,
}

impl PageId {
    /// Creates a new page identifier.
    pub const fn new(table: TableId, page_no: u64) -> Self {
        Self { table, page_no }
    }

    /// Returns the owning table.
    pub const fn table(&self) -> TableId {
        self.table
    }

    /// Returns the 0-based page number within the table.
    pub const fn page_no(&self) -> u64 {
        self.page_no
    }

    /// Returns the byte offset of this page in its heap file.
    pub const fn byte_offset(&self, page_size: usize) -> u64 {
        self.page_no * page_size as u64
    }
}
