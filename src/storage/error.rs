//! Storage layer errors.

use std::fmt;

use crate::datum::SerializationError;

/// Errors from page-level I/O and page decoding.
#[derive(Debug)]
pub enum StorageError {
    /// Underlying file I/O failed.
    Io(std::io::Error),
    /// The requested page lies past the end of the file.
    PageOutOfRange {
        /// Requested page number.
        page_no: u64,
        /// Number of pages in the file.
        page_count: u64,
    },
    /// On-disk bytes could not be decoded as a page.
    Corrupted(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "io error: {}", e),
            StorageError::PageOutOfRange {
                page_no,
                page_count,
            } => {
                write!(
                    f,
                    "page {} out of range: file has {} pages",
                    page_no, page_count
                )
            }
            StorageError::Corrupted(msg) => write!(f, "corrupted page: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

impl From<SerializationError> for StorageError {
    fn from(e: SerializationError) -> Self {
        StorageError::Corrupted(e.to_string())
    }
}
