//! The operator surface of the core.
//!
//! Query operators consume the core through [`DbIterator`]: a stateful
//! cursor with explicit open/rewind/close lifecycle. The crate ships the
//! cursors the core itself provides: the heap scan
//! ([`HeapScan`](crate::heap::HeapScan)), the vector-backed
//! [`TupleIterator`], the [`Insert`]/[`Delete`] modification operators, and
//! the [`StringAggregator`] output.

pub mod aggregate;
pub mod dml;

pub use aggregate::{AggregateOp, StringAggregator};
pub use dml::{Delete, Insert};

use crate::error::{DbError, Result};
use crate::tuple::{Tuple, TupleDesc};

/// A restartable cursor over a stream of tuples.
///
/// `next` without a preceding successful `has_next` fails with
/// `DbError::NoSuchTuple`. `close` releases cursor state only; any page
/// locks taken while iterating belong to the transaction and are released
/// at transaction completion.
pub trait DbIterator {
    /// Returns the schema of the tuples this cursor yields.
    fn tuple_desc(&self) -> &TupleDesc;

    /// Establishes starting state.
    async fn open(&mut self) -> Result<()>;

    /// Returns whether another tuple is available, advancing across any
    /// internal boundaries (e.g. pages) transparently.
    async fn has_next(&mut self) -> Result<bool>;

    /// Returns the next tuple.
    async fn next(&mut self) -> Result<Tuple>;

    /// Restarts the cursor from the beginning.
    async fn rewind(&mut self) -> Result<()>;

    /// Releases cursor state.
    fn close(&mut self);
}

/// A cursor over an in-memory tuple vector.
///
/// Used for aggregator output and as a leaf in tests.
pub struct TupleIterator {
    desc: TupleDesc,
    tuples: Vec<Tuple>,
    pos: usize,
    opened: bool,
}

impl TupleIterator {
    /// Creates a cursor over `tuples`, all of which must match `desc`.
    pub fn new(desc: TupleDesc, tuples: Vec<Tuple>) -> Self {
        debug_assert!(tuples.iter().all(|t| *t.desc() == desc));
        Self {
            desc,
            tuples,
            pos: 0,
            opened: false,
        }
    }
}

impl DbIterator for TupleIterator {
    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }

    async fn open(&mut self) -> Result<()> {
        self.opened = true;
        self.pos = 0;
        Ok(())
    }

    async fn has_next(&mut self) -> Result<bool> {
        Ok(self.opened && self.pos < self.tuples.len())
    }

    async fn next(&mut self) -> Result<Tuple> {
        if !self.opened || self.pos >= self.tuples.len() {
            return Err(DbError::NoSuchTuple);
        }
        let tuple = self.tuples[self.pos].clone();
        self.pos += 1;
        Ok(tuple)
    }

    async fn rewind(&mut self) -> Result<()> {
        self.pos = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
        self.pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::{Field, Type};

    fn ints(values: &[i32]) -> (TupleDesc, Vec<Tuple>) {
        let desc = TupleDesc::new(vec![Type::Int]);
        let tuples = values
            .iter()
            .map(|&v| Tuple::new(desc.clone(), vec![Field::Int(v)]).unwrap())
            .collect();
        (desc, tuples)
    }

    #[tokio::test]
    async fn test_tuple_iterator_yields_in_order() {
        let (desc, tuples) = ints(&[1, 2, 3]);
        let mut it = TupleIterator::new(desc, tuples);

        it.open().await.unwrap();
        let mut seen = Vec::new();
        while it.has_next().await.unwrap() {
            seen.push(it.next().await.unwrap());
        }
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].field(0), Some(&Field::Int(1)));
        assert_eq!(seen[2].field(0), Some(&Field::Int(3)));
    }

    #[tokio::test]
    async fn test_next_without_open_fails() {
        let (desc, tuples) = ints(&[1]);
        let mut it = TupleIterator::new(desc, tuples);
        assert!(matches!(it.next().await, Err(DbError::NoSuchTuple)));
    }

    #[tokio::test]
    async fn test_next_past_end_fails() {
        let (desc, tuples) = ints(&[1]);
        let mut it = TupleIterator::new(desc, tuples);
        it.open().await.unwrap();
        it.next().await.unwrap();
        assert!(!it.has_next().await.unwrap());
        assert!(matches!(it.next().await, Err(DbError::NoSuchTuple)));
    }

    #[tokio::test]
    async fn test_rewind_restarts() {
        let (desc, tuples) = ints(&[1, 2]);
        let mut it = TupleIterator::new(desc, tuples);
        it.open().await.unwrap();
        it.next().await.unwrap();
        it.rewind().await.unwrap();
        assert_eq!(it.next().await.unwrap().field(0), Some(&Field::Int(1)));
    }

    #[tokio::test]
    async fn test_close_stops_iteration() {
        let (desc, tuples) = ints(&[1, 2]);
        let mut it = TupleIterator::new(desc, tuples);
        it.open().await.unwrap();
        it.close();
        assert!(!it.has_next().await.unwrap());
    }
}
