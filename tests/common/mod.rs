//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use stratum::datum::{Field, Type};
use stratum::db::{Database, DbConfig};
use stratum::exec::DbIterator;
use stratum::storage::TableId;
use stratum::tuple::{Tuple, TupleDesc};
use stratum::tx::TransactionId;
use tempfile::TempDir;

/// Builds a database with one empty `(int)` table.
pub async fn int_table(page_size: usize, buffer_capacity: usize) -> (TempDir, Database, TableId) {
    let dir = TempDir::new().unwrap();
    let db = Database::with_config(DbConfig {
        page_size,
        buffer_capacity,
    });
    let table = db
        .open_table(dir.path().join("t.dat"), int_desc(), "t")
        .await
        .unwrap();
    (dir, db, table)
}

pub fn int_desc() -> TupleDesc {
    TupleDesc::new(vec![Type::Int])
}

pub fn int_tuple(v: i32) -> Tuple {
    Tuple::new(int_desc(), vec![Field::Int(v)]).unwrap()
}

/// Inserts `values` in one transaction and commits it.
pub async fn seed(db: &Database, table: TableId, values: &[i32]) {
    let tid = TransactionId::new();
    for &v in values {
        db.pool().insert_tuple(tid, table, int_tuple(v)).await.unwrap();
    }
    db.pool().commit(tid).await.unwrap();
}

/// Scans the whole table under `tid` and returns the integer values in
/// scan order.
pub async fn scan_values(db: &Database, table: TableId, tid: TransactionId) -> Vec<i32> {
    let file = db.catalog().file(table).unwrap();
    let mut scan = file.scan(db.pool(), tid);
    scan.open().await.unwrap();

    let mut values = Vec::new();
    while scan.has_next().await.unwrap() {
        let tuple = scan.next().await.unwrap();
        match tuple.field(0) {
            Some(Field::Int(v)) => values.push(*v),
            other => panic!("unexpected field {:?}", other),
        }
    }
    scan.close();
    values
}
