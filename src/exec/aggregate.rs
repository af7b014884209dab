//! Group aggregation over string fields.

use std::collections::HashMap;
use std::fmt;

use crate::datum::{Field, Type};
use crate::error::{DbError, Result};
use crate::tuple::{Tuple, TupleDesc};

use super::TupleIterator;

/// Aggregate function selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateOp::Count => "count",
            AggregateOp::Sum => "sum",
            AggregateOp::Avg => "avg",
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
        };
        write!(f, "{}", name)
    }
}

/// Counting aggregator over a stream of tuples with a string aggregate
/// field.
///
/// Groups by an optional `(field index, type)` pair; with no grouping,
/// every merged tuple lands in a single global group. Only `COUNT` is
/// defined for strings.
pub struct StringAggregator {
    group_by: Option<(usize, Type)>,
    field: usize,
    groups: HashMap<Option<Field>, Vec<String>>,
    /// Group keys in first-seen order, so output is deterministic.
    order: Vec<Option<Field>>,
    desc: TupleDesc,
}

impl StringAggregator {
    /// Creates an aggregator over string field `field`, grouping by
    /// `group_by` when present.
    ///
    /// # Errors
    ///
    /// Returns `DbError::UnsupportedAggregate` for any operator other than
    /// `Count`.
    pub fn new(group_by: Option<(usize, Type)>, field: usize, op: AggregateOp) -> Result<Self> {
        if op != AggregateOp::Count {
            return Err(DbError::UnsupportedAggregate(format!(
                "{} is not defined for string fields",
                op
            )));
        }
        let desc = match group_by {
            None => TupleDesc::new(vec![Type::Int]),
            Some((_, ty)) => TupleDesc::new(vec![ty, Type::Int]),
        };
        Ok(Self {
            group_by,
            field,
            groups: HashMap::new(),
            order: Vec::new(),
            desc,
        })
    }

    /// Merges one tuple into its group.
    ///
    /// # Errors
    ///
    /// Returns `DbError::TupleDescMismatch` if the aggregate field is not a
    /// string or the group field is missing or of the wrong type.
    pub fn merge(&mut self, tuple: &Tuple) -> Result<()> {
        let key = match self.group_by {
            None => None,
            Some((index, ty)) => {
                let field = tuple.field(index).ok_or_else(|| {
                    DbError::TupleDescMismatch(format!("tuple has no group field {}", index))
                })?;
                if field.field_type() != ty {
                    return Err(DbError::TupleDescMismatch(format!(
                        "group field {} is {}, expected {}",
                        index,
                        field.field_type(),
                        ty
                    )));
                }
                Some(field.clone())
            }
        };

        let value = match tuple.field(self.field) {
            Some(Field::Text(s)) => s.clone(),
            _ => {
                return Err(DbError::TupleDescMismatch(format!(
                    "aggregate field {} is not a string",
                    self.field
                )));
            }
        };

        if !self.groups.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.groups.entry(key).or_default().push(value);
        Ok(())
    }

    /// Returns a cursor over the aggregate results: one `(group, count)`
    /// tuple per group, or a single `(count)` tuple with no grouping.
    pub fn iterator(&self) -> TupleIterator {
        let tuples = self
            .order
            .iter()
            .map(|key| {
                let count = self.groups[key].len() as i32;
                let fields = match key {
                    None => vec![Field::Int(count)],
                    Some(group) => vec![group.clone(), Field::Int(count)],
                };
                Tuple::new(self.desc.clone(), fields)
                    .expect("aggregate output matches its descriptor")
            })
            .collect();
        TupleIterator::new(self.desc.clone(), tuples)
    }
}
