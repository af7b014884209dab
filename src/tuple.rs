//! Tuple schemas, tuples, and record identity.

use std::fmt;

use bytes::{Buf, BufMut};

use crate::datum::{Field, SerializationError, Type};
use crate::error::DbError;
use crate::storage::page::PageId;

/// The schema of a tuple: an ordered sequence of column types with
/// advisory names.
///
/// Equality compares types element-wise only; names do not participate.
#[derive(Debug, Clone)]
pub struct TupleDesc {
    columns: Vec<(Type, Option<String>)>,
}

impl TupleDesc {
    /// Creates a descriptor with unnamed columns.
    pub fn new(types: Vec<Type>) -> Self {
        Self {
            columns: types.into_iter().map(|ty| (ty, None)).collect(),
        }
    }

    /// Creates a descriptor with named columns.
    pub fn with_names(columns: Vec<(Type, Option<String>)>) -> Self {
        Self { columns }
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the descriptor has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns the type of column `i`, if it exists.
    pub fn field_type(&self, i: usize) -> Option<Type> {
        self.columns.get(i).map(|(ty, _)| *ty)
    }

    /// Returns the advisory name of column `i`, if set.
    pub fn field_name(&self, i: usize) -> Option<&str> {
        self.columns.get(i).and_then(|(_, name)| name.as_deref())
    }

    /// Iterates the column types in order.
    pub fn types(&self) -> impl Iterator<Item = Type> + '_ {
        self.columns.iter().map(|(ty, _)| *ty)
    }

    /// Returns the serialized width of one tuple of this schema in bytes.
    pub fn width(&self) -> usize {
        self.types().map(Type::width).sum()
    }
}

impl PartialEq for TupleDesc {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.types().eq(other.types())
    }
}

impl Eq for TupleDesc {}

impl fmt::Display for TupleDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, (ty, name)) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match name {
                Some(name) => write!(f, "{} {}", name, ty)?,
                None => write!(f, "{}", ty)?,
            }
        }
        write!(f, ")")
    }
}

/// Storage location of a tuple: a page plus a slot index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    /// Page containing the tuple.
    pub page_id: PageId,
    /// Slot within the page.
    pub slot: usize,
}

impl RecordId {
    /// Creates a new record identifier.
    pub fn new(page_id: PageId, slot: usize) -> Self {
        Self { page_id, slot }
    }
}

/// An ordered sequence of fields matching a [`TupleDesc`], with an optional
/// storage location.
///
/// Tuples are immutable once built; updates are modeled as delete + insert.
/// The record id is stamped by the heap page on insert and carried by every
/// tuple a scan returns.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    desc: TupleDesc,
    fields: Vec<Field>,
    rid: Option<RecordId>,
}

impl Tuple {
    /// Creates a tuple from fields matching `desc`.
    ///
    /// # Errors
    ///
    /// Returns `DbError::TupleDescMismatch` if the field count or any field
    /// type disagrees with the descriptor.
    pub fn new(desc: TupleDesc, fields: Vec<Field>) -> Result<Self, DbError> {
        if fields.len() != desc.len() {
            return Err(DbError::TupleDescMismatch(format!(
                "expected {} fields, got {}",
                desc.len(),
                fields.len()
            )));
        }
        for (i, field) in fields.iter().enumerate() {
            let expected = desc.field_type(i).unwrap_or(Type::Int);
            if field.field_type() != expected {
                return Err(DbError::TupleDescMismatch(format!(
                    "field {} is {}, expected {}",
                    i,
                    field.field_type(),
                    expected
                )));
            }
        }
        Ok(Self {
            desc,
            fields,
            rid: None,
        })
    }

    /// Returns the schema of this tuple.
    pub fn desc(&self) -> &TupleDesc {
        &self.desc
    }

    /// Returns field `i`, if it exists.
    pub fn field(&self, i: usize) -> Option<&Field> {
        self.fields.get(i)
    }

    /// Returns all fields in order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns the storage location, if the tuple came from a page.
    pub fn record_id(&self) -> Option<RecordId> {
        self.rid
    }

    /// Sets or clears the storage location.
    pub fn set_record_id(&mut self, rid: Option<RecordId>) {
        self.rid = rid;
    }

    /// Serializes all fields into `buf` in column order.
    pub fn write(&self, buf: &mut impl BufMut) {
        for field in &self.fields {
            field.write(buf);
        }
    }

    /// Deserializes one tuple of schema `desc` from `buf`.
    ///
    /// The returned tuple has no record id; the caller stamps it.
    pub fn read(desc: &TupleDesc, buf: &mut impl Buf) -> Result<Self, SerializationError> {
        let mut fields = Vec::with_capacity(desc.len());
        for ty in desc.types() {
            fields.push(Field::read(ty, buf)?);
        }
        Ok(Self {
            desc: desc.clone(),
            fields,
            rid: None,
        })
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, "\t")?;
            }
            write!(f, "{}", field)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::STRING_LEN;

    #[test]
    fn test_desc_width() {
        let desc = TupleDesc::new(vec![Type::Int, Type::Text, Type::Int]);
        assert_eq!(desc.width(), 4 + (4 + STRING_LEN) + 4);
    }

    #[test]
    fn test_desc_equality_ignores_names() {
        let unnamed = TupleDesc::new(vec![Type::Int, Type::Text]);
        let named = TupleDesc::with_names(vec![
            (Type::Int, Some("id".into())),
            (Type::Text, Some("name".into())),
        ]);
        assert_eq!(unnamed, named);
        assert_ne!(unnamed, TupleDesc::new(vec![Type::Int]));
        assert_ne!(unnamed, TupleDesc::new(vec![Type::Text, Type::Int]));
    }

    #[test]
    fn test_tuple_type_check() {
        let desc = TupleDesc::new(vec![Type::Int, Type::Text]);
        assert!(Tuple::new(desc.clone(), vec![Field::Int(1), Field::text("x")]).is_ok());
        assert!(matches!(
            Tuple::new(desc.clone(), vec![Field::Int(1)]),
            Err(DbError::TupleDescMismatch(_))
        ));
        assert!(matches!(
            Tuple::new(desc, vec![Field::text("x"), Field::text("y")]),
            Err(DbError::TupleDescMismatch(_))
        ));
    }

    #[test]
    fn test_tuple_roundtrip() {
        let desc = TupleDesc::new(vec![Type::Int, Type::Text]);
        let tuple = Tuple::new(desc.clone(), vec![Field::Int(-7), Field::text("abc")]).unwrap();

        let mut buf = Vec::new();
        tuple.write(&mut buf);
        assert_eq!(buf.len(), desc.width());

        let parsed = Tuple::read(&desc, &mut buf.as_slice()).unwrap();
        assert_eq!(parsed.fields(), tuple.fields());
        assert_eq!(parsed.record_id(), None);
    }
}
