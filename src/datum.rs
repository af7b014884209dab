//! Field types, values, and predicate operators.
//!
//! This module defines the canonical type system for the engine: [`Type`]
//! identifies a column type, [`Field`] is a single typed value with the
//! fixed-width big-endian serialization used by heap pages, and
//! [`PredicateOp`] is the operator set understood by field comparison and
//! selectivity estimation.

use std::fmt;

use bytes::{Buf, BufMut};

/// Maximum payload length of a text field in bytes.
///
/// Text fields are stored fixed-width: a 4-byte big-endian length prefix
/// followed by exactly this many payload bytes, zero-padded. The constant is
/// process-wide; all heap files share it.
pub const STRING_LEN: usize = 128;

/// Errors from field serialization/deserialization.
#[derive(Debug)]
pub enum SerializationError {
    /// Buffer too small for the operation.
    BufferTooSmall {
        /// Bytes required.
        required: usize,
        /// Bytes available.
        available: usize,
    },
    /// Invalid data format.
    InvalidFormat(String),
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializationError::BufferTooSmall {
                required,
                available,
            } => {
                write!(
                    f,
                    "buffer too small: need {} bytes, have {}",
                    required, available
                )
            }
            SerializationError::InvalidFormat(msg) => {
                write!(f, "invalid format: {}", msg)
            }
        }
    }
}

impl std::error::Error for SerializationError {}

/// Column type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// 4-byte signed integer.
    Int,
    /// Fixed-maximum-width string (see [`STRING_LEN`]).
    Text,
}

impl Type {
    /// Returns the serialized width of a field of this type in bytes.
    ///
    /// Text fields always occupy their maximum width on disk regardless of
    /// the payload length.
    pub const fn width(self) -> usize {
        match self {
            Type::Int => 4,
            Type::Text => 4 + STRING_LEN,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Int => "int",
            Type::Text => "text",
        };
        write!(f, "{}", name)
    }
}

/// Comparison operator applied by predicates and selectivity estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateOp {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEq,
    GreaterThan,
    GreaterThanOrEq,
    /// Substring containment; meaningful for text operands only.
    Like,
}

impl fmt::Display for PredicateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            PredicateOp::Equals => "=",
            PredicateOp::NotEquals => "<>",
            PredicateOp::LessThan => "<",
            PredicateOp::LessThanOrEq => "<=",
            PredicateOp::GreaterThan => ">",
            PredicateOp::GreaterThanOrEq => ">=",
            PredicateOp::Like => "LIKE",
        };
        write!(f, "{}", symbol)
    }
}

/// A single typed column value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Int(i32),
    Text(String),
}

impl Field {
    /// Creates a text field, truncating the payload to [`STRING_LEN`] bytes
    /// on a character boundary.
    pub fn text(s: impl Into<String>) -> Self {
        let mut s = s.into();
        if s.len() > STRING_LEN {
            let mut end = STRING_LEN;
            while !s.is_char_boundary(end) {
                end -= 1;
            }
            s.truncate(end);
        }
        Field::Text(s)
    }

    /// Returns the type of this field.
    pub const fn field_type(&self) -> Type {
        match self {
            Field::Int(_) => Type::Int,
            Field::Text(_) => Type::Text,
        }
    }

    /// Serializes this field into `buf` using the on-disk format.
    ///
    /// Integers are written MSB-first. Text is written as a 4-byte
    /// big-endian length prefix followed by exactly [`STRING_LEN`] payload
    /// bytes, zero-padded.
    pub fn write(&self, buf: &mut impl BufMut) {
        match self {
            Field::Int(n) => buf.put_i32(*n),
            Field::Text(s) => {
                let data = s.as_bytes();
                let len = data.len().min(STRING_LEN);
                buf.put_u32(len as u32);
                buf.put_slice(&data[..len]);
                buf.put_bytes(0, STRING_LEN - len);
            }
        }
    }

    /// Deserializes a field of type `ty` from `buf`.
    ///
    /// # Errors
    ///
    /// Returns `SerializationError::BufferTooSmall` if fewer than
    /// `ty.width()` bytes remain, and `SerializationError::InvalidFormat`
    /// for an out-of-range length prefix or non-UTF-8 text payload.
    pub fn read(ty: Type, buf: &mut impl Buf) -> Result<Self, SerializationError> {
        if buf.remaining() < ty.width() {
            return Err(SerializationError::BufferTooSmall {
                required: ty.width(),
                available: buf.remaining(),
            });
        }
        match ty {
            Type::Int => Ok(Field::Int(buf.get_i32())),
            Type::Text => {
                let len = buf.get_u32() as usize;
                if len > STRING_LEN {
                    return Err(SerializationError::InvalidFormat(format!(
                        "text length {} exceeds maximum {}",
                        len, STRING_LEN
                    )));
                }
                let mut raw = [0u8; STRING_LEN];
                buf.copy_to_slice(&mut raw);
                let s = String::from_utf8(raw[..len].to_vec())
                    .map_err(|e| SerializationError::InvalidFormat(e.to_string()))?;
                Ok(Field::Text(s))
            }
        }
    }

    /// Compares this field against `other` under `op`.
    ///
    /// Comparisons across mismatched types are false. `Like` is substring
    /// containment on text operands and degrades to equality on integers.
    pub fn compare(&self, op: PredicateOp, other: &Field) -> bool {
        match (self, other) {
            (Field::Int(a), Field::Int(b)) => match op {
                PredicateOp::Equals | PredicateOp::Like => a == b,
                PredicateOp::NotEquals => a != b,
                PredicateOp::LessThan => a < b,
                PredicateOp::LessThanOrEq => a <= b,
                PredicateOp::GreaterThan => a > b,
                PredicateOp::GreaterThanOrEq => a >= b,
            },
            (Field::Text(a), Field::Text(b)) => match op {
                PredicateOp::Equals => a == b,
                PredicateOp::NotEquals => a != b,
                PredicateOp::LessThan => a < b,
                PredicateOp::LessThanOrEq => a <= b,
                PredicateOp::GreaterThan => a > b,
                PredicateOp::GreaterThanOrEq => a >= b,
                PredicateOp::Like => a.contains(b.as_str()),
            },
            _ => false,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(n) => write!(f, "{}", n),
            Field::Text(s) => write!(f, "{}", s),
        }
    }
}
