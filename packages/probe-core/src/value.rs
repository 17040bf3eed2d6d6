//! Decoded column values.

use std::fmt;

use serde::Serialize;
use tokio_postgres::types::{FromSql, Type};
use tokio_postgres::Row;

use crate::error::{ProbeError, Result};

/// A single cell of a result set.
///
/// Integer widths collapse into `Int` so that an `INT` column compares
/// equal to a `BIGINT` aggregate holding the same number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    /// A column whose type has no decoder; holds the type name
    Opaque(String),
}

impl Value {
    /// Decodes column `idx` of `row` according to its declared type.
    pub fn from_row(row: &Row, idx: usize) -> Result<Self> {
        let ty = row.columns()[idx].type_().clone();
        let value = match ty {
            Type::BOOL => get::<bool>(row, idx)?.map(Value::Bool),
            Type::CHAR => get::<i8>(row, idx)?.map(|v| Value::Int(v.into())),
            Type::INT2 => get::<i16>(row, idx)?.map(|v| Value::Int(v.into())),
            Type::INT4 => get::<i32>(row, idx)?.map(|v| Value::Int(v.into())),
            Type::INT8 => get::<i64>(row, idx)?.map(Value::Int),
            Type::OID => get::<u32>(row, idx)?.map(|v| Value::Int(v.into())),
            Type::FLOAT4 => get::<f32>(row, idx)?.map(|v| Value::Float(v.into())),
            Type::FLOAT8 => get::<f64>(row, idx)?.map(Value::Float),
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
                get::<String>(row, idx)?.map(Value::Text)
            }
            Type::BYTEA => get::<Vec<u8>>(row, idx)?.map(Value::Bytes),
            other => Some(Value::Opaque(other.name().to_string())),
        };
        Ok(value.unwrap_or(Value::Null))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize) -> Result<Option<T>> {
    row.try_get::<usize, Option<T>>(idx).map_err(|e| {
        ProbeError::Decode(format!(
            "column {} ({}): {}",
            idx,
            row.columns()[idx].name(),
            e
        ))
    })
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => f.write_str(s),
            Value::Bytes(bytes) => {
                f.write_str("\\x")?;
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            Value::Opaque(ty) => write!(f, "<{}>", ty),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_text_rendering() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Int(-7).to_string(), "-7");
        assert_eq!(Value::from("Full Clip").to_string(), "Full Clip");
        assert_eq!(Value::Bytes(vec![0x00, 0xab, 0x10]).to_string(), "\\x00ab10");
        assert_eq!(Value::Opaque("numeric".into()).to_string(), "<numeric>");
    }

    #[test]
    fn test_integer_widths_compare_equal() {
        assert_eq!(Value::from(11i32), Value::from(11i64));
        assert_ne!(Value::from(11i32), Value::from("11"));
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(3i32)), Value::Int(3));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::Int(4).as_i64(), Some(4));
        assert_eq!(Value::Int(4).as_f64(), Some(4.0));
        assert_eq!(Value::Text("a".into()).as_i64(), None);
        assert_eq!(Value::Text("a".into()).as_str(), Some("a"));
        assert_eq!(Value::Bytes(vec![1]).as_bytes(), Some(&[1u8][..]));
        assert!(Value::Null.is_null());
    }
}
