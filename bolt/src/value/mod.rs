//! The value tree: a tagged union over null, boolean, integer, float,
//! bytes, string, list, map and structure (spec.md §3).
//!
//! Design Note 9 calls the C original's inline/extended storage split "an
//! implementation optimization, not a contract" and tells a port to use a
//! sum type whose small variants are stored by value. A plain Rust `enum`
//! already does exactly that: `Null`/`Boolean`/`Integer`/`Float` live
//! inline in the enum's own storage, while `Bytes`/`String`/`List`/`Map`/
//! `Structure` own heap-allocated buffers already. No hand-rolled 16-byte
//! inline tail is needed to satisfy "small values don't allocate".

use indexmap::IndexMap;

pub mod structure;
pub use structure::Structure;

/// A value's discriminator, kept distinct from `Value` itself so callers
/// can match on "what kind is this" without borrowing the payload.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ValueKind {
    Null,
    Boolean,
    Integer,
    Float,
    Bytes,
    String,
    List,
    Map,
    Structure,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Bytes(Vec<u8>),
    String(String),
    List(Vec<Value>),
    /// Keys are unique; insertion order is preserved for wire round-trip,
    /// which is why this is an `IndexMap` and not a `HashMap`.
    Map(IndexMap<String, Value>),
    Structure(Structure),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Integer(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::String(_) => ValueKind::String,
            Value::List(_) => ValueKind::List,
            Value::Map(_) => ValueKind::Map,
            Value::Structure(_) => ValueKind::Structure,
        }
    }

    /// The element/byte/field count used for wire-size decisions (how many
    /// bytes the length-prefix marker needs, how many fields a structure
    /// carries). Scalars report 1 so callers treat every value uniformly.
    pub fn size(&self) -> usize {
        match self {
            Value::Null => 0,
            Value::Boolean(_) | Value::Integer(_) | Value::Float(_) => 1,
            Value::Bytes(b) => b.len(),
            Value::String(s) => s.len(),
            Value::List(items) => items.len(),
            Value::Map(entries) => entries.len(),
            Value::Structure(s) => s.fields.len(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_structure(&self) -> Option<&Structure> {
        match self {
            Value::Structure(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Value {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Value {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::String(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Value {
        Value::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Value {
        Value::List(items)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(entries: IndexMap<String, Value>) -> Value {
        Value::Map(entries)
    }
}

impl From<Structure> for Value {
    fn from(s: Structure) -> Value {
        Value::Structure(s)
    }
}

/// Typed homogeneous number arrays (spec.md §3) fold into a generic
/// `Value::List` on the wire (§4.1, "Typed homogeneous number arrays are
/// encoded as generic lists on the wire") and the Open Questions in §9
/// explicitly allow folding them into a generic list in memory too. These
/// impls keep the ergonomic "build me a list of ints" call site without
/// reintroducing a separate typed-array variant.
impl From<Vec<i64>> for Value {
    fn from(items: Vec<i64>) -> Value {
        Value::List(items.into_iter().map(Value::Integer).collect())
    }
}

impl From<Vec<f64>> for Value {
    fn from(items: Vec<f64>) -> Value {
        Value::List(items.into_iter().map(Value::Float).collect())
    }
}

impl From<Vec<bool>> for Value {
    fn from(items: Vec<bool>) -> Value {
        Value::List(items.into_iter().map(Value::Boolean).collect())
    }
}

/// Builds a `Value::Map` from an iterator of key/value pairs, preserving
/// insertion order.
impl std::iter::FromIterator<(String, Value)> for Value {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Value::Map(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_report_kind() {
        assert_eq!(Value::Integer(42).kind(), ValueKind::Integer);
        assert_eq!(Value::from("hi").kind(), ValueKind::String);
    }

    #[test]
    fn map_preserves_insertion_order() {
        let value: Value = vec![
            ("x".to_string(), Value::Integer(1)),
            ("y".to_string(), Value::from(vec![Value::Integer(2), Value::Integer(3)])),
        ]
        .into_iter()
        .collect();

        let map = value.as_map().unwrap();
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["x", "y"]);
    }

    #[test]
    fn typed_number_array_folds_into_list() {
        let value: Value = vec![2i64, 3i64].into();
        assert_eq!(value.kind(), ValueKind::List);
        assert_eq!(value.as_list().unwrap(), &[Value::Integer(2), Value::Integer(3)]);
    }
}
