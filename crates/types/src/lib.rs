//! Shared scalar, row and paging types used by the strata cache and executor
//! crates.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// A scalar value bound to a statement parameter or read from a result column,
/// matching the type affinity of common relational stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// NULL value.
    Null,
    /// BOOLEAN value.
    Bool(bool),
    /// INTEGER value (i64).
    Integer(i64),
    /// REAL value (f64).
    Real(f64),
    /// TEXT value.
    Text(String),
    /// BLOB value.
    Blob(Vec<u8>),
}

impl Value {
    /// Check if the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert to bool if possible.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert to i64 if possible.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert to f64 if possible.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Convert to string if possible.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Convert to bytes if possible.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(v) => Some(v),
            _ => None,
        }
    }
}

// Values act as cache key components, so equality and hashing must be total.
// Reals compare by bit pattern.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Blob(a), Value::Blob(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(v) => v.hash(state),
            Value::Integer(v) => v.hash(state),
            Value::Real(v) => v.to_bits().hash(state),
            Value::Text(v) => v.hash(state),
            Value::Blob(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v}"),
            Value::Blob(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
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
        Value::Blob(v)
    }
}

/// A row of named columns in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    columns: IndexMap<String, Value>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by column name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// Set a column value, appending the column if it is new.
    pub fn set(&mut self, column: impl Into<String>, value: Value) {
        self.columns.insert(column.into(), value);
    }

    /// Check if the row has a column.
    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Column values in declaration order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.columns.values()
    }
}

impl<S: Into<String>> FromIterator<(S, Value)> for Row {
    fn from_iter<T: IntoIterator<Item = (S, Value)>>(iter: T) -> Self {
        Row {
            columns: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// A shared, mutable result or parameter object.
///
/// This is the "read/write named properties on arbitrary objects" capability
/// consumed by deferred loads and OUT-parameter reconciliation.
pub type SharedRow = Arc<Mutex<Row>>;

/// Wrap a row for shared mutation.
pub fn shared_row(row: Row) -> SharedRow {
    Arc::new(Mutex::new(row))
}

/// Pagination bounds applied to a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBounds {
    /// Number of leading rows to skip.
    pub offset: usize,
    /// Maximum number of rows to return.
    pub limit: usize,
}

impl Default for RowBounds {
    fn default() -> Self {
        Self { offset: 0, limit: usize::MAX }
    }
}

impl RowBounds {
    /// Create bounds with an explicit offset and limit.
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    /// Apply the bounds to a materialized result set.
    pub fn apply(&self, rows: Vec<Row>) -> Vec<Row> {
        if self.offset == 0 && self.limit == usize::MAX {
            return rows;
        }
        rows.into_iter().skip(self.offset).take(self.limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(value: &Value) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_real_equality_by_bits() {
        assert_eq!(Value::Real(1.5), Value::Real(1.5));
        assert_ne!(Value::Real(0.0), Value::Real(-0.0));
        assert_eq!(hash_of(&Value::Real(2.5)), hash_of(&Value::Real(2.5)));
    }

    #[test]
    fn test_null_is_a_distinct_value() {
        assert_eq!(Value::Null, Value::Null);
        assert_ne!(Value::Null, Value::Integer(0));
        assert_ne!(hash_of(&Value::Null), hash_of(&Value::Bool(false)));
    }

    #[test]
    fn test_row_preserves_column_order() {
        let mut row = Row::new();
        row.set("id", Value::Integer(1));
        row.set("name", Value::from("alice"));
        let names: Vec<_> = row.column_names().collect();
        assert_eq!(names, vec!["id", "name"]);
        assert_eq!(row.get("name").and_then(Value::as_str), Some("alice"));
    }

    #[test]
    fn test_row_bounds_apply() {
        let rows: Vec<Row> = (0..5)
            .map(|i| Row::from_iter([("id", Value::Integer(i))]))
            .collect();
        let bounded = RowBounds::new(1, 2).apply(rows.clone());
        assert_eq!(bounded.len(), 2);
        assert_eq!(bounded[0].get("id").and_then(Value::as_i64), Some(1));
        assert_eq!(RowBounds::default().apply(rows).len(), 5);
    }
}
