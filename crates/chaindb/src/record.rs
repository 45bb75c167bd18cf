//! Result rows.

use crate::value::Value;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::borrow::Cow;
use std::sync::Arc;

static NULL: Value = Value::Null;

/// One result row: column names in select order plus their values.
///
/// Accessors are forgiving: a missing column reads as `NULL` rather than
/// failing, so callers can probe optional columns without branching.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Record {
    /// Build a record sharing `columns` with the other rows of the same result.
    ///
    /// Missing trailing values read as `NULL`; surplus values are dropped.
    pub fn new(columns: Arc<[String]>, mut values: Vec<Value>) -> Self {
        values.resize(columns.len(), Value::Null);
        Self { columns, values }
    }

    pub fn from_pairs<K: Into<String>, V: Into<Value>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        let (columns, values): (Vec<String>, Vec<Value>) =
            pairs.into_iter().map(|(k, v)| (k.into(), v.into())).unzip();
        Self {
            columns: columns.into(),
            values,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of `column`, or `None` if the row has no such column.
    pub fn try_get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    /// Value of `column`; `NULL` when absent.
    pub fn get(&self, column: &str) -> &Value {
        self.try_get(column).unwrap_or(&NULL)
    }

    /// Text of `column`; `""` when absent or `NULL`.
    pub fn get_str(&self, column: &str) -> Cow<'_, str> {
        match self.get(column) {
            Value::Null => Cow::Borrowed(""),
            Value::Text(s) => Cow::Borrowed(s),
            other => Cow::Owned(other.to_string()),
        }
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        match self.get(column) {
            Value::Int(v) => Some(*v),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_f64(&self, column: &str) -> Option<f64> {
        match self.get(column) {
            Value::Text(s) => s.trim().parse().ok(),
            other => other.as_f64(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_columns_read_as_null() {
        let r = Record::from_pairs([("id", Value::Int(1)), ("name", Value::Null)]);
        assert_eq!(r.get("id"), &Value::Int(1));
        assert_eq!(r.get("nope"), &Value::Null);
        assert!(r.try_get("nope").is_none());
        assert_eq!(r.get_str("name"), "");
        assert_eq!(r.get_str("nope"), "");
        assert_eq!(r.get_str("id"), "1");
        assert_eq!(r.get_i64("id"), Some(1));
    }

    #[test]
    fn short_rows_are_padded() {
        let cols: Arc<[String]> = vec!["a".to_string(), "b".to_string()].into();
        let r = Record::new(cols, vec![Value::Int(1)]);
        assert_eq!(r.len(), 2);
        assert_eq!(r.get("b"), &Value::Null);
    }

    #[test]
    fn serializes_as_an_ordered_object() {
        let r = Record::from_pairs([("b", 2), ("a", 1)]);
        assert_eq!(serde_json::to_string(&r).unwrap(), r#"{"b":2,"a":1}"#);
    }
}
