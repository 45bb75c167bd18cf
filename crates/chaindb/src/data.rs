//! Column payloads for INSERT and UPDATE.

use crate::compile::Params;
use crate::error::CompileError;
use crate::raw::{RAW_MARKER, RawExpr};
use crate::value::Value;
use serde_json::Value as Json;

/// A value written to a column: bound, or a raw server-side expression.
#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    Value(Value),
    Raw(RawExpr),
}

impl SetValue {
    pub(crate) fn render(&self, params: &mut Params) -> Result<String, CompileError> {
        match self {
            SetValue::Value(v) => Ok(params.push(v.clone())),
            SetValue::Raw(expr) => expr.render(params),
        }
    }

    /// JSON payload value: `` "`NOW()" `` is raw, `` ["`ABS(?)", 3] `` is raw with
    /// bound arguments, everything else is a value.
    pub fn from_json(v: Json) -> Self {
        match v {
            Json::String(s) => match RawExpr::parse_marked(&s) {
                Some(expr) => SetValue::Raw(expr),
                None => SetValue::Value(Value::Text(s)),
            },
            Json::Array(items) if is_marked_template(&items) => {
                let mut items = items.into_iter();
                let template = items
                    .next()
                    .and_then(|t| t.as_str().map(|s| s.trim_start_matches(RAW_MARKER).to_string()))
                    .unwrap_or_default();
                SetValue::Raw(RawExpr::new(template).bind(items.map(Value::from)))
            }
            other => SetValue::Value(Value::from(other)),
        }
    }
}

fn is_marked_template(items: &[Json]) -> bool {
    items
        .first()
        .and_then(Json::as_str)
        .is_some_and(|s| s.starts_with(RAW_MARKER))
}

impl<T: Into<Value>> From<T> for SetValue {
    fn from(v: T) -> Self {
        SetValue::Value(v.into())
    }
}

impl From<RawExpr> for SetValue {
    fn from(expr: RawExpr) -> Self {
        SetValue::Raw(expr)
    }
}

/// Ordered column → value mapping.
///
/// ```ignore
/// let data = Data::new()
///     .set("name", "alice")
///     .set("updated_at", raw("NOW()"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Data {
    columns: Vec<(String, SetValue)>,
}

impl Data {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a column.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<SetValue>) -> Self {
        self.insert(column, value);
        self
    }

    /// Add or replace a column in place.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<SetValue>) {
        let column = column.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.columns.push((column, value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(c, _)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SetValue)> {
        self.columns.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn get(&self, column: &str) -> Option<&SetValue> {
        self.columns.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    /// The same columns rearranged into `order`. `None` when the column sets differ.
    pub fn reordered<'a>(&self, order: impl ExactSizeIterator<Item = &'a str>) -> Option<Data> {
        if order.len() != self.len() {
            return None;
        }
        let columns = order
            .map(|c| self.get(c).map(|v| (c.to_string(), v.clone())))
            .collect::<Option<Vec<_>>>()?;
        Some(Data { columns })
    }

    /// Build from a JSON object, keeping key order.
    pub fn from_json(v: Json) -> Result<Self, CompileError> {
        match v {
            Json::Object(map) => Ok(Self {
                columns: map
                    .into_iter()
                    .map(|(k, v)| (k, SetValue::from_json(v)))
                    .collect(),
            }),
            other => Err(CompileError::InvalidClause {
                index: 0,
                field: String::new(),
                reason: format!("expected a JSON object of column values, got {other}"),
            }),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Data
where
    K: Into<String>,
    V: Into<SetValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut data = Data::new();
        for (k, v) in iter {
            data.insert(k, v);
        }
        data
    }
}

impl<K, V> From<Vec<(K, V)>> for Data
where
    K: Into<String>,
    V: Into<SetValue>,
{
    fn from(pairs: Vec<(K, V)>) -> Self {
        pairs.into_iter().collect()
    }
}

/// One INSERT row.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertData {
    /// Named columns.
    Row(Data),
    /// Values for every column in table order (`INSERT INTO t VALUES (...)`).
    ValuesOnly(Vec<SetValue>),
}

impl InsertData {
    /// Split form: parallel `fields` / `values` lists.
    pub fn split<F, V>(fields: impl IntoIterator<Item = F>, values: impl IntoIterator<Item = V>) -> Result<Self, CompileError>
    where
        F: Into<String>,
        V: Into<SetValue>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        let values: Vec<SetValue> = values.into_iter().map(Into::into).collect();
        if fields.len() != values.len() {
            return Err(CompileError::InvalidClause {
                index: 0,
                field: String::new(),
                reason: format!("{} fields but {} values", fields.len(), values.len()),
            });
        }
        Ok(InsertData::Row(fields.into_iter().zip(values).collect()))
    }

    /// Values-only form.
    pub fn values<V: Into<SetValue>>(values: impl IntoIterator<Item = V>) -> Self {
        InsertData::ValuesOnly(values.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            InsertData::Row(d) => d.is_empty(),
            InsertData::ValuesOnly(v) => v.is_empty(),
        }
    }

    /// Accepts a natural object, `{"fields": [...], "values": [...]}` or `{"values": [...]}`.
    pub fn from_json(v: Json) -> Result<Self, CompileError> {
        let mut map = match v {
            Json::Object(map) => map,
            other => return Data::from_json(other).map(InsertData::Row),
        };
        let split_keys = map.contains_key("values")
            && map.keys().all(|k| k == "fields" || k == "values");
        if !split_keys {
            return Data::from_json(Json::Object(map)).map(InsertData::Row);
        }

        let values = json_list(map.remove("values"), "values")?
            .into_iter()
            .map(SetValue::from_json)
            .collect::<Vec<_>>();
        match map.remove("fields") {
            Some(fields) => {
                let fields = json_list(Some(fields), "fields")?
                    .into_iter()
                    .map(|f| match f {
                        Json::String(s) => Ok(s),
                        other => Err(CompileError::InvalidClause {
                            index: 0,
                            field: other.to_string(),
                            reason: "field names must be strings".to_string(),
                        }),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                InsertData::split(fields, values)
            }
            None => Ok(InsertData::ValuesOnly(values)),
        }
    }

    /// Batch rows from `[{...}, {...}]` or `{"fields": [...], "values": [[...], ...]}`.
    pub fn many_from_json(v: Json) -> Result<Vec<Self>, CompileError> {
        match v {
            Json::Array(rows) => rows.into_iter().map(InsertData::from_json).collect(),
            Json::Object(mut map) => {
                let fields = map.remove("fields");
                json_list(map.remove("values"), "values")?
                    .into_iter()
                    .map(|row| {
                        let mut obj = serde_json::Map::new();
                        if let Some(f) = &fields {
                            obj.insert("fields".to_string(), f.clone());
                        }
                        obj.insert("values".to_string(), row);
                        InsertData::from_json(Json::Object(obj))
                    })
                    .collect()
            }
            other => Err(CompileError::InvalidClause {
                index: 0,
                field: String::new(),
                reason: format!("expected a list of rows, got {other}"),
            }),
        }
    }
}

fn json_list(v: Option<Json>, key: &str) -> Result<Vec<Json>, CompileError> {
    match v {
        Some(Json::Array(items)) => Ok(items),
        other => Err(CompileError::InvalidClause {
            index: 0,
            field: key.to_string(),
            reason: format!("'{key}' must be a list, got {}", other.unwrap_or_default()),
        }),
    }
}

impl From<Data> for InsertData {
    fn from(data: Data) -> Self {
        InsertData::Row(data)
    }
}

impl<K, V> From<Vec<(K, V)>> for InsertData
where
    K: Into<String>,
    V: Into<SetValue>,
{
    fn from(pairs: Vec<(K, V)>) -> Self {
        InsertData::Row(pairs.into())
    }
}
