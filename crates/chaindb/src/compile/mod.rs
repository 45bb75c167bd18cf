//! Condition compiler.
//!
//! Turns a [`Condition`](crate::Condition) plus a [`Dialect`](crate::Dialect)
//! into SQL text and a positional parameter list. Compilation is pure: the same
//! input always produces the same output, and nothing here performs I/O.
//!
//! - [`filter`]: where-predicate compiler
//! - [`clauses`]: join / order / group fragments
//! - [`paging`]: dialect-specific LIMIT/OFFSET strategies
//! - [`statement`]: SELECT / INSERT / UPDATE / DELETE / INCREMENT assembly

pub mod clauses;
pub mod filter;
pub mod paging;
pub mod statement;

pub use filter::compile_where;
pub use statement::{Fields, count, delete, fields_probe, increase, insert, insert_many, select, update};

use crate::dialect::PlaceholderStyle;
use crate::value::Value;

/// Positional parameter accumulator.
///
/// Placeholders are rendered at push time so numbered styles (`$1`, `@P1`)
/// always match the order values appear in.
#[derive(Debug, Clone)]
pub struct Params {
    style: PlaceholderStyle,
    values: Vec<Value>,
}

impl Params {
    pub fn new(style: PlaceholderStyle) -> Self {
        Self {
            style,
            values: Vec::new(),
        }
    }

    /// Bind a value and return its placeholder.
    pub fn push(&mut self, value: Value) -> String {
        self.values.push(value);
        self.style.render(self.values.len())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Final SQL text plus its positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

impl CompiledQuery {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }
}

/// One statement to be executed once per parameter set.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledBatch {
    pub sql: String,
    pub param_sets: Vec<Vec<Value>>,
}

/// Join non-empty SQL pieces with single spaces.
pub(crate) fn join_parts<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
