//! Accumulated query intent for one builder.
//!
//! A [`Condition`] collects the table, where-predicate, ordering, grouping,
//! pagination and join of the query being built. Terminal calls compile it and
//! then [`reset`](Condition::reset) it; only the table binding survives.

use crate::error::CompileError;
use crate::predicate::{WhereClause, WherePredicate};

/// Pagination bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// `limit(n)`; `0` means "no limit".
    Count(u64),
    /// Legacy `"m,n"` form. MySQL/PostgreSQL/SQLite read it as offset `m`,
    /// count `n`; SQL Server reads it as the 1-based row range `m..=n`.
    Pair(u64, u64),
}

impl Limit {
    /// `true` for the `limit(0)` sentinel.
    pub fn is_unbounded(self) -> bool {
        matches!(self, Limit::Count(0))
    }
}

/// Conversion accepted by `limit(...)`.
pub trait IntoLimit {
    fn into_limit(self) -> Result<Limit, CompileError>;
}

impl IntoLimit for Limit {
    fn into_limit(self) -> Result<Limit, CompileError> {
        Ok(self)
    }
}

impl IntoLimit for u64 {
    fn into_limit(self) -> Result<Limit, CompileError> {
        Ok(Limit::Count(self))
    }
}

impl IntoLimit for u32 {
    fn into_limit(self) -> Result<Limit, CompileError> {
        Ok(Limit::Count(u64::from(self)))
    }
}

impl IntoLimit for i32 {
    fn into_limit(self) -> Result<Limit, CompileError> {
        u64::try_from(self)
            .map(Limit::Count)
            .map_err(|_| CompileError::InvalidLimit(self.to_string()))
    }
}

impl IntoLimit for i64 {
    fn into_limit(self) -> Result<Limit, CompileError> {
        u64::try_from(self)
            .map(Limit::Count)
            .map_err(|_| CompileError::InvalidLimit(self.to_string()))
    }
}

impl IntoLimit for (u64, u64) {
    fn into_limit(self) -> Result<Limit, CompileError> {
        Ok(Limit::Pair(self.0, self.1))
    }
}

impl IntoLimit for &str {
    fn into_limit(self) -> Result<Limit, CompileError> {
        let parse = |s: &str| {
            s.trim()
                .parse::<u64>()
                .map_err(|_| CompileError::InvalidLimit(self.to_string()))
        };
        match self.split_once(',') {
            Some((m, n)) => Ok(Limit::Pair(parse(m)?, parse(n)?)),
            None => parse(self).map(Limit::Count),
        }
    }
}

impl IntoLimit for String {
    fn into_limit(self) -> Result<Limit, CompileError> {
        self.as_str().into_limit()
    }
}

/// Join flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    pub fn keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
        }
    }
}

/// Mutable, single-owner query state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Condition {
    pub(crate) table: String,
    pub(crate) primary_key: Option<String>,
    pub(crate) where_: WherePredicate,
    pub(crate) order_by: String,
    pub(crate) group_by: String,
    pub(crate) limit: Option<Limit>,
    pub(crate) offset: Option<u64>,
    pub(crate) inner_join: Option<String>,
    pub(crate) left_join: Option<String>,
    pub(crate) right_join: Option<String>,
    pub(crate) on: String,
}

impl Condition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a condition bound to `table`.
    pub fn for_table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn set_table(&mut self, table: impl Into<String>) -> &mut Self {
        self.table = table.into();
        self
    }

    /// Primary key used by TOP/NOT IN pagination.
    pub fn set_primary_key(&mut self, pk: impl Into<String>) -> &mut Self {
        let pk = pk.into();
        self.primary_key = (!pk.is_empty()).then_some(pk);
        self
    }

    pub fn set_where(&mut self, predicate: impl Into<WherePredicate>) -> &mut Self {
        self.where_ = predicate.into();
        self
    }

    pub fn push_where(&mut self, clause: WhereClause) -> &mut Self {
        self.where_.push(clause);
        self
    }

    pub fn set_order_by(&mut self, expr: impl Into<String>) -> &mut Self {
        self.order_by = expr.into();
        self
    }

    pub fn set_group_by(&mut self, expr: impl Into<String>) -> &mut Self {
        self.group_by = expr.into();
        self
    }

    pub fn set_limit(&mut self, limit: Limit) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn set_offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    /// Record a join target. Each kind has its own slot; when several are set
    /// the compiler uses the first of inner, left, right.
    pub fn set_join(&mut self, kind: JoinKind, table: impl Into<String>) -> &mut Self {
        let table = Some(table.into());
        match kind {
            JoinKind::Inner => self.inner_join = table,
            JoinKind::Left => self.left_join = table,
            JoinKind::Right => self.right_join = table,
        }
        self
    }

    pub fn set_on(&mut self, expr: impl Into<String>) -> &mut Self {
        self.on = expr.into();
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    pub fn where_predicate(&self) -> &WherePredicate {
        &self.where_
    }

    pub fn order_by(&self) -> &str {
        &self.order_by
    }

    pub fn group_by(&self) -> &str {
        &self.group_by
    }

    pub fn limit(&self) -> Option<Limit> {
        self.limit
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn on(&self) -> &str {
        &self.on
    }

    /// The join that will be compiled, honouring inner > left > right.
    pub fn active_join(&self) -> Option<(JoinKind, &str)> {
        self.inner_join
            .as_deref()
            .map(|t| (JoinKind::Inner, t))
            .or_else(|| self.left_join.as_deref().map(|t| (JoinKind::Left, t)))
            .or_else(|| self.right_join.as_deref().map(|t| (JoinKind::Right, t)))
    }

    /// Clear everything except the table binding (table name and primary key).
    pub fn reset(&mut self) {
        *self = Self {
            table: std::mem::take(&mut self.table),
            primary_key: self.primary_key.take(),
            ..Self::default()
        };
    }

    /// Whether every field other than the table binding holds its zero value.
    pub fn is_pristine(&self) -> bool {
        let mut probe = self.clone();
        probe.reset();
        probe == *self
    }
}
