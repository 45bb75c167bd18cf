//! LIMIT/OFFSET strategies.
//!
//! `LimitComma` and `LimitOffset` only add a trailing fragment. `TopNotIn`
//! (SQL Server without OFFSET) rewrites the statement head with `TOP` and
//! excludes the leading rows through a primary-key subquery that is folded
//! into the WHERE clause.

use crate::condition::{Condition, Limit};
use crate::dialect::{Dialect, DialectKind, Pagination};
use crate::error::CompileError;

/// MySQL's documented "all remaining rows" count for `LIMIT offset, count`.
const MYSQL_ALL_ROWS: u64 = u64::MAX;

/// Pagination pieces for one SELECT.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paging {
    /// `TOP n` placed right after `SELECT`.
    pub top: Option<String>,
    /// Row-exclusion predicate, AND-ed in front of the WHERE body.
    pub exclusion: Option<String>,
    /// Trailing `LIMIT ...` fragment.
    pub tail: String,
}

impl Paging {
    /// Fold the compiled WHERE body into the exclusion predicate.
    ///
    /// The body is consumed; the result is the full WHERE body to emit.
    pub fn fold_where(&self, body: Option<String>) -> Option<String> {
        match (self.exclusion.as_deref(), body) {
            (Some(excl), Some(body)) => Some(format!("{excl} AND ({body})")),
            (Some(excl), None) => Some(excl.to_string()),
            (None, body) => body,
        }
    }
}

/// Plan pagination for `cond` under `dialect`.
pub fn plan(cond: &Condition, dialect: &Dialect) -> Result<Paging, CompileError> {
    let offset = cond.offset().filter(|o| *o > 0);
    let limit = cond.limit();

    // `limit(0)` disables pagination entirely.
    if limit.is_some_and(Limit::is_unbounded) {
        return Ok(Paging::default());
    }

    match dialect.pagination {
        Pagination::LimitComma => Ok(Paging {
            tail: limit_comma(limit, offset),
            ..Paging::default()
        }),
        Pagination::LimitOffset => Ok(Paging {
            tail: limit_offset(limit, offset, dialect.kind),
            ..Paging::default()
        }),
        Pagination::TopNotIn => top_not_in(cond, limit, offset),
    }
}

fn limit_comma(limit: Option<Limit>, offset: Option<u64>) -> String {
    match (limit, offset) {
        (Some(Limit::Pair(m, n)), _) => format!("LIMIT {m},{n}"),
        (Some(Limit::Count(n)), Some(o)) => format!("LIMIT {o}, {n}"),
        (Some(Limit::Count(n)), None) => format!("LIMIT {n}"),
        (None, Some(o)) => format!("LIMIT {o}, {MYSQL_ALL_ROWS}"),
        (None, None) => String::new(),
    }
}

fn limit_offset(limit: Option<Limit>, offset: Option<u64>, kind: DialectKind) -> String {
    match (limit, offset) {
        (Some(Limit::Pair(m, n)), _) => format!("LIMIT {n} OFFSET {m}"),
        (Some(Limit::Count(n)), Some(o)) => format!("LIMIT {n} OFFSET {o}"),
        (Some(Limit::Count(n)), None) => format!("LIMIT {n}"),
        // SQLite only accepts OFFSET after a LIMIT.
        (None, Some(o)) if kind == DialectKind::Sqlite => format!("LIMIT -1 OFFSET {o}"),
        (None, Some(o)) => format!("OFFSET {o}"),
        (None, None) => String::new(),
    }
}

fn top_not_in(
    cond: &Condition,
    limit: Option<Limit>,
    offset: Option<u64>,
) -> Result<Paging, CompileError> {
    let table = cond.table();
    let pk = || {
        cond.primary_key()
            .ok_or_else(|| CompileError::MissingPrimaryKey {
                table: table.to_string(),
            })
    };

    let paging = match (limit, offset) {
        // Rows m..=n (1-based): skip the first m-1, take n-m+1. Arithmetic is
        // left to the server, so a range it would see as a negative TOP is refused.
        (Some(Limit::Pair(m, n)), _) => {
            if m == 0 || n.saturating_add(1) < m {
                return Err(CompileError::InvalidLimit(format!("{m},{n}")));
            }
            let pk = pk()?;
            Paging {
                top: Some(format!("TOP ({n}-{m}+1)")),
                exclusion: Some(format!("{pk} NOT IN (SELECT TOP {m}-1 {pk} FROM {table})")),
                tail: String::new(),
            }
        }
        (Some(Limit::Count(n)), Some(o)) => {
            let pk = pk()?;
            Paging {
                top: Some(format!("TOP {n}")),
                exclusion: Some(format!("{pk} NOT IN (SELECT TOP {o} {pk} FROM {table})")),
                tail: String::new(),
            }
        }
        (Some(Limit::Count(n)), None) => Paging {
            top: Some(format!("TOP {n}")),
            ..Paging::default()
        },
        (None, Some(o)) => {
            let pk = pk()?;
            Paging {
                exclusion: Some(format!("{pk} NOT IN (SELECT TOP {o} {pk} FROM {table})")),
                ..Paging::default()
            }
        }
        (None, None) => Paging::default(),
    };
    Ok(paging)
}
