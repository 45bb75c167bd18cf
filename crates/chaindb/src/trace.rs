//! `tracing` events for executed statements.
//!
//! - `chaindb.sql`: one event per statement, before it reaches the executor
//! - `chaindb.guard`: WARN when a safety guard refuses a statement
//! - `chaindb.exec`: ERROR when the executor fails

use crate::config::SqlLogConfig;
use crate::dialect::DialectKind;
use crate::error::{ChainError, GuardViolation};
use tracing::Level;

/// The kind of statement being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    /// Transaction control, DDL and anything else.
    Other,
}

impl StatementKind {
    /// Classify caller-written SQL by its first keyword.
    pub fn from_sql(sql: &str) -> Self {
        let head = sql
            .trim_start()
            .split(|c: char| c.is_whitespace() || c == '(')
            .next()
            .unwrap_or_default();
        if head.eq_ignore_ascii_case("SELECT") {
            StatementKind::Select
        } else if head.eq_ignore_ascii_case("INSERT") {
            StatementKind::Insert
        } else if head.eq_ignore_ascii_case("UPDATE") {
            StatementKind::Update
        } else if head.eq_ignore_ascii_case("DELETE") {
            StatementKind::Delete
        } else {
            StatementKind::Other
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatementKind::Select => "select",
            StatementKind::Insert => "insert",
            StatementKind::Update => "update",
            StatementKind::Delete => "delete",
            StatementKind::Other => "other",
        }
    }
}

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

fn truncate_sql(config: &SqlLogConfig, sql: &str) -> String {
    match config.max_sql_length {
        Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
        _ => sql.to_string(),
    }
}

/// Emit the per-statement event at the configured level.
pub(crate) fn log_sql(
    config: &SqlLogConfig,
    dialect: DialectKind,
    kind: StatementKind,
    sql: &str,
    param_count: usize,
) {
    macro_rules! emit_at_level {
        ($level:expr, $($field:tt)*) => {
            match $level {
                Level::ERROR => tracing::error!($($field)*),
                Level::WARN  => tracing::warn!($($field)*),
                Level::INFO  => tracing::info!($($field)*),
                Level::DEBUG => tracing::debug!($($field)*),
                Level::TRACE => tracing::trace!($($field)*),
            }
        };
    }

    let sql = truncate_sql(config, sql);
    emit_at_level!(
        config.level,
        target: "chaindb.sql",
        dialect = dialect.as_str(),
        kind = kind.as_str(),
        param_count,
        sql = %sql,
        "statement"
    );
}

pub(crate) fn log_refusal(violation: &GuardViolation) {
    tracing::warn!(target: "chaindb.guard", %violation, "statement refused");
}

pub(crate) fn log_failure(config: &SqlLogConfig, kind: StatementKind, sql: &str, err: &ChainError) {
    let sql = truncate_sql(config, sql);
    tracing::error!(target: "chaindb.exec", kind = kind.as_str(), sql = %sql, error = %err, "statement failed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_sql_bytes("SELECT 1", 100), "SELECT 1");
        assert_eq!(truncate_sql_bytes("SELECT 1", 6), "SELECT");
        // 'é' is two bytes; cutting inside it backs off to the boundary.
        assert_eq!(truncate_sql_bytes("aé", 2), "a");
    }

    #[test]
    fn truncated_sql_is_marked() {
        let config = SqlLogConfig::new().max_sql_length(6);
        assert_eq!(truncate_sql(&config, "SELECT * FROM t"), "SELECT...");
        assert_eq!(truncate_sql(&config.no_truncate(), "SELECT * FROM t"), "SELECT * FROM t");
    }

    #[test]
    fn classifies_by_first_keyword() {
        assert_eq!(StatementKind::from_sql("  select 1"), StatementKind::Select);
        assert_eq!(StatementKind::from_sql("INSERT INTO t VALUES (1)"), StatementKind::Insert);
        assert_eq!(StatementKind::from_sql("update t set a=1"), StatementKind::Update);
        assert_eq!(StatementKind::from_sql("DELETE FROM t"), StatementKind::Delete);
        assert_eq!(StatementKind::from_sql("BEGIN"), StatementKind::Other);
    }
}
