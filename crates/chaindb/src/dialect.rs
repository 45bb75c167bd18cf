//! Per-dialect capability records.
//!
//! One compiler serves every relational target; a [`Dialect`] supplies the few
//! things that actually differ: the placeholder token, identifier quoting and
//! the pagination strategy.

use crate::error::ChainError;
use std::fmt;
use std::str::FromStr;

/// Supported SQL engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialectKind {
    MySql,
    Postgres,
    SqlServer,
    Sqlite,
}

impl DialectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DialectKind::MySql => "mysql",
            DialectKind::Postgres => "postgresql",
            DialectKind::SqlServer => "sqlserver",
            DialectKind::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DialectKind {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(DialectKind::MySql),
            "postgresql" | "postgres" | "pg" => Ok(DialectKind::Postgres),
            "sqlserver" | "mssql" => Ok(DialectKind::SqlServer),
            "sqlite" => Ok(DialectKind::Sqlite),
            other => Err(ChainError::config(format!("unknown database driver type '{other}'"))),
        }
    }
}

/// Parameter marker expected by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?`
    Question,
    /// `%s`
    Format,
    /// `$1, $2, ...`
    Numbered,
    /// `@P1, @P2, ...`
    AtP,
}

impl PlaceholderStyle {
    /// Render the placeholder for the 1-based parameter `index`.
    pub fn render(self, index: usize) -> String {
        match self {
            PlaceholderStyle::Question => "?".to_string(),
            PlaceholderStyle::Format => "%s".to_string(),
            PlaceholderStyle::Numbered => format!("${index}"),
            PlaceholderStyle::AtP => format!("@P{index}"),
        }
    }
}

/// Identifier quote pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub open: char,
    pub close: char,
}

impl Quote {
    pub const fn same(c: char) -> Self {
        Self { open: c, close: c }
    }

    pub fn wrap(self, ident: &str) -> String {
        format!("{}{}{}", self.open, ident, self.close)
    }

    /// Whether `s` already contains quoting.
    pub fn appears_in(self, s: &str) -> bool {
        s.contains(self.open) || s.contains(self.close)
    }
}

/// How LIMIT/OFFSET are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// `LIMIT n` / `LIMIT m,n`
    LimitComma,
    /// `LIMIT n` / `LIMIT n OFFSET m`
    LimitOffset,
    /// `SELECT TOP ...` with a `pk NOT IN (SELECT TOP ...)` row exclusion.
    TopNotIn,
}

/// Capability record consumed by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub kind: DialectKind,
    pub placeholder: PlaceholderStyle,
    pub quote: Quote,
    pub pagination: Pagination,
    pub begin: &'static str,
}

impl Dialect {
    pub const fn mysql() -> Self {
        Self {
            kind: DialectKind::MySql,
            placeholder: PlaceholderStyle::Question,
            quote: Quote::same('`'),
            pagination: Pagination::LimitComma,
            begin: "BEGIN",
        }
    }

    pub const fn postgres() -> Self {
        Self {
            kind: DialectKind::Postgres,
            placeholder: PlaceholderStyle::Numbered,
            quote: Quote::same('"'),
            pagination: Pagination::LimitOffset,
            begin: "BEGIN",
        }
    }

    pub const fn sqlite() -> Self {
        Self {
            kind: DialectKind::Sqlite,
            placeholder: PlaceholderStyle::Question,
            quote: Quote::same('"'),
            pagination: Pagination::LimitOffset,
            begin: "BEGIN",
        }
    }

    pub const fn sqlserver() -> Self {
        Self {
            kind: DialectKind::SqlServer,
            placeholder: PlaceholderStyle::AtP,
            quote: Quote {
                open: '[',
                close: ']',
            },
            pagination: Pagination::TopNotIn,
            begin: "BEGIN TRANSACTION",
        }
    }

    /// Default capability record for `kind`.
    pub const fn of(kind: DialectKind) -> Self {
        match kind {
            DialectKind::MySql => Self::mysql(),
            DialectKind::Postgres => Self::postgres(),
            DialectKind::SqlServer => Self::sqlserver(),
            DialectKind::Sqlite => Self::sqlite(),
        }
    }

    /// Override the placeholder style (e.g. `%s` for format-style drivers).
    pub fn with_placeholder(mut self, placeholder: PlaceholderStyle) -> Self {
        self.placeholder = placeholder;
        self
    }

    /// Override identifier quoting.
    pub fn with_quote(mut self, quote: Quote) -> Self {
        self.quote = quote;
        self
    }

    /// Override the pagination strategy.
    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    /// Statement used to read one row for column discovery.
    pub fn fields_probe_sql(&self, table: &str) -> String {
        match self.pagination {
            Pagination::TopNotIn => format!("SELECT TOP 1 * FROM {table}"),
            _ => format!("SELECT * FROM {table} LIMIT 1"),
        }
    }
}

impl FromStr for Dialect {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<DialectKind>().map(Dialect::of)
    }
}

impl From<DialectKind> for Dialect {
    fn from(kind: DialectKind) -> Self {
        Dialect::of(kind)
    }
}
