//! Error types for chaindb

use thiserror::Error;

/// Result type alias for chaindb operations
pub type ChainResult<T> = Result<T, ChainError>;

/// Errors raised while turning a [`Condition`](crate::Condition) into SQL.
///
/// Compile errors are always reported before anything reaches the executor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A where-clause failed validation.
    #[error("invalid where clause #{index} ('{field}'): {reason}")]
    InvalidClause {
        index: usize,
        field: String,
        reason: String,
    },

    /// An operator string that the where compiler does not know.
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    /// A terminal call that needs a table was issued without one.
    #[error("no table selected; call table() first")]
    MissingTable,

    /// SQL Server pagination requires a primary key for the row-exclusion subquery.
    #[error("table '{table}' has no primary key configured; required for TOP/NOT IN pagination")]
    MissingPrimaryKey { table: String },

    /// INSERT/UPDATE called with nothing to write.
    #[error("{0}: no values given")]
    EmptyData(&'static str),

    /// A row of a batch insert does not share the shape of the first row.
    #[error("insert_many row #{row} does not match the columns of row #0")]
    InconsistentRow { row: usize },

    /// Unparseable or negative LIMIT/OFFSET input.
    #[error("invalid limit '{0}'")]
    InvalidLimit(String),

    /// Non-numeric or non-finite increment step.
    #[error("invalid step '{0}'")]
    InvalidStep(String),

    /// A raw expression received more arguments than it has `?` markers.
    #[error("raw expression '{template}' has {markers} '?' markers but {args} arguments")]
    RawArity {
        template: String,
        markers: usize,
        args: usize,
    },
}

impl CompileError {
    /// Create an invalid-clause error for the clause at `index`.
    pub fn clause(index: usize, field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidClause {
            index,
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Error types for database operations
#[derive(Debug, Error)]
pub enum ChainError {
    /// The query could not be compiled
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[cfg(feature = "postgres")]
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Execution error reported by a non-postgres executor
    #[error("Execution error: {0}")]
    Execution(String),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Query timeout error
    #[error("Query timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl ChainError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    /// Check if this error was raised before any I/O happened
    pub fn is_compile(&self) -> bool {
        matches!(self, Self::Compile(_))
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Parse a tokio_postgres error into a more specific ChainError
    #[cfg(feature = "postgres")]
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        Self::Query(err)
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for ChainError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// A safety guard refused to run a statement.
///
/// Guards are not errors: the terminal call returns normally so batch callers can
/// branch on the refusal without unwinding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardViolation {
    /// DELETE without WHERE while the builder is in strict mode.
    DeleteWithoutWhere { table: String },
}

impl std::fmt::Display for GuardViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardViolation::DeleteWithoutWhere { table } => {
                write!(f, "refusing DELETE FROM {table} without a WHERE condition")
            }
        }
    }
}
