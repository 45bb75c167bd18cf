//! Builder and pool configuration.
//!
//! Everything here has working defaults; a TOML file only needs the keys it
//! changes:
//!
//! ```toml
//! table_name_prefix = "app_"
//! strict = true
//!
//! [primary_keys]
//! app_users = "id"
//!
//! [sql_log]
//! level = "info"
//! max_sql_length = 500
//! ```

use crate::error::{ChainError, ChainResult};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use tracing::Level;

/// Behaviour switches shared by every builder created from the same config.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Prefix added to table names that do not already carry it.
    pub table_name_prefix: String,
    /// Refuse DELETE statements without a WHERE condition.
    pub strict: bool,
    /// Remember column names returned by `get_fields_name` per table.
    pub cache_fields_name: bool,
    /// Primary key per (prefixed) table, used by TOP/NOT IN pagination.
    pub primary_keys: HashMap<String, String>,
    pub sql_log: SqlLogConfig,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            table_name_prefix: String::new(),
            strict: true,
            cache_fields_name: true,
            primary_keys: HashMap::new(),
            sql_log: SqlLogConfig::default(),
        }
    }
}

impl ChainConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> ChainResult<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn with_table_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_name_prefix = prefix.into();
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_cache_fields_name(mut self, cache: bool) -> Self {
        self.cache_fields_name = cache;
        self
    }

    pub fn with_primary_key(mut self, table: impl Into<String>, pk: impl Into<String>) -> Self {
        self.primary_keys.insert(table.into(), pk.into());
        self
    }

    pub fn with_sql_log(mut self, sql_log: SqlLogConfig) -> Self {
        self.sql_log = sql_log;
        self
    }
}

/// SQL event logging.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SqlLogConfig {
    /// Tracing level of the per-statement event.
    #[serde(deserialize_with = "deserialize_level")]
    pub level: Level,
    /// Truncate logged SQL to this many bytes. `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for SqlLogConfig {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(200),
        }
    }
}

impl SqlLogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }
}

fn deserialize_level<'de, D: Deserializer<'de>>(d: D) -> Result<Level, D::Error> {
    let s = String::deserialize(d)?;
    s.parse::<Level>()
        .map_err(|_| serde::de::Error::custom(format!("invalid log level '{s}'")))
}

/// Connection pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PoolConfig {
    pub database_url: String,
    #[serde(default = "default_max_size")]
    pub max_size: usize,
}

fn default_max_size() -> usize {
    16
}

impl PoolConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_size: default_max_size(),
        }
    }

    pub fn from_toml_str(s: &str) -> ChainResult<Self> {
        let config: Self = toml::from_str(s)?;
        if config.database_url.trim().is_empty() {
            return Err(ChainError::config("database_url must not be empty"));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_strict_and_cached() {
        let c = ChainConfig::default();
        assert!(c.strict);
        assert!(c.cache_fields_name);
        assert_eq!(c.sql_log.level, Level::DEBUG);
        assert_eq!(c.sql_log.max_sql_length, Some(200));
    }

    #[test]
    fn toml_overrides_only_given_keys() {
        let c = ChainConfig::from_toml_str(
            r#"
            table_name_prefix = "app_"
            strict = false

            [primary_keys]
            app_users = "uid"

            [sql_log]
            level = "info"
            "#,
        )
        .unwrap();
        assert_eq!(c.table_name_prefix, "app_");
        assert!(!c.strict);
        assert!(c.cache_fields_name);
        assert_eq!(c.primary_keys.get("app_users").map(String::as_str), Some("uid"));
        assert_eq!(c.sql_log.level, Level::INFO);
        assert_eq!(c.sql_log.max_sql_length, Some(200));
    }

    #[test]
    fn bad_level_is_a_config_error() {
        let err = ChainConfig::from_toml_str("[sql_log]\nlevel = \"loud\"").unwrap_err();
        assert!(matches!(err, ChainError::Config(_)));
    }

    #[test]
    fn pool_config_defaults_max_size() {
        let p = PoolConfig::from_toml_str(r#"database_url = "postgres://localhost/db""#).unwrap();
        assert_eq!(p.max_size, 16);
        assert!(PoolConfig::from_toml_str(r#"database_url = """#).is_err());
    }
}
