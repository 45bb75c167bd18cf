//! Convenient imports for typical `chaindb` usage.
//!
//! ```ignore
//! use chaindb::prelude::*;
//! ```

pub use crate::{
    ChainConfig, ChainDb, ChainError, ChainResult, Data, DeleteOutcome, Dialect, Executor,
    InsertData, Record, Value, WhereClause, raw, raw_bind, raw_with,
};

#[cfg(feature = "pool")]
pub use crate::{create_pool, create_pool_with_config};
