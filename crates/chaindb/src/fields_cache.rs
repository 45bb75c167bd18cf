//! Per-table column name cache shared by builders on the same connection.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Cheaply clonable handle; clones share one map.
#[derive(Debug, Clone, Default)]
pub struct FieldsCache {
    inner: Arc<RwLock<HashMap<String, Arc<[String]>>>>,
}

impl FieldsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, table: &str) -> Option<Arc<[String]>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(table)
            .cloned()
    }

    /// Store the columns of `table`, replacing any previous entry.
    pub fn insert(&self, table: impl Into<String>, columns: Arc<[String]>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(table.into(), columns);
    }

    /// Forget `table`, e.g. after a schema change.
    pub fn invalidate(&self, table: &str) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(table);
    }

    pub fn clear(&self) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
