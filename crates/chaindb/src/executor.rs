//! The connection seam.
//!
//! The compiler never talks to a database. Terminal builder calls hand the
//! compiled SQL and parameters to an [`Executor`], which owns the connection
//! (or pool) and reports rows or affected-row counts back.

use crate::dialect::Dialect;
use crate::error::{ChainError, ChainResult};
use crate::record::Record;
use crate::value::Value;
use std::sync::Arc;
use std::time::Duration;

/// Rows returned by a read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryDetail {
    pub rows: Vec<Record>,
    pub column_names: Vec<String>,
    /// The statement text as the driver received it.
    pub executed_sql: String,
}

/// Outcome of a write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecDetail {
    /// Auto-increment id of the last inserted row, where the driver reports one.
    pub last_insert_id: Option<i64>,
    pub rows_affected: u64,
    pub executed_sql: String,
}

/// A database connection that can run compiled statements.
///
/// Implementations exist for `tokio_postgres` clients and transactions and
/// for `deadpool_postgres` clients and pools. Other drivers plug in by
/// implementing this trait and reporting the matching [`Dialect`].
pub trait Executor: Send + Sync {
    /// Dialect the compiler should target for this connection.
    fn dialect(&self) -> Dialect;

    /// Run a statement that returns rows.
    fn query_with_detail(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = ChainResult<QueryDetail>> + Send;

    /// Run a statement that returns no rows.
    fn execute_with_detail(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = ChainResult<ExecDetail>> + Send;

    /// Run one statement once per parameter set.
    ///
    /// `rows_affected` is the sum over all sets.
    fn execute_many_with_detail(
        &self,
        sql: &str,
        param_sets: &[Vec<Value>],
    ) -> impl std::future::Future<Output = ChainResult<ExecDetail>> + Send;

    /// Primary key of `table`, when the connection knows it.
    ///
    /// Consulted only for TOP/NOT IN pagination when no key was configured.
    fn primary_key(&self, table: &str) -> Option<String> {
        let _ = table;
        None
    }
}

impl<E: Executor> Executor for &E {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    async fn query_with_detail(&self, sql: &str, params: &[Value]) -> ChainResult<QueryDetail> {
        (**self).query_with_detail(sql, params).await
    }

    async fn execute_with_detail(&self, sql: &str, params: &[Value]) -> ChainResult<ExecDetail> {
        (**self).execute_with_detail(sql, params).await
    }

    async fn execute_many_with_detail(
        &self,
        sql: &str,
        param_sets: &[Vec<Value>],
    ) -> ChainResult<ExecDetail> {
        (**self).execute_many_with_detail(sql, param_sets).await
    }

    fn primary_key(&self, table: &str) -> Option<String> {
        (**self).primary_key(table)
    }
}

impl<E: Executor> Executor for Arc<E> {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    async fn query_with_detail(&self, sql: &str, params: &[Value]) -> ChainResult<QueryDetail> {
        (**self).query_with_detail(sql, params).await
    }

    async fn execute_with_detail(&self, sql: &str, params: &[Value]) -> ChainResult<ExecDetail> {
        (**self).execute_with_detail(sql, params).await
    }

    async fn execute_many_with_detail(
        &self,
        sql: &str,
        param_sets: &[Vec<Value>],
    ) -> ChainResult<ExecDetail> {
        (**self).execute_many_with_detail(sql, param_sets).await
    }

    fn primary_key(&self, table: &str) -> Option<String> {
        (**self).primary_key(table)
    }
}

/// Executor wrapper that fails calls running longer than a fixed budget.
///
/// The timed-out call is dropped; whether the server stops working on it
/// depends on the driver.
#[derive(Debug, Clone)]
pub struct WithTimeout<E> {
    inner: E,
    timeout: Duration,
}

impl<E: Executor> WithTimeout<E> {
    pub fn new(inner: E, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn run<T>(&self, future: impl std::future::Future<Output = ChainResult<T>>) -> ChainResult<T> {
        tokio::time::timeout(self.timeout, future)
            .await
            .map_err(|_| ChainError::Timeout(self.timeout))?
    }
}

impl<E: Executor> Executor for WithTimeout<E> {
    fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }

    async fn query_with_detail(&self, sql: &str, params: &[Value]) -> ChainResult<QueryDetail> {
        self.run(self.inner.query_with_detail(sql, params)).await
    }

    async fn execute_with_detail(&self, sql: &str, params: &[Value]) -> ChainResult<ExecDetail> {
        self.run(self.inner.execute_with_detail(sql, params)).await
    }

    async fn execute_many_with_detail(
        &self,
        sql: &str,
        param_sets: &[Vec<Value>],
    ) -> ChainResult<ExecDetail> {
        self.run(self.inner.execute_many_with_detail(sql, param_sets)).await
    }

    fn primary_key(&self, table: &str) -> Option<String> {
        self.inner.primary_key(table)
    }
}
