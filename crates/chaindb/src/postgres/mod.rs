//! Bundled PostgreSQL executor.
//!
//! [`Executor`] is implemented for `tokio_postgres::Client` and
//! `tokio_postgres::Transaction`, and with the `pool` feature for
//! `deadpool_postgres::Client` and `deadpool_postgres::Pool` (one checkout
//! per call). Every statement is prepared first so column names are known
//! even for empty results.

mod types;

use types::param_refs;

use crate::dialect::Dialect;
use crate::error::{ChainError, ChainResult};
use crate::executor::{ExecDetail, Executor, QueryDetail};
use crate::value::Value;
use std::sync::Arc;
use tokio_postgres::{Row, Statement};

fn decode_rows(sql: &str, stmt: &Statement, rows: Vec<Row>) -> ChainResult<QueryDetail> {
    let column_names: Vec<String> = stmt.columns().iter().map(|c| c.name().to_string()).collect();
    let shared: Arc<[String]> = column_names.clone().into();
    let rows = rows
        .iter()
        .map(|row| types::decode_row(&shared, row))
        .collect::<ChainResult<Vec<_>>>()?;
    Ok(QueryDetail {
        rows,
        column_names,
        executed_sql: sql.to_string(),
    })
}

/// `Client` and `Transaction` expose the same inherent query API.
macro_rules! impl_pg_executor {
    ($ty:ty) => {
        impl Executor for $ty {
            fn dialect(&self) -> Dialect {
                Dialect::postgres()
            }

            async fn query_with_detail(&self, sql: &str, params: &[Value]) -> ChainResult<QueryDetail> {
                let stmt = self.prepare(sql).await.map_err(ChainError::from_db_error)?;
                let rows = self
                    .query(&stmt, &param_refs(params))
                    .await
                    .map_err(ChainError::from_db_error)?;
                decode_rows(sql, &stmt, rows)
            }

            async fn execute_with_detail(&self, sql: &str, params: &[Value]) -> ChainResult<ExecDetail> {
                let rows_affected = self
                    .execute(sql, &param_refs(params))
                    .await
                    .map_err(ChainError::from_db_error)?;
                Ok(ExecDetail {
                    last_insert_id: None,
                    rows_affected,
                    executed_sql: sql.to_string(),
                })
            }

            async fn execute_many_with_detail(
                &self,
                sql: &str,
                param_sets: &[Vec<Value>],
            ) -> ChainResult<ExecDetail> {
                let stmt = self.prepare(sql).await.map_err(ChainError::from_db_error)?;
                let mut rows_affected = 0;
                for params in param_sets {
                    rows_affected += self
                        .execute(&stmt, &param_refs(params))
                        .await
                        .map_err(ChainError::from_db_error)?;
                }
                Ok(ExecDetail {
                    last_insert_id: None,
                    rows_affected,
                    executed_sql: sql.to_string(),
                })
            }
        }
    };
}

impl_pg_executor!(tokio_postgres::Client);
impl_pg_executor!(tokio_postgres::Transaction<'_>);

#[cfg(feature = "pool")]
impl Executor for deadpool_postgres::Client {
    fn dialect(&self) -> Dialect {
        Dialect::postgres()
    }

    async fn query_with_detail(&self, sql: &str, params: &[Value]) -> ChainResult<QueryDetail> {
        // Delegate to the deref target (tokio_postgres::Client).
        let client: &tokio_postgres::Client = self;
        client.query_with_detail(sql, params).await
    }

    async fn execute_with_detail(&self, sql: &str, params: &[Value]) -> ChainResult<ExecDetail> {
        let client: &tokio_postgres::Client = self;
        client.execute_with_detail(sql, params).await
    }

    async fn execute_many_with_detail(
        &self,
        sql: &str,
        param_sets: &[Vec<Value>],
    ) -> ChainResult<ExecDetail> {
        let client: &tokio_postgres::Client = self;
        client.execute_many_with_detail(sql, param_sets).await
    }
}

#[cfg(feature = "pool")]
impl Executor for deadpool_postgres::Pool {
    fn dialect(&self) -> Dialect {
        Dialect::postgres()
    }

    async fn query_with_detail(&self, sql: &str, params: &[Value]) -> ChainResult<QueryDetail> {
        let client = self.get().await?;
        client.query_with_detail(sql, params).await
    }

    async fn execute_with_detail(&self, sql: &str, params: &[Value]) -> ChainResult<ExecDetail> {
        let client = self.get().await?;
        client.execute_with_detail(sql, params).await
    }

    /// All sets run on one checked-out connection.
    async fn execute_many_with_detail(
        &self,
        sql: &str,
        param_sets: &[Vec<Value>],
    ) -> ChainResult<ExecDetail> {
        let client = self.get().await?;
        client.execute_many_with_detail(sql, param_sets).await
    }
}
