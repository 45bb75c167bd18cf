//! The chainable builder.
//!
//! A [`ChainDb`] accumulates one query at a time: chain methods mutate its
//! [`Condition`], a terminal method compiles it, hands the statement to the
//! [`Executor`] and resets the condition. The table binding survives the
//! reset so consecutive queries on one table need no repeated `table()`.
//!
//! ```ignore
//! let mut db = ChainDb::new(&client);
//! let rows = db
//!     .table("users")
//!     .filter(vec![WhereClause::eq("status", 1), WhereClause::lt("age", 30).or()])
//!     .order_by("id DESC")
//!     .limit(10)
//!     .select("id,name")
//!     .await?;
//! ```
//!
//! A builder is single-owner state. Concurrent tasks should each [`fork`](ChainDb::fork)
//! their own builder; forks share the executor and the column name cache.

use crate::compile::{self, CompiledBatch, CompiledQuery, Fields};
use crate::condition::{Condition, IntoLimit, JoinKind, Limit};
use crate::config::ChainConfig;
use crate::data::{Data, InsertData};
use crate::dialect::{Dialect, Pagination};
use crate::error::{ChainError, ChainResult, CompileError, GuardViolation};
use crate::executor::{ExecDetail, Executor, QueryDetail};
use crate::fields_cache::FieldsCache;
use crate::predicate::{WhereClause, WherePredicate};
use crate::record::Record;
use crate::trace::{self, StatementKind};
use crate::value::{Step, Value};
use std::sync::Arc;

/// Marker replaced by the table prefix inside join targets and `on()` expressions.
pub const PREFIX_MARKER: &str = "###";

/// Where a builder is in its query lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Chain methods are accumulating a query.
    Building,
    /// A terminal call compiled the query and has not finished yet.
    Compiled,
    /// The last terminal call finished; only the table binding is kept.
    Reset,
}

/// Result of [`ChainDb::delete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted(ExecDetail),
    /// A guard refused the statement; nothing was sent.
    Refused(GuardViolation),
}

impl DeleteOutcome {
    pub fn is_refused(&self) -> bool {
        matches!(self, DeleteOutcome::Refused(_))
    }

    /// Rows removed; `0` when refused.
    pub fn rows_affected(&self) -> u64 {
        match self {
            DeleteOutcome::Deleted(detail) => detail.rows_affected,
            DeleteOutcome::Refused(_) => 0,
        }
    }
}

/// Chainable query builder bound to one executor.
pub struct ChainDb<E> {
    executor: E,
    dialect: Dialect,
    config: Arc<ChainConfig>,
    fields_cache: FieldsCache,
    condition: Condition,
    phase: Phase,
    deferred: Option<CompileError>,
    last_query: Option<String>,
}

impl<E: Executor> ChainDb<E> {
    /// Builder with the default configuration and the executor's dialect.
    pub fn new(executor: E) -> Self {
        Self::with_config(executor, ChainConfig::default())
    }

    pub fn with_config(executor: E, config: impl Into<Arc<ChainConfig>>) -> Self {
        let dialect = executor.dialect();
        Self {
            executor,
            dialect,
            config: config.into(),
            fields_cache: FieldsCache::new(),
            condition: Condition::new(),
            phase: Phase::Reset,
            deferred: None,
            last_query: None,
        }
    }

    /// Override the dialect reported by the executor (e.g. `%s` placeholders).
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Share an existing column name cache.
    pub fn with_fields_cache(mut self, cache: FieldsCache) -> Self {
        self.fields_cache = cache;
        self
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn fields_cache(&self) -> &FieldsCache {
        &self.fields_cache
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// SQL of the last statement sent to the executor, placeholders included.
    pub fn last_query(&self) -> Option<&str> {
        self.last_query.as_deref()
    }

    /// Independent builder on the same executor, config and column cache.
    pub fn fork(&self) -> Self
    where
        E: Clone,
    {
        Self {
            executor: self.executor.clone(),
            dialect: self.dialect,
            config: Arc::clone(&self.config),
            fields_cache: self.fields_cache.clone(),
            condition: Condition::new(),
            phase: Phase::Reset,
            deferred: None,
            last_query: None,
        }
    }

    // ── chain methods ──

    /// Select the table; the configured prefix is added unless already present.
    pub fn table(&mut self, name: &str) -> &mut Self {
        let name = self.prefixed(name.trim());
        let cond = self.building();
        cond.set_table(name);
        cond.primary_key = None;
        self
    }

    /// Select the table and the primary key used by TOP/NOT IN pagination.
    pub fn table_with_pk(&mut self, name: &str, pk: &str) -> &mut Self {
        self.table(name);
        self.condition.set_primary_key(pk.trim());
        self
    }

    /// Replace the where predicate: raw SQL text or a clause list.
    pub fn filter(&mut self, predicate: impl Into<WherePredicate>) -> &mut Self {
        self.building().set_where(predicate);
        self
    }

    /// Append one clause to the where predicate.
    ///
    /// A raw predicate set by [`filter`](Self::filter) is kept and the clause
    /// is joined after it: `WHERE (tenant=5) AND status=?`.
    pub fn and_where(&mut self, clause: WhereClause) -> &mut Self {
        self.building().push_where(clause);
        self
    }

    /// Replace the where predicate from its dynamic JSON form.
    ///
    /// Parse errors are reported by the next terminal call.
    pub fn filter_json(&mut self, predicate: serde_json::Value) -> &mut Self {
        match WherePredicate::from_json(predicate) {
            Ok(p) => {
                self.building().set_where(p);
            }
            Err(e) => self.defer(e),
        }
        self
    }

    pub fn order_by(&mut self, expr: &str) -> &mut Self {
        self.building().set_order_by(expr);
        self
    }

    pub fn group_by(&mut self, expr: &str) -> &mut Self {
        self.building().set_group_by(expr);
        self
    }

    /// `limit(10)`, `limit("10")` or the legacy range form `limit("2,3")`.
    ///
    /// Invalid input is reported by the next terminal call.
    pub fn limit(&mut self, limit: impl IntoLimit) -> &mut Self {
        match limit.into_limit() {
            Ok(l) => {
                self.building().set_limit(l);
            }
            Err(e) => self.defer(e),
        }
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.building().set_offset(offset);
        self
    }

    /// Same as [`inner_join`](Self::inner_join).
    pub fn join(&mut self, table: &str) -> &mut Self {
        self.inner_join(table)
    }

    pub fn inner_join(&mut self, table: &str) -> &mut Self {
        self.set_join(JoinKind::Inner, table)
    }

    pub fn left_join(&mut self, table: &str) -> &mut Self {
        self.set_join(JoinKind::Left, table)
    }

    pub fn right_join(&mut self, table: &str) -> &mut Self {
        self.set_join(JoinKind::Right, table)
    }

    /// Join condition; `###` is replaced with the table prefix.
    pub fn on(&mut self, expr: &str) -> &mut Self {
        let expr = expr.replace(PREFIX_MARKER, &self.config.table_name_prefix);
        self.building().set_on(expr);
        self
    }

    // ── terminal methods ──

    /// Run a SELECT and return every row.
    ///
    /// A fields string starting with a backtick (`` "`NOW()" ``) selects a raw
    /// expression without a table.
    pub async fn select(&mut self, fields: impl Into<Fields>) -> ChainResult<Vec<Record>> {
        let fields = fields.into();
        let query = self.compile(|c, d| compile::select(c, d, &fields))?;
        let result = self.send_query(StatementKind::Select, query).await;
        self.finish();
        Ok(result?.rows)
    }

    /// Run a SELECT limited to one row.
    pub async fn get(&mut self, fields: impl Into<Fields>) -> ChainResult<Option<Record>> {
        self.building().set_limit(Limit::Count(1));
        Ok(self.select(fields).await?.into_iter().next())
    }

    /// `SELECT COUNT(expr) AS count`; ordering and pagination are ignored.
    pub async fn count(&mut self, expr: &str) -> ChainResult<u64> {
        let query = self.compile(|c, d| compile::count(c, d, expr))?;
        let result = self.send_query(StatementKind::Select, query).await;
        self.finish();
        let detail = result?;
        match detail.rows.first() {
            Some(row) => count_value(row),
            None => Ok(0),
        }
    }

    pub async fn insert(&mut self, data: impl Into<InsertData>) -> ChainResult<ExecDetail> {
        let data = data.into();
        let query = self.compile(|c, d| compile::insert(c, d, &data))?;
        let result = self.send_execute(StatementKind::Insert, query).await;
        self.finish();
        result
    }

    /// Insert several rows with one prepared statement.
    ///
    /// Every row must name the same columns in the same order.
    pub async fn insert_many<I>(&mut self, rows: I) -> ChainResult<ExecDetail>
    where
        I: IntoIterator,
        I::Item: Into<InsertData>,
    {
        let rows: Vec<InsertData> = rows.into_iter().map(Into::into).collect();
        let batch = self.compile(|c, d| compile::insert_many(c, d, &rows))?;
        let result = self.send_batch(batch).await;
        self.finish();
        result
    }

    pub async fn update(&mut self, data: impl Into<Data>) -> ChainResult<ExecDetail> {
        let data = data.into();
        let query = self.compile(|c, d| compile::update(c, d, &data))?;
        let result = self.send_execute(StatementKind::Update, query).await;
        self.finish();
        result
    }

    /// Run a DELETE.
    ///
    /// In strict mode a DELETE whose where predicate is missing or matches
    /// every row (an empty `NOT IN` list) is refused: nothing is sent and
    /// [`DeleteOutcome::Refused`] is returned.
    pub async fn delete(&mut self) -> ChainResult<DeleteOutcome> {
        let strict = self.config.strict && self.condition.where_predicate().is_unrestricted();
        let query = self.compile(compile::delete)?;
        if strict {
            let violation = GuardViolation::DeleteWithoutWhere {
                table: self.condition.table().to_string(),
            };
            trace::log_refusal(&violation);
            self.finish();
            return Ok(DeleteOutcome::Refused(violation));
        }
        let result = self.send_execute(StatementKind::Delete, query).await;
        self.finish();
        result.map(DeleteOutcome::Deleted)
    }

    /// `UPDATE t SET field=field+step`.
    pub async fn increase(&mut self, field: &str, step: impl Into<Step>) -> ChainResult<ExecDetail> {
        self.adjust(field, step.into(), false).await
    }

    /// `UPDATE t SET field=field-step`.
    pub async fn decrease(&mut self, field: &str, step: impl Into<Step>) -> ChainResult<ExecDetail> {
        self.adjust(field, step.into(), true).await
    }

    async fn adjust(&mut self, field: &str, step: Step, decrease: bool) -> ChainResult<ExecDetail> {
        let query = self.compile(|c, d| compile::increase(c, d, field, step, decrease))?;
        let result = self.send_execute(StatementKind::Update, query).await;
        self.finish();
        result
    }

    /// Column names of the current table, read from a one-row probe.
    ///
    /// Cached per table unless `cache_fields_name` is off.
    pub async fn get_fields_name(&mut self) -> ChainResult<Arc<[String]>> {
        let query = self.compile(compile::fields_probe)?;
        let table = self.condition.table().to_string();
        let use_cache = self.config.cache_fields_name;

        if use_cache {
            if let Some(columns) = self.fields_cache.get(&table) {
                self.finish();
                return Ok(columns);
            }
        }

        let result = self.send_query(StatementKind::Select, query).await;
        self.finish();
        let columns: Arc<[String]> = result?.column_names.into();
        if use_cache {
            self.fields_cache.insert(table, Arc::clone(&columns));
        }
        Ok(columns)
    }

    // ── pass-through ──

    /// Run caller-written SQL that returns rows. The condition is not touched.
    pub async fn query(&mut self, sql: &str, params: &[Value]) -> ChainResult<Vec<Record>> {
        let query = CompiledQuery::new(sql, params.to_vec());
        Ok(self.send_query(StatementKind::from_sql(sql), query).await?.rows)
    }

    /// Run caller-written SQL that returns no rows. The condition is not touched.
    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> ChainResult<ExecDetail> {
        let query = CompiledQuery::new(sql, params.to_vec());
        self.send_execute(StatementKind::from_sql(sql), query).await
    }

    /// Start a transaction. Only meaningful on a single-connection executor.
    pub async fn begin(&mut self) -> ChainResult<()> {
        let begin = self.dialect.begin;
        self.execute(begin, &[]).await.map(drop)
    }

    pub async fn commit(&mut self) -> ChainResult<()> {
        self.execute("COMMIT", &[]).await.map(drop)
    }

    pub async fn rollback(&mut self) -> ChainResult<()> {
        self.execute("ROLLBACK", &[]).await.map(drop)
    }

    /// Compile the pending SELECT without running it or resetting the builder.
    pub fn to_select_sql(&self, fields: impl Into<Fields>) -> Result<CompiledQuery, CompileError> {
        if let Some(err) = &self.deferred {
            return Err(err.clone());
        }
        compile::select(&self.snapshot(), &self.dialect, &fields.into())
    }

    // ── internals ──

    fn prefixed(&self, name: &str) -> String {
        let prefix = self.config.table_name_prefix.as_str();
        if prefix.is_empty() || name.is_empty() || name.starts_with(prefix) {
            name.to_string()
        } else {
            format!("{prefix}{name}")
        }
    }

    fn set_join(&mut self, kind: JoinKind, table: &str) -> &mut Self {
        let table = table.trim();
        let table = if table.contains(PREFIX_MARKER) {
            table.replace(PREFIX_MARKER, &self.config.table_name_prefix)
        } else {
            self.prefixed(table)
        };
        self.building().set_join(kind, table);
        self
    }

    /// Condition to mutate from a chain method.
    ///
    /// A builder left in `Compiled` (its terminal future was dropped before it
    /// finished) completes that reset first.
    fn building(&mut self) -> &mut Condition {
        if self.phase == Phase::Compiled {
            self.finish();
        }
        self.phase = Phase::Building;
        &mut self.condition
    }

    fn defer(&mut self, err: CompileError) {
        self.building();
        self.deferred.get_or_insert(err);
    }

    /// The condition as it will be compiled, with the primary key resolved.
    fn snapshot(&self) -> Condition {
        let mut cond = self.condition.clone();
        if cond.primary_key().is_none() && self.dialect.pagination == Pagination::TopNotIn {
            let pk = self
                .config
                .primary_keys
                .get(cond.table())
                .cloned()
                .or_else(|| self.executor.primary_key(cond.table()));
            if let Some(pk) = pk {
                cond.set_primary_key(pk);
            }
        }
        cond
    }

    fn compile<T>(
        &mut self,
        f: impl FnOnce(&Condition, &Dialect) -> Result<T, CompileError>,
    ) -> ChainResult<T> {
        if self.phase == Phase::Compiled {
            self.finish();
        }
        let result = match self.deferred.take() {
            Some(err) => Err(err),
            None => f(&self.snapshot(), &self.dialect),
        };
        match result {
            Ok(compiled) => {
                self.phase = Phase::Compiled;
                Ok(compiled)
            }
            Err(err) => {
                self.finish();
                Err(ChainError::Compile(err))
            }
        }
    }

    fn finish(&mut self) {
        self.condition.reset();
        self.deferred = None;
        self.phase = Phase::Reset;
    }

    async fn send_query(&mut self, kind: StatementKind, query: CompiledQuery) -> ChainResult<QueryDetail> {
        let (sql, params) = query.into_parts();
        trace::log_sql(&self.config.sql_log, self.dialect.kind, kind, &sql, params.len());
        let result = self.executor.query_with_detail(&sql, &params).await;
        if let Err(err) = &result {
            trace::log_failure(&self.config.sql_log, kind, &sql, err);
        }
        self.last_query = Some(sql);
        result
    }

    async fn send_execute(&mut self, kind: StatementKind, query: CompiledQuery) -> ChainResult<ExecDetail> {
        let (sql, params) = query.into_parts();
        trace::log_sql(&self.config.sql_log, self.dialect.kind, kind, &sql, params.len());
        let result = self.executor.execute_with_detail(&sql, &params).await;
        if let Err(err) = &result {
            trace::log_failure(&self.config.sql_log, kind, &sql, err);
        }
        self.last_query = Some(sql);
        result
    }

    async fn send_batch(&mut self, batch: CompiledBatch) -> ChainResult<ExecDetail> {
        let CompiledBatch { sql, param_sets } = batch;
        let param_count = param_sets.iter().map(Vec::len).sum();
        trace::log_sql(
            &self.config.sql_log,
            self.dialect.kind,
            StatementKind::Insert,
            &sql,
            param_count,
        );
        let result = self.executor.execute_many_with_detail(&sql, &param_sets).await;
        if let Err(err) = &result {
            trace::log_failure(&self.config.sql_log, StatementKind::Insert, &sql, err);
        }
        self.last_query = Some(sql);
        result
    }
}

fn count_value(row: &Record) -> ChainResult<u64> {
    let value = row.try_get("count").or_else(|| row.values().first());
    let parsed = match value {
        None | Some(Value::Null) => Some(0),
        Some(Value::Int(n)) => u64::try_from(*n).ok(),
        Some(Value::Float(f)) if *f >= 0.0 && f.is_finite() => Some(*f as u64),
        Some(Value::Text(s)) => s.trim().parse().ok(),
        #[cfg(feature = "rust_decimal")]
        Some(Value::Decimal(d)) => d.trunc().to_string().parse().ok(),
        Some(_) => None,
    };
    parsed.ok_or_else(|| ChainError::decode("count", format!("not a row count: {value:?}")))
}

#[cfg(test)]
mod tests;
