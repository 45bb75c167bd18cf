use super::*;
use crate::raw::raw;
use serde_json::json;
use std::sync::Mutex;

// ── Recording executor ──

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Query(String, Vec<Value>),
    Execute(String, Vec<Value>),
    Many(String, Vec<Vec<Value>>),
}

impl Call {
    fn sql(&self) -> &str {
        match self {
            Call::Query(sql, _) | Call::Execute(sql, _) | Call::Many(sql, _) => sql.as_str(),
        }
    }
}

struct Spy {
    dialect: Dialect,
    rows: Vec<Record>,
    columns: Vec<String>,
    pk: Option<String>,
    fail: bool,
    calls: Mutex<Vec<Call>>,
}

impl Spy {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            rows: Vec::new(),
            columns: Vec::new(),
            pk: None,
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn returning(mut self, rows: Vec<Record>) -> Self {
        self.columns = rows
            .first()
            .map(|r| r.columns().to_vec())
            .unwrap_or_default();
        self.rows = rows;
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn sqls(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.sql().to_string()).collect()
    }

    fn record(&self, call: Call) -> ChainResult<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail {
            return Err(ChainError::execution("boom"));
        }
        Ok(())
    }
}

impl Executor for Spy {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn query_with_detail(&self, sql: &str, params: &[Value]) -> ChainResult<QueryDetail> {
        self.record(Call::Query(sql.to_string(), params.to_vec()))?;
        Ok(QueryDetail {
            rows: self.rows.clone(),
            column_names: self.columns.clone(),
            executed_sql: sql.to_string(),
        })
    }

    async fn execute_with_detail(&self, sql: &str, params: &[Value]) -> ChainResult<ExecDetail> {
        self.record(Call::Execute(sql.to_string(), params.to_vec()))?;
        Ok(ExecDetail {
            last_insert_id: Some(7),
            rows_affected: 1,
            executed_sql: sql.to_string(),
        })
    }

    async fn execute_many_with_detail(
        &self,
        sql: &str,
        param_sets: &[Vec<Value>],
    ) -> ChainResult<ExecDetail> {
        self.record(Call::Many(sql.to_string(), param_sets.to_vec()))?;
        Ok(ExecDetail {
            last_insert_id: None,
            rows_affected: param_sets.len() as u64,
            executed_sql: sql.to_string(),
        })
    }

    fn primary_key(&self, _table: &str) -> Option<String> {
        self.pk.clone()
    }
}

fn assert_reset(db: &ChainDb<&Spy>, table: &str) {
    assert_eq!(db.phase(), Phase::Reset);
    assert_eq!(db.condition().table(), table);
    assert!(db.condition().is_pristine());
}

// ── reset ──

#[tokio::test]
async fn terminal_call_resets_everything_but_the_table() {
    let spy = Spy::new(Dialect::mysql());
    let mut db = ChainDb::new(&spy);
    db.table("users")
        .filter(vec![WhereClause::eq("a", 1)])
        .order_by("id")
        .group_by("a")
        .limit(5)
        .offset(10)
        .left_join("orders")
        .on("users.id=orders.uid");
    assert_eq!(db.phase(), Phase::Building);

    db.select("*").await.unwrap();
    assert_reset(&db, "users");
}

#[tokio::test]
async fn and_where_keeps_a_raw_filter() {
    let spy = Spy::new(Dialect::mysql());
    let mut db = ChainDb::new(&spy);
    let outcome = db
        .table("t")
        .filter("tenant=5")
        .and_where(WhereClause::eq("status", 0))
        .delete()
        .await
        .unwrap();
    assert!(!outcome.is_refused());
    assert_eq!(
        spy.calls(),
        vec![Call::Execute(
            "DELETE FROM t WHERE (tenant=5) AND status=?".into(),
            vec![Value::Int(0)]
        )]
    );
    assert_reset(&db, "t");
}

#[tokio::test]
async fn next_query_does_not_see_stale_predicates() {
    let spy = Spy::new(Dialect::mysql());
    let mut db = ChainDb::new(&spy);
    db.table("users").filter(vec![WhereClause::eq("a", 1)]).select("*").await.unwrap();
    db.select("*").await.unwrap();

    assert_eq!(
        spy.sqls(),
        vec!["SELECT * FROM users WHERE a=?", "SELECT * FROM users"]
    );
}

#[tokio::test]
async fn compile_errors_reset_and_send_nothing() {
    let spy = Spy::new(Dialect::sqlserver());
    let mut db = ChainDb::new(&spy);
    let err = db
        .table("t")
        .filter("x=1")
        .limit("2,3")
        .select("*")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ChainError::Compile(CompileError::MissingPrimaryKey { .. })
    ));
    assert!(spy.calls().is_empty());
    assert_reset(&db, "t");
}

#[tokio::test]
async fn bad_limit_is_reported_by_the_terminal_call() {
    let spy = Spy::new(Dialect::mysql());
    let mut db = ChainDb::new(&spy);
    let err = db.table("t").limit("ten").select("*").await.unwrap_err();
    assert!(matches!(err, ChainError::Compile(CompileError::InvalidLimit(_))));
    assert!(spy.calls().is_empty());

    // The deferred error does not leak into the next query.
    db.select("*").await.unwrap();
    assert_eq!(spy.sqls(), vec!["SELECT * FROM t"]);
}

#[tokio::test]
async fn bad_json_predicate_is_reported_by_the_terminal_call() {
    let spy = Spy::new(Dialect::mysql());
    let mut db = ChainDb::new(&spy);
    let err = db
        .table("t")
        .filter_json(json!([["a", 1], ["b", "LIKE", 2]]))
        .select("*")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ChainError::Compile(CompileError::InvalidClause { index: 1, .. })
    ));
    assert!(spy.calls().is_empty());
}

#[tokio::test]
async fn executor_errors_propagate_and_reset() {
    let mut spy = Spy::new(Dialect::mysql());
    spy.fail = true;
    let mut db = ChainDb::new(&spy);
    let err = db
        .table("t")
        .filter(vec![WhereClause::eq("a", 1)])
        .update(Data::new().set("b", 2))
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::Execution(_)));
    assert_reset(&db, "t");
    assert_eq!(db.last_query(), Some("UPDATE t SET b=? WHERE a=?"));
}

// ── delete guard ──

#[tokio::test]
async fn strict_delete_without_where_is_refused() {
    let spy = Spy::new(Dialect::mysql());
    let mut db = ChainDb::new(&spy);
    let outcome = db.table("users").order_by("id").delete().await.unwrap();

    assert_eq!(
        outcome,
        DeleteOutcome::Refused(GuardViolation::DeleteWithoutWhere {
            table: "users".into()
        })
    );
    assert!(outcome.is_refused());
    assert_eq!(outcome.rows_affected(), 0);
    assert!(spy.calls().is_empty());
    assert!(db.last_query().is_none());
    assert_reset(&db, "users");
}

#[tokio::test]
async fn strict_delete_matching_every_row_is_refused() {
    let spy = Spy::new(Dialect::mysql());
    let mut db = ChainDb::new(&spy);
    let outcome = db
        .table("users")
        .filter(WhereClause::not_in("id", Vec::<i64>::new()))
        .delete()
        .await
        .unwrap();
    assert!(outcome.is_refused());

    let outcome = db
        .filter(vec![
            WhereClause::eq("a", 1),
            WhereClause::not_in("id", Vec::<i64>::new()).or(),
        ])
        .delete()
        .await
        .unwrap();
    assert!(outcome.is_refused());
    assert!(spy.calls().is_empty());

    // An empty NOT IN next to a real restriction still deletes.
    let outcome = db
        .filter(vec![
            WhereClause::eq("a", 1),
            WhereClause::not_in("id", Vec::<i64>::new()),
        ])
        .delete()
        .await
        .unwrap();
    assert!(!outcome.is_refused());
    assert_eq!(spy.sqls(), vec!["DELETE FROM users WHERE a=? AND 1=1"]);
}

#[tokio::test]
async fn delete_with_where_runs() {
    let spy = Spy::new(Dialect::postgres());
    let mut db = ChainDb::new(&spy);
    let outcome = db
        .table("users")
        .filter(vec![WhereClause::eq("id", 3)])
        .delete()
        .await
        .unwrap();
    assert_eq!(outcome.rows_affected(), 1);
    assert_eq!(
        spy.calls(),
        vec![Call::Execute("DELETE FROM users WHERE id=$1".into(), vec![Value::Int(3)])]
    );
}

#[tokio::test]
async fn lenient_delete_without_where_runs() {
    let spy = Spy::new(Dialect::mysql());
    let mut db = ChainDb::with_config(&spy, ChainConfig::new().with_strict(false));
    let outcome = db.table("logs").delete().await.unwrap();
    assert!(!outcome.is_refused());
    assert_eq!(spy.sqls(), vec!["DELETE FROM logs"]);
}

// ── terminals ──

#[tokio::test]
async fn last_query_keeps_dialect_placeholders() {
    let spy = Spy::new(Dialect::postgres());
    let mut db = ChainDb::new(&spy);
    db.table("t")
        .filter(vec![WhereClause::eq("a", 1), WhereClause::lt("b", 5).or()])
        .select("*")
        .await
        .unwrap();
    assert_eq!(db.last_query(), Some("SELECT * FROM t WHERE a=$1 OR b<$2"));
}

#[tokio::test]
async fn get_forces_a_single_row() {
    let spy = Spy::new(Dialect::mysql()).returning(vec![
        Record::from_pairs([("id", 1)]),
        Record::from_pairs([("id", 2)]),
    ]);
    let mut db = ChainDb::new(&spy);
    let row = db
        .table("users")
        .filter(vec![WhereClause::gt("id", 0)])
        .limit(50)
        .get("*")
        .await
        .unwrap();
    assert_eq!(row.map(|r| r.get("id").clone()), Some(Value::Int(1)));
    assert_eq!(spy.sqls(), vec!["SELECT * FROM users WHERE id>? LIMIT 1"]);

    let spy = Spy::new(Dialect::mysql());
    let mut db = ChainDb::new(&spy);
    assert!(db.table("users").get("*").await.unwrap().is_none());
}

#[tokio::test]
async fn native_function_select_needs_no_table() {
    let spy = Spy::new(Dialect::mysql());
    let mut db = ChainDb::new(&spy);
    db.select("`SUM(1+2)").await.unwrap();
    assert_eq!(spy.sqls(), vec!["SELECT SUM(1+2)"]);
}

#[tokio::test]
async fn count_reads_the_count_column() {
    let spy = Spy::new(Dialect::mysql()).returning(vec![Record::from_pairs([("count", 42)])]);
    let mut db = ChainDb::new(&spy);
    let n = db
        .table("users")
        .filter(vec![WhereClause::eq("status", 1)])
        .limit(10)
        .count("*")
        .await
        .unwrap();
    assert_eq!(n, 42);
    assert_eq!(spy.sqls(), vec!["SELECT COUNT(*) AS count FROM users WHERE status=?"]);
}

#[tokio::test]
async fn insert_returns_last_insert_id() {
    let spy = Spy::new(Dialect::mysql());
    let mut db = ChainDb::new(&spy);
    let detail = db
        .table("users")
        .insert(Data::new().set("name", "alice").set("created_at", raw("NOW()")))
        .await
        .unwrap();
    assert_eq!(detail.last_insert_id, Some(7));
    assert_eq!(
        spy.calls(),
        vec![Call::Execute(
            "INSERT INTO users (name,created_at) VALUES (?,NOW())".into(),
            vec![Value::from("alice")]
        )]
    );
}

#[tokio::test]
async fn insert_many_uses_one_batch() {
    let spy = Spy::new(Dialect::postgres());
    let mut db = ChainDb::new(&spy);
    let rows = InsertData::many_from_json(json!([{"a": 1, "b": 2}, {"a": 3, "b": 4}])).unwrap();
    let detail = db.table("t").insert_many(rows).await.unwrap();
    assert_eq!(detail.rows_affected, 2);
    assert_eq!(
        spy.calls(),
        vec![Call::Many(
            "INSERT INTO t (a,b) VALUES ($1,$2)".into(),
            vec![
                vec![Value::Int(1), Value::Int(2)],
                vec![Value::Int(3), Value::Int(4)]
            ]
        )]
    );
}

#[tokio::test]
async fn insert_many_aligns_rows_to_the_first_column_order() {
    let spy = Spy::new(Dialect::postgres());
    let mut db = ChainDb::new(&spy);
    let rows = InsertData::many_from_json(json!([{"a": 1, "b": 2}, {"b": 4, "a": 3}])).unwrap();
    db.table("t").insert_many(rows).await.unwrap();
    assert_eq!(
        spy.calls(),
        vec![Call::Many(
            "INSERT INTO t (a,b) VALUES ($1,$2)".into(),
            vec![
                vec![Value::Int(1), Value::Int(2)],
                vec![Value::Int(3), Value::Int(4)]
            ]
        )]
    );
}

#[tokio::test]
async fn increase_and_decrease_keep_the_condition() {
    let spy = Spy::new(Dialect::mysql());
    let mut db = ChainDb::new(&spy);
    db.table("posts")
        .filter(vec![WhereClause::eq("id", 1)])
        .increase("views", 1)
        .await
        .unwrap();
    db.filter(vec![WhereClause::eq("id", 2)])
        .decrease("stock", 2.5)
        .await
        .unwrap();
    assert_eq!(
        spy.sqls(),
        vec![
            "UPDATE posts SET views=views+1 WHERE id=?",
            "UPDATE posts SET stock=stock-2.5 WHERE id=?"
        ]
    );
}

#[tokio::test]
async fn fields_name_is_cached_per_table() {
    let spy = Spy::new(Dialect::sqlserver())
        .returning(vec![Record::from_pairs([("id", Value::Int(1)), ("name", Value::from("a"))])]);
    let mut db = ChainDb::new(&spy);

    let first = db.table("users").get_fields_name().await.unwrap();
    let second = db.get_fields_name().await.unwrap();
    assert_eq!(&*first, &["id".to_string(), "name".to_string()]);
    assert_eq!(first, second);
    assert_eq!(spy.sqls(), vec!["SELECT TOP 1 * FROM users"]);
}

#[tokio::test]
async fn fields_name_cache_can_be_disabled() {
    let spy = Spy::new(Dialect::mysql());
    let mut db = ChainDb::with_config(&spy, ChainConfig::new().with_cache_fields_name(false));
    db.table("users").get_fields_name().await.unwrap();
    db.get_fields_name().await.unwrap();
    assert_eq!(spy.calls().len(), 2);
    assert!(db.fields_cache().is_empty());
}

// ── prefix / primary keys ──

#[tokio::test]
async fn table_prefix_and_marker() {
    let spy = Spy::new(Dialect::mysql());
    let mut db = ChainDb::with_config(&spy, ChainConfig::new().with_table_name_prefix("app_"));
    db.table("users")
        .inner_join("###orders o")
        .on("o.uid=###users.id")
        .select("*")
        .await
        .unwrap();
    db.table("app_users").left_join("profiles p").on("p.uid=app_users.id").select("*").await.unwrap();

    assert_eq!(
        spy.sqls(),
        vec![
            "SELECT * FROM app_users INNER JOIN app_orders o ON o.uid=app_users.id",
            "SELECT * FROM app_users LEFT JOIN app_profiles p ON p.uid=app_users.id",
        ]
    );
}

#[tokio::test]
async fn sqlserver_primary_key_sources() {
    // Explicit.
    let spy = Spy::new(Dialect::sqlserver());
    let mut db = ChainDb::new(&spy);
    db.table_with_pk("t", "tid").limit("2,3").select("*").await.unwrap();

    // Configured.
    let mut db = ChainDb::with_config(&spy, ChainConfig::new().with_primary_key("t", "cid"));
    db.table("t").limit(10).offset(20).select("*").await.unwrap();

    // Reported by the executor.
    let mut reporting = Spy::new(Dialect::sqlserver());
    reporting.pk = Some("eid".into());
    let mut db2 = ChainDb::new(&reporting);
    db2.table("t").offset(5).select("*").await.unwrap();

    assert_eq!(
        spy.sqls(),
        vec![
            "SELECT TOP (3-2+1) * FROM t WHERE tid NOT IN (SELECT TOP 2-1 tid FROM t)",
            "SELECT TOP 10 * FROM t WHERE cid NOT IN (SELECT TOP 20 cid FROM t)",
        ]
    );
    assert_eq!(
        reporting.sqls(),
        vec!["SELECT * FROM t WHERE eid NOT IN (SELECT TOP 5 eid FROM t)"]
    );
}

#[tokio::test]
async fn switching_tables_drops_the_old_primary_key() {
    let spy = Spy::new(Dialect::sqlserver());
    let mut db = ChainDb::new(&spy);
    db.table_with_pk("a", "aid");
    db.table("b");
    assert_eq!(db.condition().primary_key(), None);
}

// ── pass-through / fork ──

#[tokio::test]
async fn raw_statements_leave_the_condition_alone() {
    let spy = Spy::new(Dialect::sqlserver());
    let mut db = ChainDb::new(&spy);
    db.table("t").filter(vec![WhereClause::eq("a", 1)]);

    db.begin().await.unwrap();
    db.query("SELECT 1", &[]).await.unwrap();
    db.execute("UPDATE t SET a=@P1", &[Value::Int(2)]).await.unwrap();
    db.commit().await.unwrap();
    db.rollback().await.unwrap();

    assert_eq!(db.phase(), Phase::Building);
    assert!(!db.condition().where_predicate().is_empty());
    assert_eq!(
        spy.sqls(),
        vec!["BEGIN TRANSACTION", "SELECT 1", "UPDATE t SET a=@P1", "COMMIT", "ROLLBACK"]
    );
}

#[tokio::test]
async fn fork_is_independent_but_shares_the_cache() {
    let spy = Spy::new(Dialect::mysql()).returning(vec![Record::from_pairs([("id", 1)])]);
    let mut db = ChainDb::new(&spy);
    db.table("users").filter(vec![WhereClause::eq("a", 1)]);

    let mut other = db.fork();
    assert!(other.condition().is_pristine());
    assert_eq!(other.condition().table(), "");

    other.table("users").get_fields_name().await.unwrap();
    assert!(db.fields_cache().get("users").is_some());
    assert!(!db.condition().where_predicate().is_empty());
}

#[test]
fn preview_does_not_reset() {
    let spy = Spy::new(Dialect::mysql());
    let mut db = ChainDb::new(&spy);
    db.table("t").filter(vec![WhereClause::eq("a", 1)]).limit(3);
    let q = db.to_select_sql("id").unwrap();
    assert_eq!(q.sql, "SELECT `id` FROM t WHERE a=? LIMIT 3");
    assert_eq!(db.phase(), Phase::Building);
    assert!(!db.condition().is_pristine());
}
