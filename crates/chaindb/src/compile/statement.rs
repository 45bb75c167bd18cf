//! Statement assembly.

use super::{CompiledBatch, CompiledQuery, Params, clauses, filter, join_parts, paging};
use crate::condition::{Condition, Limit};
use crate::data::{Data, InsertData};
use crate::dialect::{Dialect, DialectKind, Quote};
use crate::error::CompileError;
use crate::raw::RawExpr;
use crate::value::Step;

/// SELECT list.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Fields {
    /// `*`
    #[default]
    All,
    /// Comma-separated column list or expression, used as written except for
    /// identifier quoting of bare column lists.
    List(String),
    /// `SELECT <raw>` with no table or condition (`SELECT NOW()`).
    Raw(RawExpr),
}

impl Fields {
    /// Quote a bare `a,b,c` list; anything already quoted, qualified
    /// (`t.a`) or containing expressions is left alone. Raw fields have their
    /// arguments interpolated or bound into `params`.
    pub fn render(&self, quote: Quote, params: &mut Params) -> Result<String, CompileError> {
        let sql = match self {
            Fields::All => "*".to_string(),
            Fields::Raw(expr) => expr.render(params)?,
            Fields::List(list) => {
                if quote.appears_in(list) || list.contains('.') {
                    return Ok(list.trim().to_string());
                }
                let items: Vec<&str> = list.split(',').map(str::trim).collect();
                if items.iter().all(|i| is_bare_ident(i)) {
                    items
                        .iter()
                        .map(|i| quote.wrap(i))
                        .collect::<Vec<_>>()
                        .join(",")
                } else {
                    list.trim().to_string()
                }
            }
        };
        Ok(sql)
    }
}

fn is_bare_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl From<&str> for Fields {
    fn from(s: &str) -> Self {
        if let Some(expr) = RawExpr::parse_marked(s) {
            return Fields::Raw(expr);
        }
        match s.trim() {
            "" | "*" => Fields::All,
            list => Fields::List(list.to_string()),
        }
    }
}

impl From<String> for Fields {
    fn from(s: String) -> Self {
        Fields::from(s.as_str())
    }
}

impl From<RawExpr> for Fields {
    fn from(expr: RawExpr) -> Self {
        Fields::Raw(expr)
    }
}

fn require_table(cond: &Condition) -> Result<&str, CompileError> {
    match cond.table().trim() {
        "" => Err(CompileError::MissingTable),
        table => Ok(table),
    }
}

fn where_clause(cond: &Condition, params: &mut Params) -> Result<String, CompileError> {
    Ok(filter::where_body(cond.where_predicate(), params)?
        .map(|body| format!("WHERE {body}"))
        .unwrap_or_default())
}

/// MySQL accepts `ORDER BY` and a row count on single-table UPDATE/DELETE.
fn write_tail(cond: &Condition, dialect: &Dialect) -> (String, String) {
    if dialect.kind != DialectKind::MySql {
        return (String::new(), String::new());
    }
    let limit = match cond.limit() {
        Some(Limit::Count(n)) if n > 0 => format!("LIMIT {n}"),
        _ => String::new(),
    };
    (clauses::order_by(cond), limit)
}

/// `SELECT [TOP] fields FROM table [join] [WHERE] [GROUP BY] [ORDER BY] [LIMIT]`
pub fn select(
    cond: &Condition,
    dialect: &Dialect,
    fields: &Fields,
) -> Result<CompiledQuery, CompileError> {
    let mut params = Params::new(dialect.placeholder);

    if let Fields::Raw(_) = fields {
        let sql = format!("SELECT {}", fields.render(dialect.quote, &mut params)?);
        return Ok(CompiledQuery::new(sql, params.into_values()));
    }

    let table = require_table(cond)?;
    let paging = paging::plan(cond, dialect)?;
    let columns = fields.render(dialect.quote, &mut params)?;
    let head = match &paging.top {
        Some(top) => format!("SELECT {top} {columns} FROM {table}"),
        None => format!("SELECT {columns} FROM {table}"),
    };

    let body = filter::where_body(cond.where_predicate(), &mut params)?;
    let where_sql = paging
        .fold_where(body)
        .map(|b| format!("WHERE {b}"))
        .unwrap_or_default();

    let sql = join_parts([
        head.as_str(),
        &clauses::join(cond),
        &where_sql,
        &clauses::group_by(cond),
        &clauses::order_by(cond),
        &paging.tail,
    ]);
    Ok(CompiledQuery::new(sql, params.into_values()))
}

/// `SELECT COUNT(expr) AS count FROM ...`; ordering and pagination are ignored.
pub fn count(cond: &Condition, dialect: &Dialect, expr: &str) -> Result<CompiledQuery, CompileError> {
    let expr = match expr.trim() {
        "" => "*",
        e => e,
    };
    let mut counted = cond.clone();
    counted.limit = None;
    counted.offset = None;
    counted.order_by.clear();
    select(&counted, dialect, &Fields::List(format!("COUNT({expr}) AS count")))
}

/// `INSERT INTO t (a,b) VALUES (?,?)` or `INSERT INTO t VALUES (?,?)`.
pub fn insert(
    cond: &Condition,
    dialect: &Dialect,
    data: &InsertData,
) -> Result<CompiledQuery, CompileError> {
    let table = require_table(cond)?;
    if data.is_empty() {
        return Err(CompileError::EmptyData("insert"));
    }

    let mut params = Params::new(dialect.placeholder);
    let sql = match data {
        InsertData::Row(row) => {
            let columns = row.columns().collect::<Vec<_>>().join(",");
            let values = row
                .iter()
                .map(|(_, v)| v.render(&mut params))
                .collect::<Result<Vec<_>, _>>()?
                .join(",");
            format!("INSERT INTO {table} ({columns}) VALUES ({values})")
        }
        InsertData::ValuesOnly(values) => {
            let values = values
                .iter()
                .map(|v| v.render(&mut params))
                .collect::<Result<Vec<_>, _>>()?
                .join(",");
            format!("INSERT INTO {table} VALUES ({values})")
        }
    };
    Ok(CompiledQuery::new(sql, params.into_values()))
}

/// One INSERT statement for a homogeneous batch of rows.
///
/// Column rows are aligned to the first row's column order; a row whose
/// column set differs is rejected.
pub fn insert_many(
    cond: &Condition,
    dialect: &Dialect,
    rows: &[InsertData],
) -> Result<CompiledBatch, CompileError> {
    let Some(first) = rows.first() else {
        return Err(CompileError::EmptyData("insert_many"));
    };
    let CompiledQuery { sql, params } = insert(cond, dialect, first)?;

    let mut param_sets = Vec::with_capacity(rows.len());
    param_sets.push(params);
    for (row, data) in rows.iter().enumerate().skip(1) {
        let aligned;
        let data = match (first, data) {
            (InsertData::Row(head), InsertData::Row(cols)) => {
                let cols = cols
                    .reordered(head.columns().collect::<Vec<_>>().into_iter())
                    .ok_or(CompileError::InconsistentRow { row })?;
                aligned = InsertData::Row(cols);
                &aligned
            }
            _ => data,
        };
        let compiled = insert(cond, dialect, data)?;
        if compiled.sql != sql {
            return Err(CompileError::InconsistentRow { row });
        }
        param_sets.push(compiled.params);
    }
    Ok(CompiledBatch { sql, param_sets })
}

/// `UPDATE t SET a=?,b=NOW() [WHERE ...]`
pub fn update(cond: &Condition, dialect: &Dialect, data: &Data) -> Result<CompiledQuery, CompileError> {
    let table = require_table(cond)?;
    if data.is_empty() {
        return Err(CompileError::EmptyData("update"));
    }

    let mut params = Params::new(dialect.placeholder);
    let assignments = data
        .iter()
        .map(|(column, v)| Ok(format!("{column}={}", v.render(&mut params)?)))
        .collect::<Result<Vec<_>, CompileError>>()?
        .join(",");
    let where_sql = where_clause(cond, &mut params)?;
    let (order, limit) = write_tail(cond, dialect);

    let head = format!("UPDATE {table} SET {assignments}");
    let sql = join_parts([head.as_str(), &where_sql, &order, &limit]);
    Ok(CompiledQuery::new(sql, params.into_values()))
}

/// `DELETE FROM t [WHERE ...]`. The strict-mode guard lives in the builder.
pub fn delete(cond: &Condition, dialect: &Dialect) -> Result<CompiledQuery, CompileError> {
    let table = require_table(cond)?;
    let mut params = Params::new(dialect.placeholder);
    let where_sql = where_clause(cond, &mut params)?;
    let (order, limit) = write_tail(cond, dialect);

    let head = format!("DELETE FROM {table}");
    let sql = join_parts([head.as_str(), &where_sql, &order, &limit]);
    Ok(CompiledQuery::new(sql, params.into_values()))
}

/// `UPDATE t SET f=f+step [WHERE ...]` (`-` when `decrease` is set).
///
/// The step is written into the statement text; negative steps are
/// parenthesised so `f-(-1)` never turns into a `--` comment.
pub fn increase(
    cond: &Condition,
    dialect: &Dialect,
    field: &str,
    step: Step,
    decrease: bool,
) -> Result<CompiledQuery, CompileError> {
    let table = require_table(cond)?;
    let field = field.trim();
    if field.is_empty() {
        return Err(CompileError::EmptyData(if decrease { "decrease" } else { "increase" }));
    }
    let step = step.validate()?.to_string();
    let step = if step.starts_with('-') {
        format!("({step})")
    } else {
        step
    };
    let sign = if decrease { '-' } else { '+' };

    let mut params = Params::new(dialect.placeholder);
    let where_sql = where_clause(cond, &mut params)?;
    let head = format!("UPDATE {table} SET {field}={field}{sign}{step}");
    let sql = join_parts([head.as_str(), &where_sql]);
    Ok(CompiledQuery::new(sql, params.into_values()))
}

/// Single-row probe used to discover column names.
pub fn fields_probe(cond: &Condition, dialect: &Dialect) -> Result<CompiledQuery, CompileError> {
    let table = require_table(cond)?;
    Ok(CompiledQuery::new(dialect.fields_probe_sql(table), Vec::new()))
}
