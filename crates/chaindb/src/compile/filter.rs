//! Where-predicate compiler.

use super::{CompiledQuery, Params};
use crate::dialect::Dialect;
use crate::error::CompileError;
use crate::predicate::{Predicate, WhereClause, WherePredicate};
use crate::value::Value;

/// Compile a predicate on its own: `("WHERE a=? OR b<?", [1, 5])`.
///
/// An empty predicate compiles to an empty fragment.
pub fn compile_where(
    predicate: &WherePredicate,
    dialect: &Dialect,
) -> Result<CompiledQuery, CompileError> {
    let mut params = Params::new(dialect.placeholder);
    let sql = where_body(predicate, &mut params)?
        .map(|body| format!("WHERE {body}"))
        .unwrap_or_default();
    Ok(CompiledQuery::new(sql, params.into_values()))
}

/// Body of the WHERE clause, without the keyword. `None` when nothing is emitted.
///
/// Each clause after the first is prefixed with its own connective, so a
/// leading `OR` on the first clause is dropped and no trailing token is left.
pub(crate) fn where_body(
    predicate: &WherePredicate,
    params: &mut Params,
) -> Result<Option<String>, CompileError> {
    match predicate {
        WherePredicate::Raw(s) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_string()))
        }
        WherePredicate::Clauses(clauses) => {
            let mut out = String::new();
            for (index, clause) in clauses.iter().enumerate() {
                let free = matches!(clause.predicate(), Predicate::Sql(_));
                if !free && clause.field().trim().is_empty() {
                    return Err(CompileError::clause(index, "", "empty field name"));
                }
                let text = render_clause(clause, params)
                    .map_err(|e| CompileError::clause(index, clause.field(), e.to_string()))?;
                if !out.is_empty() {
                    out.push(' ');
                    out.push_str(clause.connective().as_str());
                    out.push(' ');
                }
                out.push_str(&text);
            }
            Ok((!out.is_empty()).then_some(out))
        }
    }
}

fn render_clause(clause: &WhereClause, params: &mut Params) -> Result<String, CompileError> {
    let field = clause.field().trim();

    let sql = match clause.predicate() {
        Predicate::Eq(v) => format!("{field}={}", params.push(v.clone())),
        Predicate::EqRaw(expr) => format!("{field}={}", expr.render(params)?),
        Predicate::Cmp(op, v) => format!("{field}{op}{}", params.push(v.clone())),
        Predicate::CmpRaw(op, expr) => format!("{field}{op}{}", expr.render(params)?),
        Predicate::Between(lo, hi) => {
            let lo = params.push(lo.clone());
            let hi = params.push(hi.clone());
            format!("{field} BETWEEN {lo} AND {hi}")
        }
        // An empty list can never match; `IN ()` is not valid SQL.
        Predicate::In(values) if values.is_empty() => "1=0".to_string(),
        Predicate::NotIn(values) if values.is_empty() => "1=1".to_string(),
        Predicate::In(values) => format!("{field} IN ({})", bind_list(values, params)),
        Predicate::NotIn(values) => format!("{field} NOT IN ({})", bind_list(values, params)),
        Predicate::InRaw(expr) => format!("{field} IN ({})", expr.render(params)?),
        Predicate::NotInRaw(expr) => format!("{field} NOT IN ({})", expr.render(params)?),
        Predicate::IsNot(target) => format!("{field} IS NOT {}", target.as_str()),
        Predicate::Sql(expr) => format!("({})", expr.render(params)?),
    };
    Ok(sql)
}

fn bind_list(values: &[Value], params: &mut Params) -> String {
    values
        .iter()
        .map(|v| params.push(v.clone()))
        .collect::<Vec<_>>()
        .join(",")
}
