//! Where-predicate model.
//!
//! Every clause shape is resolved into a [`Predicate`] variant when the clause
//! is built, so the compiler never inspects value types or string prefixes.
//!
//! # Example
//! ```ignore
//! use chaindb::{WhereClause, raw_with};
//!
//! let clauses = vec![
//!     WhereClause::eq("status", "active"),
//!     WhereClause::between("age", 18, 30),
//!     WhereClause::lt("score", 5).or(),
//!     WhereClause::eq_raw("c", raw_with("ABS(?)", [2])),
//! ];
//! ```

use crate::error::CompileError;
use crate::raw::{RawExpr, raw};
use crate::value::Value;
use serde_json::Value as Json;
use std::fmt;
use std::str::FromStr;

/// Boolean connective joining a clause to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connective {
    #[default]
    And,
    Or,
}

impl Connective {
    pub fn as_str(self) -> &'static str {
        match self {
            Connective::And => "AND",
            Connective::Or => "OR",
        }
    }
}

/// Ordering / inequality operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Ne,
}

impl CmpOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Ne => "!=",
        }
    }
}

impl FromStr for CmpOp {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "<" => Ok(CmpOp::Lt),
            "<=" => Ok(CmpOp::Le),
            ">" => Ok(CmpOp::Gt),
            ">=" => Ok(CmpOp::Ge),
            "!=" | "<>" => Ok(CmpOp::Ne),
            other => Err(CompileError::UnknownOperator(other.to_string())),
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand side of `IS NOT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsNotTarget {
    Null,
    True,
    False,
    Unknown,
}

impl IsNotTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            IsNotTarget::Null => "NULL",
            IsNotTarget::True => "TRUE",
            IsNotTarget::False => "FALSE",
            IsNotTarget::Unknown => "UNKNOWN",
        }
    }
}

/// The test applied to a clause's field.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `field = ?`
    Eq(Value),
    /// `field = <raw>`
    EqRaw(RawExpr),
    /// `field <op> ?`
    Cmp(CmpOp, Value),
    /// `field <op> <raw>`
    CmpRaw(CmpOp, RawExpr),
    /// `field BETWEEN ? AND ?`
    Between(Value, Value),
    /// `field IN (?, ?, ...)`
    In(Vec<Value>),
    /// `field NOT IN (?, ?, ...)`
    NotIn(Vec<Value>),
    /// `field IN (<raw>)`
    InRaw(RawExpr),
    /// `field NOT IN (<raw>)`
    NotInRaw(RawExpr),
    /// `field IS NOT NULL` and friends
    IsNot(IsNotTarget),
    /// `(<raw>)`, a free-standing condition with no field.
    Sql(RawExpr),
}

/// One `field <test>` element of a where list.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    field: String,
    connective: Connective,
    predicate: Predicate,
}

impl WhereClause {
    pub fn new(field: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            field: field.into(),
            connective: Connective::And,
            predicate,
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Predicate::Eq(value.into()))
    }

    pub fn eq_raw(field: impl Into<String>, expr: RawExpr) -> Self {
        Self::new(field, Predicate::EqRaw(expr))
    }

    pub fn cmp(field: impl Into<String>, op: CmpOp, value: impl Into<Value>) -> Self {
        Self::new(field, Predicate::Cmp(op, value.into()))
    }

    pub fn cmp_raw(field: impl Into<String>, op: CmpOp, expr: RawExpr) -> Self {
        Self::new(field, Predicate::CmpRaw(op, expr))
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::cmp(field, CmpOp::Lt, value)
    }

    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::cmp(field, CmpOp::Le, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::cmp(field, CmpOp::Gt, value)
    }

    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::cmp(field, CmpOp::Ge, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::cmp(field, CmpOp::Ne, value)
    }

    pub fn between(field: impl Into<String>, lo: impl Into<Value>, hi: impl Into<Value>) -> Self {
        Self::new(field, Predicate::Between(lo.into(), hi.into()))
    }

    pub fn in_list<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::new(field, Predicate::In(values.into_iter().map(Into::into).collect()))
    }

    pub fn not_in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::new(field, Predicate::NotIn(values.into_iter().map(Into::into).collect()))
    }

    pub fn in_raw(field: impl Into<String>, expr: RawExpr) -> Self {
        Self::new(field, Predicate::InRaw(expr))
    }

    pub fn not_in_raw(field: impl Into<String>, expr: RawExpr) -> Self {
        Self::new(field, Predicate::NotInRaw(expr))
    }

    pub fn is_not(field: impl Into<String>, target: IsNotTarget) -> Self {
        Self::new(field, Predicate::IsNot(target))
    }

    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::is_not(field, IsNotTarget::Null)
    }

    /// A parenthesized SQL condition that is not tied to a field.
    pub fn sql(expr: RawExpr) -> Self {
        Self::new("", Predicate::Sql(expr))
    }

    /// Join this clause to the previous one with `OR`.
    pub fn or(mut self) -> Self {
        self.connective = Connective::Or;
        self
    }

    /// Join this clause to the previous one with `AND` (the default).
    pub fn and(mut self) -> Self {
        self.connective = Connective::And;
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn connective(&self) -> Connective {
        self.connective
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }
}

/// The accumulated WHERE intent of one query.
#[derive(Debug, Clone, PartialEq)]
pub enum WherePredicate {
    /// Caller-written SQL placed after `WHERE` unchanged.
    Raw(String),
    /// Structured clauses, compiled with placeholders.
    Clauses(Vec<WhereClause>),
}

impl Default for WherePredicate {
    fn default() -> Self {
        WherePredicate::Clauses(Vec::new())
    }
}

impl WherePredicate {
    /// `true` when compiling would produce no WHERE keyword.
    pub fn is_empty(&self) -> bool {
        match self {
            WherePredicate::Raw(s) => s.trim().is_empty(),
            WherePredicate::Clauses(c) => c.is_empty(),
        }
    }

    /// `true` when the predicate provably matches every row: it is empty, or
    /// one `OR`-separated group is made only of empty `NOT IN` lists (each
    /// compiled to `1=1`).
    pub fn is_unrestricted(&self) -> bool {
        let clauses = match self {
            WherePredicate::Raw(s) => return s.trim().is_empty(),
            WherePredicate::Clauses(c) if c.is_empty() => return true,
            WherePredicate::Clauses(c) => c,
        };

        let mut group_always_true = true;
        for (index, clause) in clauses.iter().enumerate() {
            if index > 0 && clause.connective() == Connective::Or {
                if group_always_true {
                    return true;
                }
                group_always_true = true;
            }
            let always_true = matches!(clause.predicate(), Predicate::NotIn(v) if v.is_empty());
            group_always_true &= always_true;
        }
        group_always_true
    }

    /// Append a clause. Non-empty raw SQL is kept as the first, parenthesized
    /// condition and the clause is joined after it.
    pub fn push(&mut self, clause: WhereClause) {
        match self {
            WherePredicate::Clauses(c) => c.push(clause),
            WherePredicate::Raw(s) if s.trim().is_empty() => {
                *self = WherePredicate::Clauses(vec![clause]);
            }
            WherePredicate::Raw(s) => {
                let kept = WhereClause::sql(raw(s.trim()));
                *self = WherePredicate::Clauses(vec![kept, clause]);
            }
        }
    }

    /// Build a predicate from the mapping/list shapes used by dynamic callers.
    ///
    /// Accepted forms:
    /// - `"x=1"` (raw SQL)
    /// - `[["a", 1], ["b", "OR", "<", 5], ["c", "BETWEEN", 1, 2]]`
    /// - `{"a": 1, "b": ["IN", [1, 2]], "c": ["OR", "IS NOT", "NULL"]}`
    ///
    /// String values starting with a backtick are raw fragments.
    pub fn from_json(value: Json) -> Result<Self, CompileError> {
        match value {
            Json::Null => Ok(WherePredicate::default()),
            Json::String(s) => Ok(WherePredicate::Raw(s)),
            Json::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| match item {
                    Json::Array(mut parts) if !parts.is_empty() => {
                        let field = match parts.remove(0) {
                            Json::String(f) => f,
                            other => {
                                return Err(CompileError::clause(
                                    index,
                                    other.to_string(),
                                    "field name must be a string",
                                ));
                            }
                        };
                        parse_clause(index, field, parts)
                    }
                    other => Err(CompileError::clause(
                        index,
                        "",
                        format!("expected [field, ...parts], got {other}"),
                    )),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(WherePredicate::Clauses),
            Json::Object(map) => map
                .into_iter()
                .enumerate()
                .map(|(index, (field, v))| match v {
                    Json::Array(parts) => parse_clause(index, field, parts),
                    scalar => parse_clause(index, field, vec![scalar]),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(WherePredicate::Clauses),
            other => Err(CompileError::clause(
                0,
                "",
                format!("where must be a string, list or object, got {other}"),
            )),
        }
    }
}

impl From<&str> for WherePredicate {
    fn from(s: &str) -> Self {
        WherePredicate::Raw(s.to_string())
    }
}

impl From<String> for WherePredicate {
    fn from(s: String) -> Self {
        WherePredicate::Raw(s)
    }
}

impl From<Vec<WhereClause>> for WherePredicate {
    fn from(clauses: Vec<WhereClause>) -> Self {
        WherePredicate::Clauses(clauses)
    }
}

impl From<WhereClause> for WherePredicate {
    fn from(clause: WhereClause) -> Self {
        WherePredicate::Clauses(vec![clause])
    }
}

fn marked_raw(v: &Json) -> Option<RawExpr> {
    v.as_str().and_then(RawExpr::parse_marked)
}

fn scalar(index: usize, field: &str, v: Json) -> Result<Value, CompileError> {
    match v {
        Json::Array(_) => Err(CompileError::clause(
            index,
            field,
            "list value requires IN or NOT IN",
        )),
        other => Ok(Value::from(other)),
    }
}

fn expect_arity(
    index: usize,
    field: &str,
    op: &str,
    rest: &[Json],
    want: usize,
) -> Result<(), CompileError> {
    if rest.len() == want {
        Ok(())
    } else {
        Err(CompileError::clause(
            index,
            field,
            format!("{op} expects {want} value(s), got {}", rest.len()),
        ))
    }
}

fn parse_clause(index: usize, field: String, parts: Vec<Json>) -> Result<WhereClause, CompileError> {
    if parts.is_empty() {
        return Err(CompileError::clause(index, field, "missing value"));
    }

    let mut parts = parts;
    let lead = match parts.first().and_then(Json::as_str) {
        Some(s) if parts.len() > 1 && s.eq_ignore_ascii_case("or") => Some(Connective::Or),
        Some(s) if parts.len() > 1 && s.eq_ignore_ascii_case("and") => Some(Connective::And),
        _ => None,
    };
    if lead.is_some() {
        parts.remove(0);
    }
    let predicate = parse_predicate(index, &field, parts)?;
    let mut clause = WhereClause::new(field, predicate);
    clause.connective = lead.unwrap_or_default();
    Ok(clause)
}

fn parse_predicate(index: usize, field: &str, mut parts: Vec<Json>) -> Result<Predicate, CompileError> {
    if parts.len() == 1 {
        let v = parts.remove(0);
        if let Some(expr) = marked_raw(&v) {
            return Ok(Predicate::EqRaw(expr));
        }
        return scalar(index, field, v).map(Predicate::Eq);
    }

    let op = match parts.remove(0) {
        Json::String(op) => op,
        other => {
            return Err(CompileError::clause(
                index,
                field,
                format!("expected an operator string, got {other}"),
            ));
        }
    };
    let rest = parts;

    // `["`ABS(?)", 2]`: a raw function compared for equality.
    if let Some(expr) = RawExpr::parse_marked(&op) {
        let args = rest
            .into_iter()
            .map(|v| scalar(index, field, v))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Predicate::EqRaw(expr.inline(args)));
    }

    let upper = op.trim().to_ascii_uppercase();
    match upper.as_str() {
        "=" => {
            expect_arity(index, field, "=", &rest, 1)?;
            let v = rest.into_iter().next().unwrap_or_default();
            match marked_raw(&v) {
                Some(expr) => Ok(Predicate::EqRaw(expr)),
                None => scalar(index, field, v).map(Predicate::Eq),
            }
        }
        "<" | "<=" | ">" | ">=" | "!=" | "<>" => {
            let cmp: CmpOp = upper
                .parse()
                .map_err(|e: CompileError| CompileError::clause(index, field, e.to_string()))?;
            let mut rest = rest.into_iter();
            let Some(v) = rest.next() else {
                return Err(CompileError::clause(index, field, format!("{op} expects 1 value, got 0")));
            };
            if let Some(expr) = marked_raw(&v) {
                let args = rest
                    .map(|a| scalar(index, field, a))
                    .collect::<Result<Vec<_>, _>>()?;
                return Ok(Predicate::CmpRaw(cmp, expr.inline(args)));
            }
            if rest.next().is_some() {
                return Err(CompileError::clause(
                    index,
                    field,
                    format!("{op} expects 1 value"),
                ));
            }
            scalar(index, field, v).map(|v| Predicate::Cmp(cmp, v))
        }
        "IN" | "NOT IN" => {
            expect_arity(index, field, &upper, &rest, 1)?;
            let negate = upper == "NOT IN";
            let v = rest.into_iter().next().unwrap_or_default();
            if let Some(expr) = marked_raw(&v) {
                return Ok(if negate {
                    Predicate::NotInRaw(expr)
                } else {
                    Predicate::InRaw(expr)
                });
            }
            let values = match v {
                Json::Array(items) => items
                    .into_iter()
                    .map(|i| scalar(index, field, i))
                    .collect::<Result<Vec<_>, _>>()?,
                single => vec![Value::from(single)],
            };
            Ok(if negate {
                Predicate::NotIn(values)
            } else {
                Predicate::In(values)
            })
        }
        "BETWEEN" => {
            expect_arity(index, field, "BETWEEN", &rest, 2)?;
            let mut rest = rest.into_iter();
            let lo = scalar(index, field, rest.next().unwrap_or_default())?;
            let hi = scalar(index, field, rest.next().unwrap_or_default())?;
            Ok(Predicate::Between(lo, hi))
        }
        "IS NOT" => {
            expect_arity(index, field, "IS NOT", &rest, 1)?;
            let target = match rest.into_iter().next().unwrap_or_default() {
                Json::Null => IsNotTarget::Null,
                Json::Bool(true) => IsNotTarget::True,
                Json::Bool(false) => IsNotTarget::False,
                Json::String(s) => match s.trim().to_ascii_uppercase().as_str() {
                    "NULL" => IsNotTarget::Null,
                    "TRUE" => IsNotTarget::True,
                    "FALSE" => IsNotTarget::False,
                    "UNKNOWN" => IsNotTarget::Unknown,
                    other => {
                        return Err(CompileError::clause(
                            index,
                            field,
                            format!("IS NOT expects NULL, TRUE, FALSE or UNKNOWN, got '{other}'"),
                        ));
                    }
                },
                other => {
                    return Err(CompileError::clause(
                        index,
                        field,
                        format!("IS NOT expects NULL, TRUE, FALSE or UNKNOWN, got {other}"),
                    ));
                }
            };
            Ok(Predicate::IsNot(target))
        }
        _ => Err(CompileError::clause(
            index,
            field,
            format!("unknown operator '{op}'"),
        )),
    }
}
