//! Join, ORDER BY and GROUP BY fragments. None of these bind parameters.

use crate::condition::Condition;

/// `INNER JOIN t ON ...`; inner wins over left, left over right.
pub fn join(cond: &Condition) -> String {
    match cond.active_join() {
        Some((kind, table)) => format!("{} {} ON {}", kind.keyword(), table, cond.on().trim()),
        None => String::new(),
    }
}

/// `ORDER BY <expr>` verbatim.
pub fn order_by(cond: &Condition) -> String {
    keyword_fragment("ORDER BY", cond.order_by())
}

/// `GROUP BY <expr>` verbatim.
pub fn group_by(cond: &Condition) -> String {
    keyword_fragment("GROUP BY", cond.group_by())
}

fn keyword_fragment(keyword: &str, expr: &str) -> String {
    let expr = expr.trim();
    if expr.is_empty() {
        String::new()
    } else {
        format!("{keyword} {expr}")
    }
}
