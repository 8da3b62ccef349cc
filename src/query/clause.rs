//! WHERE/HAVING conditions and JOIN clauses.
//!
//! Conditions render with `?` markers; the builder rewrites them to the
//! dialect's placeholders once the whole statement is assembled.

use crate::dialect::Dialect;
use crate::models::value::Value;

/// How a condition combines its expression and values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Expression text with its own `?` markers
    Raw,
    In,
    NotIn,
    Between,
    IsNull,
    IsNotNull,
}

/// One AND-joined condition.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryCondition {
    pub expr: String,
    pub op: Operator,
    pub values: Vec<Value>,
}

impl QueryCondition {
    pub fn raw(expr: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            expr: expr.into(),
            op: Operator::Raw,
            values,
        }
    }

    pub fn new(column: impl Into<String>, op: Operator, values: Vec<Value>) -> Self {
        Self {
            expr: column.into(),
            op,
            values,
        }
    }

    /// Append this condition's SQL to `sql` and its arguments to `args`.
    pub fn render(&self, sql: &mut String, args: &mut Vec<Value>) {
        match self.op {
            Operator::Raw => sql.push_str(&self.expr),
            Operator::In | Operator::NotIn if self.values.is_empty() => {
                // constant predicate, no placeholders
                sql.push_str(if self.op == Operator::In { "1=0" } else { "1=1" });
                return;
            }
            Operator::In | Operator::NotIn => {
                let keyword = if self.op == Operator::In { "IN" } else { "NOT IN" };
                let markers = vec!["?"; self.values.len()].join(", ");
                sql.push_str(&format!("{} {} ({})", self.expr, keyword, markers));
            }
            Operator::Between => sql.push_str(&format!("{} BETWEEN ? AND ?", self.expr)),
            Operator::IsNull => sql.push_str(&format!("{} IS NULL", self.expr)),
            Operator::IsNotNull => sql.push_str(&format!("{} IS NOT NULL", self.expr)),
        }
        args.extend(self.values.iter().cloned());
    }
}

/// Render conditions joined by AND.
pub fn render_conditions(conditions: &[QueryCondition], sql: &mut String, args: &mut Vec<Value>) {
    for (i, condition) in conditions.iter().enumerate() {
        if i > 0 {
            sql.push_str(" AND ");
        }
        condition.render(sql, args);
    }
}

/// Count `?` markers outside quoted text, using the dialect's quoting rules.
pub fn count_markers(dialect: Dialect, expr: &str) -> usize {
    dialect.marker_offsets(expr).len()
}

/// Parenthesise a raw condition whose top-level OR would otherwise bind
/// looser than the AND joining it to its neighbours.
pub fn group_raw(dialect: Dialect, expr: &str) -> String {
    if dialect.has_top_level_or(expr) {
        format!("({})", expr)
    } else {
        expr.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Join,
    Left,
    Right,
    Inner,
}

impl JoinKind {
    fn keyword(self) -> &'static str {
        match self {
            JoinKind::Join => "JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Inner => "INNER JOIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub on: String,
}

impl Join {
    pub fn render(&self) -> String {
        format!(" {} {} ON {}", self.kind.keyword(), self.table, self.on)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(conditions: &[QueryCondition]) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut args = Vec::new();
        render_conditions(conditions, &mut sql, &mut args);
        (sql, args)
    }

    #[test]
    fn test_in_expands_one_marker_per_value() {
        let (sql, args) = render(&[QueryCondition::new(
            "role",
            Operator::In,
            vec![Value::from("a"), Value::from("b"), Value::from("c")],
        )]);
        assert_eq!(sql, "role IN (?, ?, ?)");
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn test_empty_in_lists_are_constant() {
        let (sql, args) = render(&[
            QueryCondition::new("a", Operator::In, vec![]),
            QueryCondition::new("b", Operator::NotIn, vec![]),
        ]);
        assert_eq!(sql, "1=0 AND 1=1");
        assert!(args.is_empty());
    }

    #[test]
    fn test_between_and_null_checks() {
        let (sql, args) = render(&[
            QueryCondition::new("age", Operator::Between, vec![Value::Int(1), Value::Int(9)]),
            QueryCondition::new("deleted_at", Operator::IsNull, vec![]),
            QueryCondition::new("email", Operator::IsNotNull, vec![]),
        ]);
        assert_eq!(
            sql,
            "age BETWEEN ? AND ? AND deleted_at IS NULL AND email IS NOT NULL"
        );
        assert_eq!(args, vec![Value::Int(1), Value::Int(9)]);
    }

    #[test]
    fn test_count_markers_skips_quotes() {
        assert_eq!(count_markers(Dialect::MySql, "a = ? AND b = '?' AND c = ?"), 2);
        assert_eq!(count_markers(Dialect::MySql, "`we?ird` = ?"), 1);
        assert_eq!(count_markers(Dialect::Postgres, "no markers"), 0);
    }

    #[test]
    fn test_count_markers_honours_mysql_backslash_escape() {
        assert_eq!(count_markers(Dialect::MySql, "a = 'it\\'s' AND b = ?"), 1);
        assert_eq!(count_markers(Dialect::Sqlite, "a = 'it''s' AND b = ?"), 1);
    }

    #[test]
    fn test_count_markers_agrees_with_placeholder_rewrite() {
        let expr = "a = ? AND tags[?] = ? AND `x` = '?'";
        let rewritten = Dialect::Postgres.bind_placeholders(expr);
        assert_eq!(count_markers(Dialect::Postgres, expr), 3);
        assert!(rewritten.contains("$3"));
        assert!(!rewritten.contains("$4"));
    }

    #[test]
    fn test_group_raw_wraps_only_top_level_or() {
        assert_eq!(group_raw(Dialect::MySql, "age > ?"), "age > ?");
        assert_eq!(group_raw(Dialect::MySql, "a = ? OR b = ?"), "(a = ? OR b = ?)");
        assert_eq!(group_raw(Dialect::MySql, "(a = ? OR b = ?)"), "(a = ? OR b = ?)");
    }

    #[test]
    fn test_join_render() {
        let join = Join {
            kind: JoinKind::Left,
            table: "orders o".into(),
            on: "o.user_id = users.id".into(),
        };
        assert_eq!(join.render(), " LEFT JOIN orders o ON o.user_id = users.id");
    }
}
