use crate::parser::{
    CaseBranch, ColumnRef, Expression, FunctionArgs, FunctionCall, Literal, Statement,
};

/// Compares two expressions by structure.
///
/// Column names and function names are case-insensitive. Table qualifiers
/// must match exactly, so `t.a` and `a` are different expressions.
pub fn equals_expr(a: &Expression, b: &Expression) -> bool {
    match (a, b) {
        (Expression::Literal(a), Expression::Literal(b)) => equals_literal(a, b),
        (Expression::Column(a), Expression::Column(b)) => equals_column(a, b),
        (
            Expression::UnaryOp { op: a_op, expr: a },
            Expression::UnaryOp { op: b_op, expr: b },
        ) => a_op == b_op && equals_expr(a, b),
        (
            Expression::BinaryOp {
                op: a_op,
                lhs: a_lhs,
                rhs: a_rhs,
            },
            Expression::BinaryOp {
                op: b_op,
                lhs: b_lhs,
                rhs: b_rhs,
            },
        ) => a_op == b_op && equals_expr(a_lhs, b_lhs) && equals_expr(a_rhs, b_rhs),
        (
            Expression::Case {
                branches: a_branches,
                else_branch: a_else,
            },
            Expression::Case {
                branches: b_branches,
                else_branch: b_else,
            },
        ) => {
            a_branches.len() == b_branches.len()
                && a_branches
                    .iter()
                    .zip(b_branches)
                    .all(|(a, b)| equals_branch(a, b))
                && match (a_else, b_else) {
                    (Some(a), Some(b)) => equals_expr(a, b),
                    (None, None) => true,
                    _ => false,
                }
        }
        (Expression::Function(a), Expression::Function(b)) => equals_function(a, b),
        (Expression::Subquery(a), Expression::Subquery(b))
        | (Expression::Exists(a), Expression::Exists(b)) => equals_query(a, b),
        (Expression::Argument(a), Expression::Argument(b)) => a == b,
        _ => false,
    }
}

fn equals_literal(a: &Literal, b: &Literal) -> bool {
    match (a, b) {
        // NaN equals itself here, unlike in SQL.
        (Literal::Real(a), Literal::Real(b)) => a.to_bits() == b.to_bits(),
        _ => a == b,
    }
}

fn equals_column(a: &ColumnRef, b: &ColumnRef) -> bool {
    a.table_name == b.table_name && a.column_name.eq_ignore_ascii_case(&b.column_name)
}

fn equals_branch(a: &CaseBranch, b: &CaseBranch) -> bool {
    equals_expr(&a.condition, &b.condition) && equals_expr(&a.result, &b.result)
}

fn equals_function(a: &FunctionCall, b: &FunctionCall) -> bool {
    if !a.name.eq_ignore_ascii_case(&b.name) || a.distinct != b.distinct {
        return false;
    }
    match (&a.args, &b.args) {
        (FunctionArgs::Wildcard, FunctionArgs::Wildcard) => true,
        (FunctionArgs::Expressions(a), FunctionArgs::Expressions(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| equals_expr(a, b))
        }
        _ => false,
    }
}

// Subqueries are opaque to the planner; their canonical rendering is
// enough to tell them apart.
fn equals_query(a: &Statement, b: &Statement) -> bool {
    a.to_string() == b.to_string()
}

/// Whether `expr` itself is an aggregate function call.
pub fn is_aggregation(expr: &Expression) -> bool {
    matches!(expr, Expression::Function(function_call) if function_call.is_aggregate())
}

/// Whether `expr` has an aggregate function call anywhere outside of
/// subqueries.
pub fn contains_aggregation(expr: &Expression) -> bool {
    expr.walk(&mut |node| {
        if is_aggregation(node) {
            Err(())
        } else {
            Ok(true)
        }
    })
    .is_err()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn expr(sql: &str) -> Expression {
        Parser::new(sql).parse_expr().unwrap()
    }

    #[test]
    fn equality_ignores_formatting_but_not_qualifiers() {
        assert!(equals_expr(&expr("A + 1"), &expr("a+1")));
        assert!(equals_expr(&expr("COUNT(*)"), &expr("count( * )")));
        assert!(equals_expr(&expr("(a)"), &expr("a")));
        assert!(!equals_expr(&expr("t.a"), &expr("a")));
        assert!(!equals_expr(&expr("count(a)"), &expr("count(distinct a)")));
        assert!(!equals_expr(&expr("a + b"), &expr("b + a")));
        assert!(!equals_expr(&expr("'a'"), &expr("a")));
    }

    #[test]
    fn aggregation_is_found_below_the_root() {
        assert!(is_aggregation(&expr("max(a)")));
        assert!(!is_aggregation(&expr("max(a) + 1")));
        assert!(contains_aggregation(&expr("max(a) + 1")));
        assert!(contains_aggregation(&expr("case when a then sum(b) end")));
        assert!(!contains_aggregation(&expr("concat(a, b)")));
        assert!(!contains_aggregation(&expr("(select count(*) from t)")));
    }
}
