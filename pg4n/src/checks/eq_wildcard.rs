use std::ops::ControlFlow;

use sqlparser::ast::{visit_expressions, BinaryOperator, Expr, Statement, Value};

use super::Checker;

/// `=` compared against a string literal that looks like a `LIKE` pattern.
pub struct EqWildcard;

impl Checker for EqWildcard {
    fn name(&self) -> &'static str {
        "EqWildcard"
    }

    fn check(&self, statement: &Statement) -> Option<String> {
        let found = visit_expressions(statement, |expr| match expr {
            Expr::BinaryOp {
                left,
                op: BinaryOperator::Eq,
                right,
            } if is_wildcard_literal(left) || is_wildcard_literal(right) => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        });
        found
            .is_break()
            .then(|| "Possible use of '=' instead of % for wildcard pattern".to_string())
    }
}

fn is_wildcard_literal(expr: &Expr) -> bool {
    matches!(expr, Expr::Value(Value::SingleQuotedString(text)) if text.contains('%'))
}
