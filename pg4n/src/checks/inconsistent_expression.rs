//! Conjunctions that no row can satisfy, such as `x = 10 AND x = 20` or
//! `x > 5 AND x < 3`.
//!
//! Only comparisons of a column against a literal inside one `AND` chain are
//! considered. Anything under `OR` or `NOT` is left alone.

use std::{collections::BTreeMap, ops::ControlFlow};

use sqlparser::ast::{
    visit_expressions, BinaryOperator, Expr, Ident, Statement, UnaryOperator, Value,
};

use super::Checker;

pub struct InconsistentExpression;

impl Checker for InconsistentExpression {
    fn name(&self) -> &'static str {
        "InconsistentExpression"
    }

    fn check(&self, statement: &Statement) -> Option<String> {
        let found = visit_expressions(statement, |expr| {
            if is_conjunction(expr) && is_contradiction(expr) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        found.is_break().then(|| "Some condition is always false".to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Number(f64),
    Text(String),
}

/// Everything known about one column within a conjunction.
#[derive(Debug, Default)]
struct Constraint {
    equal: Vec<Literal>,
    not_equal: Vec<Literal>,
    lower: Option<(f64, bool)>,
    upper: Option<(f64, bool)>,
}

impl Constraint {
    fn add(&mut self, op: &BinaryOperator, literal: Literal) {
        match (op, &literal) {
            (BinaryOperator::Eq, _) => self.equal.push(literal),
            (BinaryOperator::NotEq, _) => self.not_equal.push(literal),
            (BinaryOperator::Gt, Literal::Number(n)) => self.raise_lower(*n, false),
            (BinaryOperator::GtEq, Literal::Number(n)) => self.raise_lower(*n, true),
            (BinaryOperator::Lt, Literal::Number(n)) => self.lower_upper(*n, false),
            (BinaryOperator::LtEq, Literal::Number(n)) => self.lower_upper(*n, true),
            _ => {}
        }
    }

    fn raise_lower(&mut self, bound: f64, inclusive: bool) {
        let tighter = self.lower.is_none_or(|(current, current_inclusive)| {
            bound > current || (bound == current && !inclusive && current_inclusive)
        });
        if tighter {
            self.lower = Some((bound, inclusive));
        }
    }

    fn lower_upper(&mut self, bound: f64, inclusive: bool) {
        let tighter = self.upper.is_none_or(|(current, current_inclusive)| {
            bound < current || (bound == current && !inclusive && current_inclusive)
        });
        if tighter {
            self.upper = Some((bound, inclusive));
        }
    }

    fn admits(&self, value: &Literal) -> bool {
        if self.not_equal.contains(value) {
            return false;
        }
        let Literal::Number(n) = value else {
            return true;
        };
        let above = self
            .lower
            .is_none_or(|(bound, inclusive)| *n > bound || (inclusive && *n == bound));
        let below = self
            .upper
            .is_none_or(|(bound, inclusive)| *n < bound || (inclusive && *n == bound));
        above && below
    }

    fn is_unsatisfiable(&self) -> bool {
        if let Some(first) = self.equal.first() {
            return self.equal.iter().any(|other| other != first) || !self.admits(first);
        }
        match (self.lower, self.upper) {
            (Some((low, low_inclusive)), Some((high, high_inclusive))) => {
                low > high || (low == high && !(low_inclusive && high_inclusive))
            }
            _ => false,
        }
    }
}

fn is_conjunction(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::BinaryOp {
            op: BinaryOperator::And,
            ..
        }
    )
}

/// Evaluated once per `AND` chain, at its outermost node.
fn is_contradiction(expr: &Expr) -> bool {
    let mut terms = Vec::new();
    flatten_and(expr, &mut terms);

    let mut columns: BTreeMap<String, Constraint> = BTreeMap::new();
    for term in terms {
        if let Some((column, op, literal)) = comparison(term) {
            columns.entry(column).or_default().add(&op, literal);
        }
    }
    columns.values().any(Constraint::is_unsatisfiable)
}

fn flatten_and<'a>(expr: &'a Expr, out: &mut Vec<&'a Expr>) {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            flatten_and(left, out);
            flatten_and(right, out);
        }
        Expr::Nested(inner) => flatten_and(inner, out),
        other => out.push(other),
    }
}

/// `column <op> literal`, normalized so the column is on the left.
fn comparison(expr: &Expr) -> Option<(String, BinaryOperator, Literal)> {
    let Expr::BinaryOp { left, op, right } = expr else {
        return None;
    };
    if let (Some(column), Some(literal)) = (column_name(left), literal(right)) {
        return Some((column, op.clone(), literal));
    }
    let (column, literal) = (column_name(right)?, literal(left)?);
    let flipped = match op {
        BinaryOperator::Gt => BinaryOperator::Lt,
        BinaryOperator::GtEq => BinaryOperator::LtEq,
        BinaryOperator::Lt => BinaryOperator::Gt,
        BinaryOperator::LtEq => BinaryOperator::GtEq,
        other => other.clone(),
    };
    Some((column, flipped, literal))
}

fn column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(normalize(ident)),
        Expr::CompoundIdentifier(parts) => Some(
            parts
                .iter()
                .map(normalize)
                .collect::<Vec<_>>()
                .join("."),
        ),
        Expr::Nested(inner) => column_name(inner),
        _ => None,
    }
}

fn normalize(ident: &Ident) -> String {
    if ident.quote_style.is_some() {
        ident.value.clone()
    } else {
        ident.value.to_lowercase()
    }
}

fn literal(expr: &Expr) -> Option<Literal> {
    match expr {
        Expr::Value(Value::Number(number, _)) => number.parse().ok().map(Literal::Number),
        Expr::Value(Value::SingleQuotedString(text)) => Some(Literal::Text(text.clone())),
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => match literal(expr)? {
            Literal::Number(n) => Some(Literal::Number(-n)),
            Literal::Text(_) => None,
        },
        Expr::Nested(inner) => literal(inner),
        _ => None,
    }
}
