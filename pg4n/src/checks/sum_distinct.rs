use std::ops::ControlFlow;

use sqlparser::ast::{
    visit_expressions, DuplicateTreatment, Expr, Function, FunctionArguments, Statement,
};

use super::Checker;

const DISTINCT_SENSITIVE: [&str; 2] = ["SUM", "AVG"];

/// `SUM(DISTINCT ..)` and `AVG(DISTINCT ..)` silently drop repeated values.
pub struct SumDistinct;

impl Checker for SumDistinct {
    fn name(&self) -> &'static str {
        "SumDistinct"
    }

    fn check(&self, statement: &Statement) -> Option<String> {
        let found = visit_expressions(statement, |expr| match expr {
            Expr::Function(function) if is_distinct_aggregate(function) => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        });
        found.is_break().then(|| "DISTINCT in SUM or AVG".to_string())
    }
}

fn is_distinct_aggregate(function: &Function) -> bool {
    let is_sensitive = function.name.0.last().is_some_and(|ident| {
        DISTINCT_SENSITIVE
            .iter()
            .any(|name| ident.value.eq_ignore_ascii_case(name))
    });
    is_sensitive
        && matches!(
            &function.args,
            FunctionArguments::List(list)
                if matches!(list.duplicate_treatment, Some(DuplicateTreatment::Distinct))
        )
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::checks::check_sql;

    #[rstest]
    #[case::sum("SELECT SUM(DISTINCT order_total_eur) FROM orders;", true)]
    #[case::avg("SELECT avg(DISTINCT order_total_eur) FROM orders;", true)]
    #[case::nested(
        "SELECT * FROM customers WHERE id IN (SELECT customer_id FROM orders GROUP BY customer_id HAVING SUM(DISTINCT order_total_eur) > 10);",
        true
    )]
    #[case::count("SELECT COUNT(DISTINCT customer_id) FROM orders;", false)]
    #[case::plain_sum("SELECT SUM(order_total_eur) FROM orders;", false)]
    fn finds_distinct_aggregates(#[case] sql: &str, #[case] expected: bool) {
        assert_eq!(check_sql(&SumDistinct, sql).is_some(), expected);
    }
}
