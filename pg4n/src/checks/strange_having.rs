use std::ops::ControlFlow;

use sqlparser::ast::{GroupByExpr, Query, Select, SetExpr, Statement, Visit, Visitor};

use super::Checker;

/// `HAVING` on a query that never groups.
pub struct StrangeHaving;

impl Checker for StrangeHaving {
    fn name(&self) -> &'static str {
        "StrangeHaving"
    }

    fn check(&self, statement: &Statement) -> Option<String> {
        statement
            .visit(&mut UngroupedHaving)
            .is_break()
            .then(|| "HAVING without GROUP BY".to_string())
    }
}

struct UngroupedHaving;

impl Visitor for UngroupedHaving {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        let mut selects = Vec::new();
        collect_selects(&query.body, &mut selects);
        if selects.into_iter().any(has_ungrouped_having) {
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }
}

/// Every `SELECT` block of a body, through set operations.
pub(super) fn collect_selects<'a>(body: &'a SetExpr, out: &mut Vec<&'a Select>) {
    match body {
        SetExpr::Select(select) => out.push(select),
        SetExpr::SetOperation { left, right, .. } => {
            collect_selects(left, out);
            collect_selects(right, out);
        }
        _ => {}
    }
}

fn has_ungrouped_having(select: &Select) -> bool {
    select.having.is_some()
        && matches!(&select.group_by, GroupByExpr::Expressions(exprs, ..) if exprs.is_empty())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::checks::check_sql;

    #[rstest]
    #[case::plain("SELECT COUNT(*) FROM orders HAVING COUNT(*) > 1;", true)]
    #[case::in_union(
        "SELECT 1 FROM orders UNION SELECT COUNT(*) FROM customers HAVING COUNT(*) > 0;",
        true
    )]
    #[case::in_subquery(
        "SELECT * FROM (SELECT SUM(order_total_eur) s FROM orders HAVING SUM(order_total_eur) > 0) t;",
        true
    )]
    #[case::grouped(
        "SELECT customer_id FROM orders GROUP BY customer_id HAVING COUNT(*) > 1;",
        false
    )]
    #[case::no_having("SELECT * FROM orders;", false)]
    fn finds_having_without_group_by(#[case] sql: &str, #[case] expected: bool) {
        assert_eq!(check_sql(&StrangeHaving, sql).is_some(), expected);
    }
}
