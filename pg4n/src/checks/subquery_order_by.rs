use std::ops::ControlFlow;

use sqlparser::ast::{Query, Statement, Visit, Visitor};

use super::Checker;

/// `ORDER BY` inside a subquery has no effect on the outer result unless
/// it is paired with a row limit.
pub struct SubqueryOrderBy;

impl Checker for SubqueryOrderBy {
    fn name(&self) -> &'static str {
        "SubqueryOrderBy"
    }

    fn check(&self, statement: &Statement) -> Option<String> {
        let mut finder = NestedOrderBy::default();
        statement.visit(&mut finder).is_break().then(|| "ORDER BY in a subquery".to_string())
    }
}

#[derive(Default)]
struct NestedOrderBy {
    depth: usize,
}

impl Visitor for NestedOrderBy {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        self.depth += 1;
        if self.depth > 1 && is_unlimited_ordering(query) {
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, _query: &Query) -> ControlFlow<Self::Break> {
        self.depth -= 1;
        ControlFlow::Continue(())
    }
}

fn is_unlimited_ordering(query: &Query) -> bool {
    query.order_by.iter().next().is_some()
        && query.limit.is_none()
        && query.offset.is_none()
        && query.fetch.is_none()
}
