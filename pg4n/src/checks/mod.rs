//! SQL checks behind the [`Analyzer`] hooks.
//!
//! Each [`Checker`] looks at the parsed statement for one kind of likely
//! mistake. The [`Router`] runs the enabled checkers in a fixed order and
//! reports the first finding.

mod eq_wildcard;
mod inconsistent_expression;
mod strange_having;
mod subquery_order_by;
mod sum_distinct;
mod syntax_error;

use sqlparser::{ast::Statement, dialect::PostgreSqlDialect, parser::Parser};
use tracing::debug;

pub use self::{
    eq_wildcard::EqWildcard, inconsistent_expression::InconsistentExpression,
    strange_having::StrangeHaving, subquery_order_by::SubqueryOrderBy, sum_distinct::SumDistinct,
    syntax_error::{suggest_keyword, SYNTAX_ERROR_CHECK},
};
use crate::{
    config::Settings,
    controller::Analyzer,
    error::{Error, Result},
};

/// A single AST pattern check.
pub trait Checker: Send + Sync {
    /// Stable name used in warnings and to toggle the check in the config.
    fn name(&self) -> &'static str;

    /// Returns the warning message when the statement trips the check.
    fn check(&self, statement: &Statement) -> Option<String>;
}

/// All checkers in the order their findings take priority.
#[must_use]
pub fn all_checkers() -> Vec<Box<dyn Checker>> {
    vec![
        Box::new(SubqueryOrderBy),
        Box::new(StrangeHaving),
        Box::new(SumDistinct),
        Box::new(EqWildcard),
        Box::new(InconsistentExpression),
    ]
}

/// `Warning: <message> [pg4n::<name>]`
#[must_use]
pub fn format_warning(message: &str, name: &str) -> String {
    format!("Warning: {message} [pg4n::{name}]")
}

/// Parses a statement with the PostgreSQL dialect.
///
/// # Errors
/// Returns [`Error::Analysis`] when the text does not parse.
pub fn parse(sql: &str) -> Result<Vec<Statement>> {
    Parser::parse_sql(&PostgreSqlDialect {}, sql).map_err(|e| Error::Analysis(e.to_string()))
}

/// Runs the enabled checkers against submitted statements.
pub struct Router {
    checkers: Vec<Box<dyn Checker>>,
    syntax_advice: bool,
}

impl Router {
    /// Keeps the checkers the settings do not disable.
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        let checkers: Vec<Box<dyn Checker>> = all_checkers()
            .into_iter()
            .filter(|checker| settings.is_check_enabled(checker.name()))
            .collect();
        debug!(
            checkers = ?checkers.iter().map(|c| c.name()).collect::<Vec<_>>(),
            "[pg4n] enabled checkers"
        );
        Self {
            checkers,
            syntax_advice: settings.is_check_enabled(SYNTAX_ERROR_CHECK),
        }
    }

    #[must_use]
    pub fn checker_names(&self) -> Vec<&'static str> {
        self.checkers.iter().map(|checker| checker.name()).collect()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}

impl Analyzer for Router {
    fn analyze(&self, sql: &str) -> Result<String> {
        let statements = parse(sql)?;
        let warning = self.checkers.iter().find_map(|checker| {
            statements
                .iter()
                .find_map(|statement| checker.check(statement))
                .map(|message| format_warning(&message, checker.name()))
        });
        Ok(warning.unwrap_or_default())
    }

    fn analyze_syntax_error(&self, error: &str) -> Result<String> {
        if !self.syntax_advice {
            return Ok(String::new());
        }
        Ok(suggest_keyword(error)
            .map(|(keyword, token)| {
                format_warning(
                    &format!("Did you mean '{keyword}' instead of '{token}'?"),
                    SYNTAX_ERROR_CHECK,
                )
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
pub(crate) fn check_sql(checker: &dyn Checker, sql: &str) -> Option<String> {
    parse(sql)
        .expect("valid sql")
        .iter()
        .find_map(|statement| checker.check(statement))
}
