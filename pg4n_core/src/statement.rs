//! Extraction of the last submitted statement from the rendered screen.

use crate::prompt::{continuation_variants, line_prompt, PromptKind};

/// Statement keywords worth sending to analysis.
pub const ANALYZED_KEYWORDS: &[&str] = &["SELECT"];

/// Returns the most recent statement on the screen.
///
/// The screen text must end with the statement's `;` (trailing whitespace
/// is ignored). The statement starts behind the nearest fresh prompt above
/// it; continuation prompts on the following lines are stripped and line
/// breaks fold into single spaces. Statements that do not start with one of
/// [`ANALYZED_KEYWORDS`] yield `None`.
#[must_use]
pub fn last_statement(screen: &str) -> Option<String> {
    let text = screen.trim_end();
    if !text.ends_with(';') {
        return None;
    }

    let lines: Vec<&str> = text.split('\n').collect();
    let (first, prompt) = lines.iter().enumerate().rev().find_map(|(idx, line)| {
        line_prompt(line)
            .filter(|prompt| prompt.kind == PromptKind::Fresh)
            .map(|prompt| (idx, prompt))
    })?;

    let variants = continuation_variants();
    let mut body = String::from(&lines[first][prompt.len..]);
    for line in &lines[first + 1..] {
        body.push(' ');
        body.push_str(strip_continuation_prompt(line, prompt.database, &variants));
    }

    let body = body.trim_start();
    is_analyzed(body).then(|| body.to_string())
}

fn strip_continuation_prompt<'a>(line: &'a str, database: &str, variants: &[String]) -> &'a str {
    line.strip_prefix(database)
        .and_then(|rest| {
            variants
                .iter()
                .filter_map(|variant| rest.strip_prefix(variant.as_str()))
                .next()
        })
        .unwrap_or(line)
}

fn is_analyzed(statement: &str) -> bool {
    ANALYZED_KEYWORDS.iter().any(|keyword| {
        statement
            .get(..keyword.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(keyword))
            && !statement[keyword.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const BANNER: &str = "psql (14.5)\nType \"help\" for help.\n\n";

    #[rstest]
    #[case::single_line(
        format!("{BANNER}pgdb=# SELECT * FROM orders;"),
        Some("SELECT * FROM orders;")
    )]
    #[case::most_recent_of_two(
        format!("{BANNER}pgdb=# SELECT * FROM orders;\n order_id\n----------\n(0 rows)\n\npgdb=# SELECT * FROM customers;"),
        Some("SELECT * FROM customers;")
    )]
    #[case::many_trailing_newlines(
        format!("{BANNER}pgdb=# SELECT * FROM orders;{}", "\n".repeat(70)),
        Some("SELECT * FROM orders;")
    )]
    #[case::wrapped_line(
        format!("{BANNER}pgdb=# SELECT * FROM orders WHERE\norder_total_eur = 100;\n\n\n"),
        Some("SELECT * FROM orders WHERE order_total_eur = 100;")
    )]
    #[case::insert_after_select(
        format!("{BANNER}pgdb=# SELECT * FROM orders;\n(0 rows)\n\npgdb=# INSERT INTO orders VALUES (1, 2, 3);"),
        None
    )]
    #[case::extra_whitespace(
        format!("{BANNER}pgdb=#   SELECT    * FROM\n  orders    WHERE order_total_eur = 100   ; "),
        Some("SELECT    * FROM   orders    WHERE order_total_eur = 100   ;")
    )]
    #[case::continuation_prompt(
        format!("{BANNER}pgdb=# SELECT * FROM\npgdb-# orders;"),
        Some("SELECT * FROM  orders;")
    )]
    #[case::continuation_in_transaction(
        "pgdb=*# select a\npgdb-*# from t\npgdb(*# ;".to_string(),
        Some("select a  from t  ;")
    )]
    #[case::database_name_with_dash(
        format!("{BANNER}my-db=> SELECT * FROM orders;"),
        Some("SELECT * FROM orders;")
    )]
    #[case::continuation_with_dashed_database(
        "my-db=> SELECT *\nmy-db-> FROM orders;".to_string(),
        Some("SELECT *  FROM orders;")
    )]
    #[case::dotted_database("shop.eu=# SELECT 1;".to_string(), Some("SELECT 1;"))]
    #[case::lowercase("pgdb=> select 1;".to_string(), Some("select 1;"))]
    #[case::no_semicolon(format!("{BANNER}pgdb=# SELECT * FROM orders"), None)]
    #[case::no_prompt("SELECT * FROM orders;".to_string(), None)]
    #[case::keyword_prefix_only("pgdb=# SELECTED;".to_string(), None)]
    #[case::empty(String::new(), None)]
    fn extracts_last_statement(#[case] screen: String, #[case] expected: Option<&str>) {
        assert_eq!(last_statement(&screen).as_deref(), expected);
    }

    #[test]
    fn keeps_text_that_only_resembles_a_continuation_prompt() {
        let screen = "pgdb=# SELECT x\nother-# y;";
        assert_eq!(last_statement(screen).as_deref(), Some("SELECT x other-# y;"));
    }
}
