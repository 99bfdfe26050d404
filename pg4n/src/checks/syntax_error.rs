//! Keyword suggestions for psql syntax errors.

use std::sync::OnceLock;

use regex::Regex;

/// Name used in warnings and to toggle the advisor in the config.
pub const SYNTAX_ERROR_CHECK: &str = "SyntaxError";

const MAX_DISTANCE: usize = 2;

const KEYWORDS: &[&str] = &[
    "ALTER", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CREATE", "CROSS", "DELETE", "DESC",
    "DISTINCT", "DROP", "ELSE", "END", "EXCEPT", "EXISTS", "FROM", "FULL", "GROUP", "HAVING",
    "ILIKE", "INNER", "INSERT", "INTERSECT", "INTO", "JOIN", "LEFT", "LIKE", "LIMIT", "NOT",
    "NULL", "OFFSET", "ON", "OR", "ORDER", "OUTER", "RETURNING", "RIGHT", "SELECT", "SET",
    "TABLE", "THEN", "UNION", "UPDATE", "USING", "VALUES", "WHEN", "WHERE", "WITH",
];

fn near_token() -> &'static Regex {
    static NEAR_TOKEN: OnceLock<Regex> = OnceLock::new();
    NEAR_TOKEN.get_or_init(|| Regex::new(r#"at or near "([^"]*)""#).unwrap())
}

/// Returns `(keyword, token)` when the token psql complained about is a
/// likely misspelling of a keyword.
#[must_use]
pub fn suggest_keyword(error: &str) -> Option<(&'static str, &str)> {
    let token = near_token().captures(error)?.get(1)?.as_str();
    if token.chars().count() < 2 || !token.chars().all(char::is_alphabetic) {
        return None;
    }
    let upper = token.to_uppercase();
    if KEYWORDS.contains(&upper.as_str()) {
        return None;
    }
    let allowed = if upper.chars().count() <= 3 {
        1
    } else {
        MAX_DISTANCE
    };

    KEYWORDS
        .iter()
        .map(|keyword| (*keyword, edit_distance(&upper, keyword)))
        .filter(|(_, distance)| *distance <= allowed)
        .min_by_key(|(_, distance)| *distance)
        .map(|(keyword, _)| (keyword, token))
}

/// Levenshtein distance over chars.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}
