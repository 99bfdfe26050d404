//! Extraction of psql's syntax error report.
//!
//! ```text
//! ERROR:  syntax error at or near "SELEC"
//! LINE 1: SELEC * FROM orders;
//!         ^
//! ```

pub const ERROR_TOKEN: &str = "ERROR:";

/// Returns the last error block on the screen, from `ERROR:` down to and
/// including the `^` marker that points at the offending token.
///
/// Only a `^` standing alone on its line counts as the marker, so carets
/// inside SQL text or in a single-line mode prompt are ignored. A marker
/// followed by a later `ERROR:` belongs to an older report and is not
/// returned.
#[must_use]
pub fn last_syntax_error(screen: &str) -> Option<&str> {
    let caret = screen
        .rmatch_indices('^')
        .map(|(pos, _)| pos)
        .find(|&pos| is_marker_line(screen, pos))?;
    if screen[caret..].contains(ERROR_TOKEN) {
        return None;
    }
    let error = screen[..caret].rfind(ERROR_TOKEN)?;
    Some(&screen[error..=caret])
}

fn is_marker_line(screen: &str, caret: usize) -> bool {
    let start = screen[..caret].rfind('\n').map_or(0, |pos| pos + 1);
    let end = screen[caret..].find('\n').map_or(screen.len(), |pos| caret + pos);
    screen[start..end].trim() == "^"
}
