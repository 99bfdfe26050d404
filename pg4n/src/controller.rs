//! Interception of psql output.
//!
//! The [`Controller`] sees every chunk psql writes, mirrors it on a
//! [`ScreenModel`], notices when the user submitted a statement, asks the
//! [`Analyzer`] about it and splices the resulting warning in front of the
//! next fresh prompt. Whatever goes wrong along the way, the chunk is passed
//! through untouched.

use std::panic::{self, AssertUnwindSafe};

use pg4n_core::{
    find_fresh_prompt, has_prompt, inject, last_statement, last_syntax_error, return_keypress,
    syntax_error::ERROR_TOKEN,
};
use tracing::{debug, warn};

use crate::{
    error::Result,
    screen::{ScreenModel, TerminalSize},
    transcript::Transcript,
};

/// Produces warnings for submitted statements and syntax errors. An empty
/// string means nothing to report.
pub trait Analyzer {
    /// Analyze a complete `SELECT` statement.
    ///
    /// # Errors
    /// Any error is logged by the caller and treated as "no warning".
    fn analyze(&self, sql: &str) -> Result<String>;

    /// Analyze a psql error report, from `ERROR:` down to its `^` marker.
    ///
    /// # Errors
    /// Any error is logged by the caller and treated as "no warning".
    fn analyze_syntax_error(&self, error: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Where the controller is between two prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the user to submit something.
    Idle,
    /// A statement was submitted; no warning is waiting for the prompt.
    PendingReturn,
    /// A warning waits for the next fresh prompt.
    PendingPrompt,
}

impl Phase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::PendingReturn => "pending-return",
            Self::PendingPrompt => "pending-prompt",
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct Controller<'a> {
    analyzer: &'a dyn Analyzer,
    screen: ScreenModel,
    phase: Phase,
    pending: Option<String>,
    /// `ERROR:` showed up since the last Return.
    error_seen: bool,
    /// A prompt was shown since the last Return, so the next line break at
    /// the start of a chunk is the user's and not part of a result.
    prompt_seen: bool,
    transcript: Option<Transcript>,
}

impl<'a> Controller<'a> {
    #[must_use]
    pub fn new(analyzer: &'a dyn Analyzer, size: TerminalSize) -> Self {
        Self {
            analyzer,
            screen: ScreenModel::new(size),
            phase: Phase::Idle,
            pending: None,
            error_seen: false,
            prompt_seen: false,
            transcript: None,
        }
    }

    #[must_use]
    pub fn with_transcript(mut self, transcript: Option<Transcript>) -> Self {
        self.transcript = transcript;
        self
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn pending_warning(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    #[must_use]
    pub const fn screen(&self) -> &ScreenModel {
        &self.screen
    }

    /// Process one chunk of psql output and return the bytes to show.
    pub fn process(&mut self, chunk: &[u8]) -> Vec<u8> {
        let output = self.transform(chunk);
        self.record(chunk, &output);
        output
    }

    fn transform(&mut self, chunk: &[u8]) -> Vec<u8> {
        // Single bytes are keystroke echo.
        if chunk.len() <= 1 {
            self.screen.feed(chunk);
            return chunk.to_vec();
        }

        // The screen has to show the submitted line before it is read, so
        // everything up to the Return is mirrored first.
        let mut fed = 0;
        if let Some(end) = return_keypress(chunk) {
            if self.prompt_seen {
                self.prompt_seen = false;
                self.screen.feed(&chunk[..end]);
                fed = end;
                self.on_return();
            } else {
                debug!("[controller] line break without a prompt in front; not a return");
            }
        }

        if self.phase == Phase::PendingReturn && contains(&chunk[fed..], ERROR_TOKEN.as_bytes()) {
            self.error_seen = true;
        }

        let output = match find_fresh_prompt(chunk) {
            Some(prompt) if prompt.split_point() >= fed => self.on_prompt(chunk, fed),
            Some(_) => {
                debug!("[controller] prompt overlaps the submitted line; not injecting");
                chunk.to_vec()
            }
            None => chunk.to_vec(),
        };
        if has_prompt(&chunk[fed..]) {
            self.prompt_seen = true;
        }

        self.screen.feed(&output[fed..]);
        output
    }

    fn on_return(&mut self) {
        self.error_seen = false;
        let Some(statement) = last_statement(&self.screen.text()) else {
            debug!("[controller] return without an analyzable statement");
            if self.pending.is_none() {
                self.phase = Phase::PendingReturn;
            }
            return;
        };

        debug!("[controller] analyzing: {statement:?}");
        let analyzer = self.analyzer;
        self.pending = call_hook("analyze", || analyzer.analyze(&statement));
        self.phase = if self.pending.is_some() {
            Phase::PendingPrompt
        } else {
            Phase::PendingReturn
        };
    }

    fn on_prompt(&mut self, chunk: &[u8], fed: usize) -> Vec<u8> {
        let phase = std::mem::replace(&mut self.phase, Phase::Idle);
        let error_seen = std::mem::take(&mut self.error_seen);

        let warning = match phase {
            Phase::PendingPrompt => self.pending.take(),
            Phase::PendingReturn if error_seen => self.probe_syntax_error(&chunk[fed..]),
            Phase::PendingReturn | Phase::Idle => None,
        };

        match warning {
            Some(warning) => {
                debug!("[controller] injecting warning before prompt");
                inject(chunk, &warning)
            }
            None => chunk.to_vec(),
        }
    }

    /// Looks for a syntax error on the screen as it will be once `rest` is
    /// shown.
    fn probe_syntax_error(&self, rest: &[u8]) -> Option<String> {
        let mut lookahead = self.screen.fork();
        lookahead.feed(rest);
        let text = lookahead.text();
        let error = last_syntax_error(&text)?;
        debug!("[controller] analyzing syntax error: {error:?}");
        let analyzer = self.analyzer;
        call_hook("analyze_syntax_error", || analyzer.analyze_syntax_error(error))
    }

    fn record(&self, chunk: &[u8], output: &[u8]) {
        let Some(transcript) = &self.transcript else {
            return;
        };
        if let Err(e) = transcript.record_chunk(self.phase.as_str(), chunk, output) {
            warn!("[controller] failed to write transcript: {e}");
        }
        if let Err(e) = transcript.dump_screen(&self.screen.visible_lines()) {
            warn!("[controller] failed to write screen dump: {e}");
        }
    }
}

/// Runs an analyzer hook. Errors and panics become "no warning".
fn call_hook(hook: &str, call: impl FnOnce() -> Result<String>) -> Option<String> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(warning)) if !warning.trim().is_empty() => Some(warning),
        Ok(Ok(_)) => None,
        Ok(Err(e)) => {
            warn!("[controller] {hook} failed (fail-open): {e}");
            None
        }
        Err(_) => {
            warn!("[controller] {hook} panicked (fail-open)");
            None
        }
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use proptest::prelude::*;

    use super::*;
    use crate::error::Error;

    const SIZE: TerminalSize = TerminalSize { rows: 48, cols: 160 };
    const STARTUP: &[u8] = b"psql (14.5)\r\nType \"help\" for help.\r\n\r\n\x1b[?2004hpgdb=# ";

    /// Answers every hook with a fixed warning and remembers its input.
    struct MockAnalyzer {
        warning: &'static str,
        statements: RefCell<Vec<String>>,
        errors: RefCell<Vec<String>>,
    }

    impl MockAnalyzer {
        fn answering(warning: &'static str) -> Self {
            Self {
                warning,
                statements: RefCell::new(Vec::new()),
                errors: RefCell::new(Vec::new()),
            }
        }
    }

    impl Analyzer for MockAnalyzer {
        fn analyze(&self, sql: &str) -> Result<String> {
            self.statements.borrow_mut().push(sql.to_string());
            Ok(self.warning.to_string())
        }

        fn analyze_syntax_error(&self, error: &str) -> Result<String> {
            self.errors.borrow_mut().push(error.to_string());
            Ok(self.warning.to_string())
        }
    }

    /// Warns about every statement by quoting it.
    struct EchoAnalyzer;

    impl Analyzer for EchoAnalyzer {
        fn analyze(&self, sql: &str) -> Result<String> {
            Ok(format!("about {sql}"))
        }

        fn analyze_syntax_error(&self, _error: &str) -> Result<String> {
            Ok(String::new())
        }
    }

    struct FailingAnalyzer;

    impl Analyzer for FailingAnalyzer {
        fn analyze(&self, _sql: &str) -> Result<String> {
            Err(Error::Analysis("boom".into()))
        }

        fn analyze_syntax_error(&self, _error: &str) -> Result<String> {
            Err(Error::Analysis("boom".into()))
        }
    }

    struct PanickingAnalyzer;

    impl Analyzer for PanickingAnalyzer {
        fn analyze(&self, _sql: &str) -> Result<String> {
            panic!("analyzer bug")
        }

        fn analyze_syntax_error(&self, _error: &str) -> Result<String> {
            panic!("analyzer bug")
        }
    }

    fn started(analyzer: &dyn Analyzer) -> Controller<'_> {
        let mut controller = Controller::new(analyzer, SIZE);
        assert_eq!(controller.process(STARTUP), STARTUP.to_vec());
        controller
    }

    // -- statement warnings --

    #[test]
    fn warns_before_the_prompt_after_a_select() {
        let analyzer = MockAnalyzer::answering("Test");
        let mut controller = started(&analyzer);

        let echo = b"SELECT * FROM orders WHERE order_total_eur = 0 AND order_total_eur = 100;";
        assert_eq!(controller.process(echo), echo.to_vec());
        assert_eq!(controller.process(b"\r\n"), b"\r\n".to_vec());
        assert_eq!(controller.phase(), Phase::PendingPrompt);
        assert_eq!(controller.pending_warning(), Some("Test"));

        assert_eq!(
            controller.process(b"\x1b[?2004hpgdb=# "),
            b"Test\r\n\x1b[?2004hpgdb=# ".to_vec()
        );
        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(controller.pending_warning(), None);
        assert_eq!(
            analyzer.statements.borrow().as_slice(),
            ["SELECT * FROM orders WHERE order_total_eur = 0 AND order_total_eur = 100;"]
        );
    }

    #[test]
    fn warns_after_reverse_search() {
        let analyzer = MockAnalyzer::answering("Test");
        let mut controller = started(&analyzer);

        let chunks: [&[u8]; 3] = [
            b"\r(reverse-i-search)`': ",
            b"\x08\x08\x08t': SELECT * FROM orders  WHERE order_total_eur = 0 AND order_to\x1b[7mt\x1b[27mal_eur = 100;\x08\x08\x08\x08\x08\x08\x08\x08\x08\x08\x08\x08\x08\x08",
            b"\r\x1b[16Ppgdb=# SELECT * FROM orders  WHERE order_total_eur = 0 AND order_tot\x08\r\n\x1b[?2004l\r",
        ];
        for chunk in chunks {
            assert_eq!(controller.process(chunk), chunk.to_vec());
        }
        assert_eq!(
            analyzer.statements.borrow().as_slice(),
            ["SELECT * FROM orders  WHERE order_total_eur = 0 AND order_total_eur = 100;"]
        );

        let result = b" order_id | order_total_eur | customer_id \r\n----------+-----------------+-------------\r\n(0 rows)\r\n\r\n\x1b[?2004hpgdb=# ";
        let expected = b" order_id | order_total_eur | customer_id \r\n----------+-----------------+-------------\r\n(0 rows)\r\n\r\n\r\nTest\r\n\r\n\x1b[?2004hpgdb=# ";
        assert_eq!(controller.process(result), expected.to_vec());
    }

    #[test]
    fn non_select_statements_are_not_analyzed() {
        let analyzer = MockAnalyzer::answering("Test");
        let mut controller = started(&analyzer);

        controller.process(b"INSERT INTO orders VALUES (1, 2, 3);");
        controller.process(b"\r\n\x1b[?2004l\r");
        assert_eq!(controller.phase(), Phase::PendingReturn);
        let prompt = b"INSERT 0 1\r\n\x1b[?2004hpgdb=# ";
        assert_eq!(controller.process(prompt), prompt.to_vec());
        assert!(analyzer.statements.borrow().is_empty());
        assert_eq!(controller.phase(), Phase::Idle);
    }

    #[test]
    fn empty_warning_leaves_the_prompt_alone() {
        let analyzer = MockAnalyzer::answering("");
        let mut controller = started(&analyzer);

        controller.process(b"SELECT 1;");
        controller.process(b"\r\n\x1b[?2004l\r");
        assert_eq!(controller.pending_warning(), None);
        let prompt = b" ?column? \r\n----------\r\n        1\r\n(1 row)\r\n\r\n\x1b[?2004hpgdb=# ";
        assert_eq!(controller.process(prompt), prompt.to_vec());
    }

    #[test]
    fn warning_is_shown_once() {
        let analyzer = MockAnalyzer::answering("Test");
        let mut controller = started(&analyzer);

        controller.process(b"SELECT 1;");
        controller.process(b"\r\n\x1b[?2004l\r");
        let first = controller.process(b"(1 row)\r\n\r\n\x1b[?2004hpgdb=# ");
        assert!(first.windows(4).any(|w| w == b"Test"));

        let again = b"\r\n\x1b[?2004hpgdb=# ";
        controller.process(b"\r\n");
        assert_eq!(controller.process(again), again.to_vec());
    }

    #[test]
    fn each_submitted_statement_gets_its_own_warning() {
        let analyzer = EchoAnalyzer;
        let mut controller = started(&analyzer);

        controller.process(b"SELECT 1;");
        controller.process(b"\r\n\x1b[?2004l\r");
        assert_eq!(controller.pending_warning(), Some("about SELECT 1;"));
        controller.process(b"(1 row)\r\n\r\n\x1b[?2004hpgdb=# ");

        controller.process(b"SELECT 2;");
        controller.process(b"\r\n\x1b[?2004l\r");
        assert_eq!(controller.pending_warning(), Some("about SELECT 2;"));
        let output = controller.process(b"(1 row)\r\n\r\n\x1b[?2004hpgdb=# ");
        assert!(contains(&output, b"about SELECT 2;"));
        assert!(!contains(&output, b"about SELECT 1;"));
    }

    #[test]
    fn result_rows_split_at_a_line_break_are_not_a_return() {
        let analyzer = MockAnalyzer::answering("Test");
        let mut controller = started(&analyzer);

        controller.process(b"SELECT query FROM saved_queries;");
        controller.process(b"\r\n\x1b[?2004l\r");
        assert_eq!(controller.pending_warning(), Some("Test"));

        let rows: [&[u8]; 2] = [b"   query   \r\n-----------\r\n SELECT 1;", b"\r\n(1 row)\r\n\r\n"];
        for chunk in rows {
            assert_eq!(controller.process(chunk), chunk.to_vec());
        }
        assert_eq!(analyzer.statements.borrow().len(), 1);
        assert_eq!(controller.phase(), Phase::PendingPrompt);

        assert_eq!(
            controller.process(b"\x1b[?2004hpgdb=# "),
            b"Test\r\n\x1b[?2004hpgdb=# ".to_vec()
        );
    }

    #[test]
    fn continuation_prompt_allows_the_next_return() {
        let analyzer = MockAnalyzer::answering("Test");
        let mut controller = started(&analyzer);

        controller.process(b"SELECT *");
        controller.process(b"\r\n");
        assert_eq!(controller.phase(), Phase::PendingReturn);
        controller.process(b"\x1b[?2004hpgdb-# ");
        controller.process(b"FROM orders;");
        controller.process(b"\r\n\x1b[?2004l\r");
        assert_eq!(analyzer.statements.borrow().as_slice(), ["SELECT *  FROM orders;"]);
    }

    // -- return and prompt in one chunk --

    #[test]
    fn warns_when_return_result_and_prompt_share_a_chunk() {
        let analyzer = MockAnalyzer::answering("Test");
        let mut controller = started(&analyzer);

        controller.process(b"SELECT 1;");
        let chunk = b"\r\n\x1b[?2004l\r ?column? \r\n----------\r\n        1\r\n(1 row)\r\n\r\n\x1b[?2004hpgdb=# ";
        let expected = b"\r\n\x1b[?2004l\r ?column? \r\n----------\r\n        1\r\n(1 row)\r\n\r\n\r\nTest\r\n\r\n\x1b[?2004hpgdb=# ";
        assert_eq!(controller.process(chunk), expected.to_vec());
        assert_eq!(analyzer.statements.borrow().as_slice(), ["SELECT 1;"]);
        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(controller.pending_warning(), None);
    }

    #[test]
    fn statement_without_warning_shares_a_chunk_with_its_prompt() {
        let analyzer = MockAnalyzer::answering("Test");
        let mut controller = started(&analyzer);

        controller.process(b"INSERT INTO orders VALUES (1, 2, 3);");
        let chunk = b"\r\n\x1b[?2004l\rINSERT 0 1\r\n\x1b[?2004hpgdb=# ";
        assert_eq!(controller.process(chunk), chunk.to_vec());
        assert_eq!(controller.phase(), Phase::Idle);

        // The prompt in that chunk makes the next line break a Return again.
        controller.process(b"SELECT 1;");
        controller.process(b"\r\n\x1b[?2004l\r");
        assert_eq!(analyzer.statements.borrow().as_slice(), ["SELECT 1;"]);
    }

    // -- syntax errors --

    #[test]
    fn warns_about_syntax_errors_on_the_same_prompt() {
        let analyzer = MockAnalyzer::answering("Test");
        let mut controller = started(&analyzer);

        controller.process(b"SELEC * FROM orders;");
        controller.process(b"\r\n\x1b[?2004l\r");
        let error = b"ERROR:  syntax error at or near \"SELEC\"\r\nLINE 1: SELEC * FROM orders;\r\n        ^\r\n\x1b[?2004hpgdb=# ";
        let expected = b"ERROR:  syntax error at or near \"SELEC\"\r\nLINE 1: SELEC * FROM orders;\r\n        ^\r\n\r\nTest\r\n\r\n\x1b[?2004hpgdb=# ";
        assert_eq!(controller.process(error), expected.to_vec());
        assert_eq!(
            analyzer.errors.borrow().as_slice(),
            ["ERROR:  syntax error at or near \"SELEC\"\nLINE 1: SELEC * FROM orders;\n        ^"]
        );
        assert!(analyzer.statements.borrow().is_empty());
    }

    #[test]
    fn old_syntax_errors_are_not_reported_again() {
        let analyzer = MockAnalyzer::answering("Test");
        let mut controller = started(&analyzer);

        controller.process(b"SELEC 1;");
        controller.process(b"\r\n\x1b[?2004l\r");
        controller.process(b"ERROR:  syntax error at or near \"SELEC\"\r\nLINE 1: SELEC 1;\r\n        ^\r\n\x1b[?2004hpgdb=# ");

        controller.process(b"\\q");
        controller.process(b"\r\n\x1b[?2004l\r");
        let prompt = b"\x1b[?2004hpgdb=# ";
        assert_eq!(controller.process(prompt), prompt.to_vec());
        assert_eq!(analyzer.errors.borrow().len(), 1);
    }

    #[test]
    fn warns_about_syntax_errors_that_share_a_chunk_with_the_return() {
        let analyzer = MockAnalyzer::answering("Test");
        let mut controller = started(&analyzer);

        controller.process(b"SELEC 1;");
        let chunk = b"\r\n\x1b[?2004l\rERROR:  syntax error at or near \"SELEC\"\r\nLINE 1: SELEC 1;\r\n        ^\r\n\x1b[?2004hpgdb=# ";
        let expected = b"\r\n\x1b[?2004l\rERROR:  syntax error at or near \"SELEC\"\r\nLINE 1: SELEC 1;\r\n        ^\r\n\r\nTest\r\n\r\n\x1b[?2004hpgdb=# ";
        assert_eq!(controller.process(chunk), expected.to_vec());
        assert_eq!(
            analyzer.errors.borrow().as_slice(),
            ["ERROR:  syntax error at or near \"SELEC\"\nLINE 1: SELEC 1;\n        ^"]
        );
    }

    // -- degrade to transparent --

    #[test]
    fn failing_analyzer_passes_output_through() {
        let analyzer = FailingAnalyzer;
        let mut controller = started(&analyzer);

        controller.process(b"SELECT 1;");
        controller.process(b"\r\n\x1b[?2004l\r");
        assert_eq!(controller.phase(), Phase::PendingReturn);
        let prompt = b"(1 row)\r\n\r\n\x1b[?2004hpgdb=# ";
        assert_eq!(controller.process(prompt), prompt.to_vec());
    }

    #[test]
    fn panicking_analyzer_passes_output_through() {
        let analyzer = PanickingAnalyzer;
        let mut controller = started(&analyzer);

        controller.process(b"SELECT 1;");
        controller.process(b"\r\n\x1b[?2004l\r");
        let prompt = b"(1 row)\r\n\r\n\x1b[?2004hpgdb=# ";
        assert_eq!(controller.process(prompt), prompt.to_vec());
    }

    #[test]
    fn keystroke_echo_is_not_parsed() {
        let analyzer = MockAnalyzer::answering("Test");
        let mut controller = started(&analyzer);
        for byte in b"SELECT 1;" {
            assert_eq!(controller.process(&[*byte]), vec![*byte]);
        }
        assert!(analyzer.statements.borrow().is_empty());
        assert_eq!(controller.screen().visible_lines()[3], "pgdb=# SELECT 1;");
    }

    proptest! {
        #[test]
        fn plain_output_is_passed_through(chunks in prop::collection::vec("[a-zA-Z0-9 |()+-]{0,40}", 0..20)) {
            let analyzer = MockAnalyzer::answering("Test");
            let mut controller = started(&analyzer);
            for chunk in &chunks {
                prop_assert_eq!(controller.process(chunk.as_bytes()), chunk.as_bytes().to_vec());
            }
        }

        #[test]
        fn failing_analyzer_is_fully_transparent(chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..20)) {
            let analyzer = FailingAnalyzer;
            let mut controller = started(&analyzer);
            for chunk in &chunks {
                prop_assert_eq!(controller.process(chunk), chunk.clone());
            }
        }
    }
}
