//! pg4n Core - pattern matchers over psql output
//!
//! Pure functions that recognise psql prompts, Return keypresses, the last
//! submitted statement, syntax error reports and the version banner, plus
//! the splicing of warnings in front of a fresh prompt. Nothing in this
//! crate performs I/O or keeps state between calls.

pub mod inject;
pub mod keypress;
pub mod prompt;
pub mod statement;
pub mod syntax_error;
pub mod version;

pub use inject::inject;
pub use keypress::{is_return_keypress, return_keypress};
pub use prompt::{
    continuation_variants, find_fresh_prompt, has_fresh_prompt, has_prompt, line_prompt, LinePrompt,
    PromptKind, PromptMatch,
};
pub use statement::last_statement;
pub use syntax_error::last_syntax_error;
pub use version::{is_supported, psql_version, SUPPORTED_VERSIONS};
