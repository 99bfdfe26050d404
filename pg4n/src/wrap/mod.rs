//! PTY session around psql.
//!
//! Keystrokes go to psql unchanged. Everything psql writes passes through
//! the [`Controller`](crate::controller::Controller) on its way to the real
//! terminal.

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::PtySession;
