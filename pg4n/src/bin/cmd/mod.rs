pub mod default;
pub mod session;

/// How the binary should exit.
#[derive(Debug)]
pub struct CmdExit {
    pub code: i32,
    pub message: Option<String>,
}
