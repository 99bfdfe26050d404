//! Unix PTY backend using `nix` / `libc` / `rustix`.

use std::os::{
    fd::{AsFd, BorrowedFd, OwnedFd},
    unix::process::CommandExt,
};

use nix::{
    poll::{PollFd, PollFlags, PollTimeout},
    pty::openpty,
    sys::{
        termios::{self, SetArg, Termios},
        wait::{waitpid, WaitPidFlag, WaitStatus},
    },
    unistd::{self, Pid},
};
use tracing::{debug, warn};

use crate::{
    controller::{Analyzer, Controller},
    error::{Error, Result},
    screen::TerminalSize,
    transcript::Transcript,
};

const READ_BUFFER_SIZE: usize = 4096;

// ---------------------------------------------------------------------------
// RawModeGuard
// ---------------------------------------------------------------------------

/// RAII guard that restores terminal settings on drop.
struct RawModeGuard {
    fd: OwnedFd,
    original: Termios,
}

impl RawModeGuard {
    /// Enter raw mode on stdin. Returns a guard that restores on drop.
    fn enter() -> Result<Self> {
        let fd = unistd::dup(std::io::stdin().as_fd())
            .map_err(|e| Error::Wrap(format!("dup stdin: {e}")))?;
        let original =
            termios::tcgetattr(&fd).map_err(|e| Error::Wrap(format!("tcgetattr: {e}")))?;
        let mut raw = original.clone();
        termios::cfmakeraw(&mut raw);
        termios::tcsetattr(&fd, SetArg::TCSANOW, &raw)
            .map_err(|e| Error::Wrap(format!("tcsetattr raw: {e}")))?;
        Ok(Self { fd, original })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = termios::tcsetattr(&self.fd, SetArg::TCSANOW, &self.original);
    }
}

// ---------------------------------------------------------------------------
// Terminal size
// ---------------------------------------------------------------------------

/// Copies the real terminal's size to the PTY once. Later resizes are not
/// followed, so the screen mirror keeps the size chosen here.
fn sync_term_size(master_fd: BorrowedFd<'_>) -> TerminalSize {
    let mut winsize = rustix::termios::Winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    if let Ok(ws) = rustix::termios::tcgetwinsize(std::io::stdin()) {
        winsize = ws;
    }
    let size = TerminalSize {
        rows: winsize.ws_row,
        cols: winsize.ws_col,
    }
    .or_default();
    winsize.ws_row = size.rows;
    winsize.ws_col = size.cols;
    if let Err(e) = rustix::termios::tcsetwinsize(master_fd, winsize) {
        warn!("[wrap] could not size the pty: {e}");
    }
    size
}

// ---------------------------------------------------------------------------
// PtySession
// ---------------------------------------------------------------------------

/// One psql run inside a pseudo-terminal.
pub struct PtySession<'a> {
    pub program: &'a str,
    pub args: &'a [String],
    pub analyzer: &'a dyn Analyzer,
    pub transcript: Option<Transcript>,
}

impl PtySession<'_> {
    /// Spawn psql in a PTY and run the proxy loop until it exits.
    ///
    /// Returns the child's exit code.
    ///
    /// # Errors
    /// Returns an error if PTY creation, spawn or raw mode fails.
    pub fn run(self) -> Result<i32> {
        let pty =
            openpty(None, None).map_err(|e| Error::Wrap(format!("failed to open PTY: {e}")))?;
        let master_fd = pty.master;
        let slave_fd = pty.slave;
        let size = sync_term_size(master_fd.as_fd());

        // Dup slave for stdout/stderr (stdin consumes the original)
        let slave_stdout = unistd::dup(slave_fd.as_fd())
            .map_err(|e| Error::Wrap(format!("dup slave stdout: {e}")))?;
        let slave_stderr = unistd::dup(slave_fd.as_fd())
            .map_err(|e| Error::Wrap(format!("dup slave stderr: {e}")))?;

        let mut cmd = std::process::Command::new(self.program);
        cmd.args(self.args)
            .stdin(std::process::Stdio::from(slave_fd))
            .stdout(std::process::Stdio::from(slave_stdout))
            .stderr(std::process::Stdio::from(slave_stderr));

        // SAFETY: pre_exec runs after fork in the child process.
        // setsid() creates a new session; TIOCSCTTY sets the PTY slave
        // (already dup2'd to stdin by Command) as the controlling terminal.
        unsafe {
            cmd.pre_exec(|| {
                unistd::setsid().map_err(std::io::Error::other)?;
                tiocsctty(libc::STDIN_FILENO, 0).map_err(std::io::Error::other)?;
                Ok(())
            });
        }

        let child = cmd
            .spawn()
            .map_err(|e| Error::Wrap(format!("failed to spawn {}: {e}", self.program)))?;
        let child_pid = Pid::from_raw(
            i32::try_from(child.id()).map_err(|e| Error::Wrap(format!("invalid pid: {e}")))?,
        );
        debug!(program = self.program, pid = child.id(), ?size, "[wrap] psql started");

        let mut controller =
            Controller::new(self.analyzer, size).with_transcript(self.transcript);
        let guard = RawModeGuard::enter()?;
        let exit_code = event_loop(&master_fd, child_pid, &mut controller);
        drop(guard);

        if let Some(code) = exit_code {
            return Ok(code);
        }
        let status =
            waitpid(child_pid, None).map_err(|e| Error::Wrap(format!("waitpid failed: {e}")))?;
        Ok(exit_code_of(status).unwrap_or(1))
    }
}

fn exit_code_of(status: WaitStatus) -> Option<i32> {
    match status {
        WaitStatus::Exited(_, code) => Some(code),
        WaitStatus::Signaled(_, sig, _) => Some(128 + sig as i32),
        _ => None,
    }
}

/// Main event loop: poll stdin and the master side of the PTY.
fn event_loop(master_fd: &OwnedFd, child: Pid, controller: &mut Controller<'_>) -> Option<i32> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let stdin_fd = stdin.as_fd();
    let master_borrow = master_fd.as_fd();
    let mut buf = [0u8; READ_BUFFER_SIZE];

    loop {
        let mut poll_fds = [
            PollFd::new(stdin_fd, PollFlags::POLLIN),
            PollFd::new(master_borrow, PollFlags::POLLIN),
        ];

        match nix::poll::poll(&mut poll_fds, PollTimeout::from(100u16)) {
            Ok(0) => {
                // Timeout: check if the child is still alive
                match waitpid(child, Some(WaitPidFlag::WNOHANG)) {
                    Ok(status) => match exit_code_of(status) {
                        Some(code) => return Some(code),
                        None => continue,
                    },
                    Err(_) => continue,
                }
            }
            Ok(_) => {}
            Err(nix::errno::Errno::EINTR) => continue,
            Err(e) => {
                warn!("[wrap] poll error: {e}");
                return None;
            }
        }

        // psql output → controller → user
        if poll_fds[1]
            .revents()
            .is_some_and(|r| r.contains(PollFlags::POLLIN))
        {
            match unistd::read(master_borrow, &mut buf) {
                Ok(0) | Err(nix::errno::Errno::EIO) => return None,
                Ok(n) => forward_output(controller, stdout.as_fd(), &buf[..n]),
                Err(nix::errno::Errno::EINTR) => {}
                Err(e) => {
                    warn!("[wrap] read master error: {e}");
                    return None;
                }
            }
        }

        if poll_fds[1]
            .revents()
            .is_some_and(|r| r.contains(PollFlags::POLLHUP))
        {
            loop {
                match unistd::read(master_borrow, &mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => forward_output(controller, stdout.as_fd(), &buf[..n]),
                }
            }
            return None;
        }

        // User input → psql, unchanged
        if poll_fds[0]
            .revents()
            .is_some_and(|r| r.contains(PollFlags::POLLIN))
        {
            match unistd::read(stdin_fd, &mut buf) {
                Ok(0) => return None,
                Ok(n) => {
                    if let Err(e) = write_all_fd(master_borrow, &buf[..n]) {
                        warn!("[wrap] {e}");
                    }
                }
                Err(nix::errno::Errno::EINTR) => {}
                Err(e) => {
                    warn!("[wrap] read stdin error: {e}");
                    return None;
                }
            }
        }
    }
}

fn forward_output(controller: &mut Controller<'_>, stdout_fd: BorrowedFd<'_>, chunk: &[u8]) {
    let output = controller.process(chunk);
    if let Err(e) = write_all_fd(stdout_fd, &output) {
        warn!("[wrap] {e}");
    }
}

nix::ioctl_write_int_bad!(tiocsctty, libc::TIOCSCTTY);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write_all_fd(fd: BorrowedFd<'_>, data: &[u8]) -> Result<()> {
    let mut written = 0;
    while written < data.len() {
        match unistd::write(fd, &data[written..]) {
            Ok(n) => written += n,
            Err(nix::errno::Errno::EINTR) => {}
            Err(e) => return Err(Error::Wrap(format!("write error: {e}"))),
        }
    }
    Ok(())
}
