//! File logging.
//!
//! The wrapped terminal owns stdout and stderr, so events go to a log file
//! under the XDG state directory. Nothing is installed unless a filter is
//! given.

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

/// Environment variable holding the log filter when `--pg4n-log` is absent.
pub const LOG_ENV: &str = "PG4N_LOG";

const LOG_FILE_NAME: &str = "pg4n.log";

/// Directory for pg4n's own files: `~/.local/state/pg4n` on Linux, or the
/// platform config directory elsewhere.
#[must_use]
pub fn state_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::config_dir)
        .map_or_else(|| std::env::temp_dir().join("pg4n"), |dir| dir.join("pg4n"))
}

#[must_use]
pub fn log_path() -> PathBuf {
    state_dir().join(LOG_FILE_NAME)
}

/// Installs a global subscriber writing `filter`-selected events to `path`.
/// The file is truncated on each run.
///
/// # Errors
/// Returns an error if the filter does not parse or the file cannot be
/// created.
pub fn init_file_logging(filter: &str, path: &Path) -> Result<()> {
    let filter = EnvFilter::try_new(filter)
        .map_err(|e| Error::Config(format!("invalid log filter {filter:?}: {e}")))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(file)
        .with_ansi(false)
        .try_init()
        .map_err(|e| Error::Other(format!("could not install logger: {e}")))
}
