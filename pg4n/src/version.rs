//! Startup check of the installed psql release.

use pg4n_core::{is_supported, psql_version, SUPPORTED_VERSIONS};
use tracing::debug;

use crate::env::Environment;

const VERSION_TIMEOUT_MS: u64 = 3_000;

/// Outcome of asking psql for its version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionCheck {
    Supported(String),
    Unsupported(String),
    /// psql did not answer or the banner did not parse.
    Unknown,
}

impl VersionCheck {
    /// A one-line advisory for the user, when one is warranted.
    #[must_use]
    pub fn advisory(&self) -> Option<String> {
        match self {
            Self::Unsupported(version) => Some(format!(
                "pg4n has not been tested with psql {version} (tested: {}). Warnings may be missing or misplaced.",
                SUPPORTED_VERSIONS.join(", ")
            )),
            Self::Supported(_) | Self::Unknown => None,
        }
    }
}

/// Runs `<psql> --version` and checks the result against the supported list.
pub fn check_psql_version(env: &dyn Environment, psql: &str) -> VersionCheck {
    let Some(banner) = env.run_command(psql, &["--version"], VERSION_TIMEOUT_MS) else {
        debug!(psql, "[pg4n] version probe failed");
        return VersionCheck::Unknown;
    };
    let check = match psql_version(&banner) {
        Some(version) if is_supported(&version) => VersionCheck::Supported(version),
        Some(version) => VersionCheck::Unsupported(version),
        None => VersionCheck::Unknown,
    };
    debug!(?check, "[pg4n] psql version");
    check
}
