//! psql version banner parsing.

use std::sync::OnceLock;

use regex::Regex;

/// psql releases the wrapper has been validated against. An entry is either
/// a major version or an exact `major.minor` release.
pub const SUPPORTED_VERSIONS: &[&str] = &["13", "14", "15", "16"];

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^psql \(PostgreSQL\) (\d+)\.(\d+)").unwrap())
}

/// Pulls `major.minor` out of the `psql --version` banner.
#[must_use]
pub fn psql_version(banner: &str) -> Option<String> {
    version_regex()
        .captures(banner.trim_start())
        .map(|caps| format!("{}.{}", &caps[1], &caps[2]))
}

/// Checks a `major.minor` version against [`SUPPORTED_VERSIONS`].
#[must_use]
pub fn is_supported(version: &str) -> bool {
    let major = version.split('.').next().unwrap_or(version);
    SUPPORTED_VERSIONS
        .iter()
        .any(|supported| *supported == version || *supported == major)
}
