//! Load the pg4n settings from the layered `pg4n.yaml` files.

use std::{collections::BTreeMap, path::PathBuf};

use serde_derive::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    env::Environment,
    error::{Error, Result},
};

pub const DEFAULT_SETTING_FILE_NAME: &str = "pg4n.yaml";

const SYSTEM_CONFIG_DIR: &str = "/etc";

/// Describes where the settings come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Setting files in load order; later files override earlier ones.
    pub setting_files: Vec<PathBuf>,
    /// An explicitly requested file has to exist.
    pub explicit: bool,
}

/// Describe the configuration yaml
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Settings {
    /// psql executable to wrap.
    #[serde(default = "default_psql")]
    pub psql: String,
    /// Checker name to enabled flag. Checkers missing here are enabled.
    #[serde(default)]
    pub checks: BTreeMap<String, bool>,
    #[serde(default)]
    pub debug: DebugSettings,
}

/// Files the debug artifacts are written to.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct DebugSettings {
    /// JSON lines transcript of every processed output chunk.
    pub transcript: Option<PathBuf>,
    /// Dump of the mirrored screen, rewritten after every chunk.
    pub screen: Option<PathBuf>,
}

/// One file's worth of settings; absent keys leave earlier layers alone.
#[derive(Debug, Deserialize, Default)]
struct SettingsLayer {
    psql: Option<String>,
    #[serde(default)]
    checks: BTreeMap<String, bool>,
    #[serde(default)]
    debug: DebugSettings,
}

fn default_psql() -> String {
    "psql".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            psql: default_psql(),
            checks: BTreeMap::new(),
            debug: DebugSettings::default(),
        }
    }
}

impl Settings {
    /// Checker names are matched case-insensitively.
    #[must_use]
    pub fn is_check_enabled(&self, name: &str) -> bool {
        self.checks
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .is_none_or(|(_, enabled)| *enabled)
    }

    fn apply(&mut self, layer: SettingsLayer) {
        if let Some(psql) = layer.psql {
            self.psql = psql;
        }
        for (name, enabled) in layer.checks {
            self.checks.retain(|key, _| !key.eq_ignore_ascii_case(&name));
            self.checks.insert(name, enabled);
        }
        if layer.debug.transcript.is_some() {
            self.debug.transcript = layer.debug.transcript;
        }
        if layer.debug.screen.is_some() {
            self.debug.screen = layer.debug.screen;
        }
    }
}

impl Config {
    /// Resolve the setting files.
    ///
    /// With an explicit `path` only that file is used. Otherwise the system
    /// file, the user's config dir (`$XDG_CONFIG_HOME` or `~/.config`) and
    /// the current directory are layered in that order.
    ///
    /// # Errors
    ///
    /// Will return `Err` when the current directory cannot be determined
    pub fn new(path: Option<&str>, env: &dyn Environment) -> Result<Self> {
        if let Some(path) = path {
            return Ok(Self {
                setting_files: vec![PathBuf::from(path)],
                explicit: true,
            });
        }

        let mut setting_files = vec![PathBuf::from(SYSTEM_CONFIG_DIR).join(DEFAULT_SETTING_FILE_NAME)];
        let user_dir = env
            .var("XDG_CONFIG_HOME")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .or_else(|| env.home_dir().map(|home| home.join(".config")));
        if let Some(dir) = user_dir {
            setting_files.push(dir.join(DEFAULT_SETTING_FILE_NAME));
        }
        setting_files.push(env.current_dir()?.join(DEFAULT_SETTING_FILE_NAME));

        Ok(Self {
            setting_files,
            explicit: false,
        })
    }

    /// Read and merge every setting file that exists.
    ///
    /// # Errors
    ///
    /// Will return `Err` when a file cannot be read or is not valid yaml, or
    /// when an explicitly requested file is missing
    pub fn get_settings(&self, env: &dyn Environment) -> Result<Settings> {
        let mut settings = Settings::default();
        for path in &self.setting_files {
            if !env.path_exists(path) {
                if self.explicit {
                    return Err(Error::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                continue;
            }
            let content = env.read_file(path)?;
            let layer: SettingsLayer = if content.trim().is_empty() {
                SettingsLayer::default()
            } else {
                serde_yaml::from_str(&content).inspect_err(|e| {
                    warn!(path = %path.display(), "[pg4n] invalid setting file: {e}");
                })?
            };
            debug!(path = %path.display(), "[pg4n] setting file loaded");
            settings.apply(layer);
        }
        debug!(settings = ?settings, "[pg4n] settings resolved");
        Ok(settings)
    }
}
