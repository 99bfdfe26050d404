//! pg4n wraps psql in a pseudo-terminal and prints a warning above the next
//! prompt when a submitted query looks like it does not mean what the user
//! intended.

pub mod checks;
pub mod config;
pub mod controller;
pub mod env;
pub mod error;
pub mod logging;
pub mod screen;
pub mod transcript;
pub mod version;
#[cfg(all(unix, feature = "wrap"))]
pub mod wrap;

pub use checks::Router;
pub use config::{Config, DebugSettings, Settings};
pub use controller::{Analyzer, Controller, Phase};
pub use screen::{ScreenModel, TerminalSize};
