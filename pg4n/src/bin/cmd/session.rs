use clap::ArgMatches;
use console::style;
use pg4n::{
    env::{Environment, RealEnvironment},
    error::Result,
    logging,
    transcript::Transcript,
    version::check_psql_version,
    wrap::PtySession,
    Config, Router, Settings,
};

use super::{default, CmdExit};

const TRANSCRIPT_FILE_NAME: &str = "transcript.jsonl";
const SCREEN_FILE_NAME: &str = "screen.txt";

pub fn run(matches: &ArgMatches) -> Result<CmdExit> {
    let env = RealEnvironment;
    let config = Config::new(
        matches.get_one::<String>(default::CONFIG_ARG).map(String::as_str),
        &env,
    )?;
    let mut settings = config.get_settings(&env)?;
    if matches.get_flag(default::DEBUG_ARG) {
        enable_debug_defaults(&mut settings);
    }
    tracing::debug!(files = ?config.setting_files, "[pg4n] configuration loaded");

    if let Some(advisory) = check_psql_version(&env, &settings.psql).advisory() {
        println!("{}", style(advisory).yellow());
    }

    let router = Router::new(&settings);
    let args = default::psql_args(matches);
    let code = PtySession {
        program: &settings.psql,
        args: &args,
        analyzer: &router,
        transcript: Transcript::new(&settings.debug),
    }
    .run()?;

    Ok(CmdExit {
        code,
        message: None,
    })
}

/// `--pg4n-debug` fills in any debug path the settings leave empty.
fn enable_debug_defaults(settings: &mut Settings) {
    let dir = logging::state_dir();
    settings
        .debug
        .transcript
        .get_or_insert_with(|| dir.join(TRANSCRIPT_FILE_NAME));
    settings
        .debug
        .screen
        .get_or_insert_with(|| dir.join(SCREEN_FILE_NAME));
}

/// The log filter from `--pg4n-log`, falling back to `PG4N_LOG`.
pub fn log_filter(matches: &ArgMatches, env: &dyn Environment) -> Option<String> {
    matches
        .get_one::<String>(default::LOG_ARG)
        .cloned()
        .or_else(|| env.var(logging::LOG_ENV))
        .filter(|filter| !filter.trim().is_empty())
}
