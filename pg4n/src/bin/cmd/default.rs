use clap::{crate_version, Arg, ArgAction, ArgMatches, Command};

pub const CONFIG_ARG: &str = "pg4n-config";
pub const LOG_ARG: &str = "pg4n-log";
pub const DEBUG_ARG: &str = "pg4n-debug";
pub const PSQL_ARGS: &str = "psql_args";

/// `pg4n` takes only `--pg4n-*` options. Everything else, `--help` and
/// `--version` included, belongs to psql.
pub fn command() -> Command {
    Command::new("pg4n")
        .version(crate_version!())
        .about("Run psql and warn about queries that probably do not mean what you intended")
        .disable_help_flag(true)
        .disable_version_flag(true)
        .arg(
            Arg::new(CONFIG_ARG)
                .long(CONFIG_ARG)
                .value_name("PATH")
                .help("Read settings from this file only")
                .num_args(1),
        )
        .arg(
            Arg::new(LOG_ARG)
                .long(LOG_ARG)
                .value_name("FILTER")
                .help("Log filter directive, e.g. `debug` or `pg4n=trace`")
                .num_args(1),
        )
        .arg(
            Arg::new(DEBUG_ARG)
                .long(DEBUG_ARG)
                .help("Write the session transcript and screen dump")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(PSQL_ARGS)
                .help("Arguments passed to psql as is")
                .num_args(0..)
                .trailing_var_arg(true)
                .allow_hyphen_values(true),
        )
}

pub fn psql_args(matches: &ArgMatches) -> Vec<String> {
    matches
        .get_many::<String>(PSQL_ARGS)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}
