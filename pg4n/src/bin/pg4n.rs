mod cmd;

use std::process::exit;

use console::{style, Style};
use pg4n::{env::RealEnvironment, error::Error, logging};

fn main() {
    let matches = cmd::default::command().get_matches();

    if let Some(filter) = cmd::session::log_filter(&matches, &RealEnvironment) {
        if let Err(err) = logging::init_file_logging(&filter, &logging::log_path()) {
            eprintln!("{}", style(format!("pg4n: logging disabled: {err}")).yellow());
        }
    }

    let exit_with = match cmd::session::run(&matches) {
        Ok(cmd) => {
            if let Some(message) = cmd.message {
                let style = if exitcode::is_success(cmd.code) {
                    Style::new().green()
                } else {
                    Style::new().red()
                };
                eprintln!("{}", style.apply_to(message));
            }
            cmd.code
        }
        Err(err) => {
            tracing::debug!("{err:?}");
            eprintln!("{}", style(format!("pg4n: {err}")).red());
            match err {
                Error::Config(_) | Error::Yaml(_) => exitcode::CONFIG,
                Error::Io(_) => exitcode::IOERR,
                _ => exitcode::SOFTWARE,
            }
        }
    };
    exit(exit_with)
}
