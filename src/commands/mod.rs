//! Command dispatch and handlers.

pub mod approve;
pub mod cases;
pub mod check;
pub mod fmt;

use crate::cli::{Cli, Command};
use crate::config::CallspecConfig;

/// Dispatch a parsed command line to its handler.
///
/// Configuration is only loaded for commands that work on the spec store.
///
/// # Errors
///
/// Returns an error string if configuration loading or the selected command
/// handler fails.
pub fn dispatch(cli: &Cli) -> Result<(), String> {
    match &cli.command {
        Command::Check { file, json } => check::run(file, *json),
        Command::Fmt { file, write } => fmt::run(file, *write),
        Command::Cases { class, method } => cases::run(&load_config(cli)?, class, method),
        Command::Approve { class, method, case } => {
            approve::run(&load_config(cli)?, class, method, case.as_deref())
        }
    }
}

fn load_config(cli: &Cli) -> Result<CallspecConfig, String> {
    CallspecConfig::load(cli.config.as_deref()).map_err(|e| e.to_string())
}
