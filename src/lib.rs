//! Record/replay specification testing.
//!
//! A test wraps the collaborators of the unit under test in [`Proxy`]
//! objects. While recording, every call is forwarded to the real
//! collaborator and logged as a block of human-readable text; while
//! replaying, the same text answers the calls instead. The produced text is
//! compared with an approved copy at the end of the test.
//!
//! The pieces, leaves first: the value [`codec`], the object identity
//! [`registry`], the [`specfile`] parser, recorder and replayer, the
//! per-test [`SpecSession`], and the [`adapters`] that intercept calls.

pub mod adapters;
pub mod cli;
pub mod codec;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod ports;
pub mod registry;
pub mod specfile;
pub mod store;

use clap::Parser;

pub use adapters::{CallFrame, Proxy};
pub use codec::{Codec, FromRaw, RawValue, StringMode, ToRaw};
pub use config::CallspecConfig;
pub use context::SpecSession;
pub use error::{Result, SpecError};
pub use ports::{Capability, Direction, MethodDescriptor, ParamDescriptor};
pub use registry::IdentityRegistry;
pub use specfile::{SpecEntry, SpecRecorder, SpecReplayer, Specification};
pub use store::{SpecCase, SpecStore};

/// Run the CLI with the provided arguments.
///
/// # Errors
///
/// Returns an error string when argument parsing fails or command execution fails.
pub fn run<I, T>(args: I) -> std::result::Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = match cli::Cli::try_parse_from(args) {
        Ok(cli) => cli,
        // --help and --version
        Err(err) if !err.use_stderr() => {
            print!("{err}");
            return Ok(());
        }
        Err(err) => return Err(err.to_string()),
    };
    commands::dispatch(&cli)
}

#[cfg(test)]
mod tests {
    use super::run;

    #[test]
    fn run_checks_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A.b.approved.txt");
        std::fs::write(&path, "🔹 Ping:\n").unwrap();
        let result = run(["callspec".into(), "check".into(), path.into_os_string()]);
        assert!(result.is_ok());
    }

    #[test]
    fn run_errors_on_unknown_subcommand() {
        let result = run(["callspec", "unknown"]);
        assert!(result.is_err());
    }

    #[test]
    fn run_prints_help_without_failing() {
        assert!(run(["callspec", "--help"]).is_ok());
    }
}
