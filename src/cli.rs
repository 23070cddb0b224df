//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI parser for `callspec`.
#[derive(Debug, Parser)]
#[command(name = "callspec", version, about = "Inspect, format and approve call specifications")]
pub struct Cli {
    /// Configuration file (defaults to ./callspec.yaml when present).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse and validate a specification file.
    Check {
        /// Specification file to check.
        file: PathBuf,
        /// Print the parsed structure as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Rewrite a specification in canonical form.
    Fmt {
        /// Specification file to format.
        file: PathBuf,
        /// Write the result back instead of printing it.
        #[arg(long)]
        write: bool,
    },
    /// List the cases of a test.
    Cases {
        /// Test class name.
        class: String,
        /// Test method name.
        method: String,
    },
    /// Promote a received specification to approved.
    Approve {
        /// Test class name.
        class: String,
        /// Test method name.
        method: String,
        /// Case name for data-driven tests.
        #[arg(long)]
        case: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use clap::Parser;

    #[test]
    fn parses_check_subcommand() {
        let cli = Cli::parse_from(["callspec", "check", "a.approved.txt", "--json"]);
        assert!(matches!(cli.command, Command::Check { json: true, .. }));
        assert!(cli.config.is_none());
    }

    #[test]
    fn parses_approve_with_case_and_global_config() {
        let cli = Cli::parse_from([
            "callspec", "approve", "Pricing", "totals", "--case", "small", "--config", "cs.yaml",
        ]);
        assert!(matches!(
            cli.command,
            Command::Approve { ref class, ref case, .. }
                if class == "Pricing" && case.as_deref() == Some("small")
        ));
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("cs.yaml")));
    }

    #[test]
    fn rejects_missing_arguments() {
        assert!(Cli::try_parse_from(["callspec", "cases", "OnlyClass"]).is_err());
    }
}
