//! # CLI Interface
//!
//! Defines the command-line argument structure for `crown-node` using
//! `clap` derive. Supports three subcommands: `run`, `check` and `version`.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crown_protocol::config::{DEFAULT_LOG_FILTER, DEFAULT_SCENARIO_FILE};

/// Crown kernel scenario runner.
///
/// Deploys a token and a claim vault, drives them through the steps of a
/// JSON scenario and reports every outcome and event as JSON lines.
#[derive(Parser, Debug)]
#[command(
    name = "crown-node",
    about = "Crown kernel scenario runner",
    version,
    propagate_version = true
)]
pub struct CrownNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the Crown node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a scenario file.
    Run(RunArgs),
    /// Parse and validate a scenario file without executing it.
    Check(CheckArgs),
    /// Print version information and exit.
    Version,
}

/// Logging options shared by every subcommand that does work.
#[derive(Args, Debug)]
pub struct LogArgs {
    /// Tracing filter directives. `RUST_LOG` takes precedence when set.
    #[arg(long = "log", env = "CROWN_LOG", default_value = DEFAULT_LOG_FILTER)]
    pub filter: String,

    /// Log output format: `pretty` or `json`.
    #[arg(long = "log-format", env = "CROWN_LOG_FORMAT", default_value = "pretty")]
    pub format: String,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the scenario file (JSON).
    #[arg(env = "CROWN_SCENARIO", default_value = DEFAULT_SCENARIO_FILE)]
    pub scenario: PathBuf,

    /// Stop at the first reverted step and exit non-zero.
    #[arg(long)]
    pub strict: bool,

    /// Dump run metrics in Prometheus text format to stderr when done.
    #[arg(long)]
    pub metrics: bool,

    #[command(flatten)]
    pub log: LogArgs,
}

/// Arguments for the `check` subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to the scenario file (JSON).
    #[arg(env = "CROWN_SCENARIO", default_value = DEFAULT_SCENARIO_FILE)]
    pub scenario: PathBuf,

    #[command(flatten)]
    pub log: LogArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        CrownNodeCli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = CrownNodeCli::try_parse_from([
            "crown-node",
            "run",
            "demo.json",
            "--strict",
            "--log-format",
            "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.scenario, PathBuf::from("demo.json"));
                assert!(args.strict);
                assert!(!args.metrics);
                assert_eq!(args.log.format, "json");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
