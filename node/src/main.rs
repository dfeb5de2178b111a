// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Crown Node
//!
//! Entry point for the `crown-node` binary. Parses CLI arguments, initializes
//! logging and metrics, then runs or checks a scenario file.
//!
//! The binary supports three subcommands:
//!
//! - `run`      deploy the scenario's contracts and execute its steps
//! - `check`    parse and validate a scenario without executing it
//! - `version`  print build version information
//!
//! Step reports and the final summary go to stdout as JSON lines; logs and
//! the optional metrics dump go to stderr.

mod cli;
mod logging;
mod metrics;
mod scenario;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::{self, Write};

use cli::{Commands, CrownNodeCli, LogArgs};
use logging::LogFormat;
use metrics::RunMetrics;
use scenario::{Runner, Scenario};

fn main() -> Result<()> {
    let cli = CrownNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_scenario(args),
        Commands::Check(args) => check_scenario(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn init_logging(args: &LogArgs) {
    logging::init_logging(&args.filter, LogFormat::from_str_lossy(&args.format));
}

/// Deploys the scenario's contracts and executes every step.
fn run_scenario(args: cli::RunArgs) -> Result<()> {
    init_logging(&args.log);

    let scenario = Scenario::load(&args.scenario)?;
    scenario
        .validate()
        .with_context(|| format!("invalid scenario {}", args.scenario.display()))?;

    tracing::info!(
        scenario = %args.scenario.display(),
        steps = scenario.steps.len(),
        strict = args.strict,
        "starting run"
    );

    let metrics = if args.metrics {
        Some(RunMetrics::new().context("failed to create metrics registry")?)
    } else {
        None
    };
    let mut runner = Runner::deploy(&scenario).context("failed to deploy scenario contracts")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut halted = None;

    for (index, step) in scenario.steps.iter().enumerate() {
        let report = runner.execute(index, step, metrics.as_ref());
        writeln!(out, "{}", serde_json::to_string(&report)?)
            .context("failed to write step report")?;

        if args.strict && !report.ok {
            halted = Some(report);
            break;
        }
    }

    let summary = runner.summary();
    writeln!(out, "{}", serde_json::to_string(&summary)?).context("failed to write run summary")?;
    out.flush().context("failed to flush stdout")?;

    if let Some(metrics) = &metrics {
        let text = metrics.encode().context("failed to encode metrics")?;
        eprint!("{text}");
    }

    tracing::info!(
        steps = summary.steps,
        reverted = summary.reverted,
        "run finished"
    );

    if let Some(report) = halted {
        bail!(
            "step {} ({}) reverted: {}",
            report.index,
            report.op,
            report.error.unwrap_or_default()
        );
    }
    Ok(())
}

/// Parses and validates a scenario without executing it.
fn check_scenario(args: cli::CheckArgs) -> Result<()> {
    init_logging(&args.log);

    let scenario = Scenario::load(&args.scenario)?;
    scenario
        .validate()
        .with_context(|| format!("invalid scenario {}", args.scenario.display()))?;

    tracing::info!(
        scenario = %args.scenario.display(),
        steps = scenario.steps.len(),
        token = scenario.token.is_some(),
        vault = scenario.vault,
        "scenario is valid"
    );
    println!("ok: {} steps", scenario.steps.len());
    Ok(())
}

/// Prints version information for the binary and kernel.
fn print_version() {
    println!("crown-node {}", env!("CARGO_PKG_VERSION"));
    println!("kernel     {}", crown_protocol::config::KERNEL_VERSION);
    println!(
        "scenario   v{}",
        crown_protocol::config::SCENARIO_FORMAT_VERSION
    );
}
