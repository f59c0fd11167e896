//! Conformance Runner
//!
//! Runs a JavaScript engine over the conformance corpus and prints or
//! writes the merged report.

use clap::Parser;
use conformance_harness::interrupt::install_handlers;
use conformance_harness::report::ReportDestination;
use conformance_harness::{CancelToken, Cli, ConformanceHarness, HarnessResult, RunOutcome};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level())),
        )
        .try_init();

    match run(&cli) {
        Ok(outcome) => {
            print_outcome(&outcome);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(cli: &Cli) -> HarnessResult<RunOutcome> {
    let config = cli.to_config()?;
    let cancel = CancelToken::new();
    install_handlers(&cancel)?;

    ConformanceHarness::new(config)
        .with_cancel_token(cancel)
        .run(&cli.command)
}

fn print_outcome(outcome: &RunOutcome) {
    println!();
    match &outcome.destination {
        ReportDestination::File(path) => println!("Report written to {}", path.display()),
        ReportDestination::Console => {
            for line in outcome.report.lines() {
                println!("{line}");
            }
        }
    }

    println!();
    println!("{}", outcome.report.summary());

    if outcome.scores.categories().len() > 1 || !outcome.scores.aggregates().is_empty() {
        println!();
        print!("{}", outcome.scores);
    }
}
