//! Unit tests for command-line parsing

use clap::Parser;
use conformance_harness::{Cli, HarnessError};
use std::path::PathBuf;
use std::time::Duration;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("conformance_runner").chain(args.iter().copied())).unwrap()
}

#[test]
fn test_defaults() {
    let cli = parse(&["d8"]);
    assert_eq!(cli.command, vec!["d8"]);
    assert_eq!(cli.jobs, 1);
    assert_eq!(cli.timeout, 3.0);
    assert!(!cli.next);
    assert!(cli.output.is_none());

    let config = cli.to_config().unwrap();
    assert_eq!(config.workers, 1);
    assert_eq!(config.timeout, Duration::from_secs(3));
    assert_eq!(config.corpus_root, PathBuf::from("."));
    assert!(config.echo_output);
}

#[test]
fn test_options_before_engine_command() {
    let cli = parse(&["-o", "report.txt", "-j", "4", "--next", "qjs", "es5/a.js"]);
    assert_eq!(cli.output, Some(PathBuf::from("report.txt")));
    assert_eq!(cli.jobs, 4);
    assert!(cli.next);
    assert_eq!(cli.command, vec!["qjs", "es5/a.js"]);
}

#[test]
fn test_engine_flags_are_not_harness_options() {
    let cli = parse(&["d8", "--jitless", "-j", "es5"]);
    assert_eq!(cli.jobs, 1);
    assert_eq!(cli.command, vec!["d8", "--jitless", "-j", "es5"]);
}

#[test]
fn test_engine_command_is_required() {
    assert!(Cli::try_parse_from(["conformance_runner"]).is_err());
    assert!(Cli::try_parse_from(["conformance_runner", "-j", "2"]).is_err());
}

#[test]
fn test_zero_jobs_rejected() {
    let err = parse(&["-j", "0", "d8"]).to_config().unwrap_err();
    assert!(matches!(err, HarnessError::InvalidWorkers(0)));
}

#[test]
fn test_non_positive_timeout_rejected() {
    let err = parse(&["-t", "0", "d8"]).to_config().unwrap_err();
    assert!(matches!(err, HarnessError::InvalidTimeout(_)));
}

#[test]
fn test_fractional_timeout() {
    let config = parse(&["--timeout", "0.5", "d8"]).to_config().unwrap();
    assert_eq!(config.timeout, Duration::from_millis(500));
}

#[test]
fn test_quiet_disables_echo_and_verbose_raises_level() {
    let cli = parse(&["-q", "-v", "--metadata", "meta.json", "d8"]);
    let config = cli.to_config().unwrap();
    assert!(!config.echo_output);
    assert_eq!(config.metadata, Some(PathBuf::from("meta.json")));
    assert_eq!(cli.log_level(), "debug");
    assert_eq!(parse(&["d8"]).log_level(), "warn");
}
