//! Command-line interface

use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Run a JavaScript engine against the conformance corpus
///
/// Trailing arguments that name existing files or directories, or end in
/// `.js`, select tests; everything before them is the engine command. Put
/// `--` between the two when the engine's own arguments look like tests.
#[derive(Debug, Parser)]
#[command(name = "conformance_runner", version)]
pub struct Cli {
    /// Write the report to this file (requires --metadata)
    #[arg(short = 'o', long = "output", value_name = "OUTPUT_FILE")]
    pub output: Option<PathBuf>,

    /// Number of parallel workers
    #[arg(short = 'j', long = "jobs", value_name = "NUM_WORKERS", default_value_t = 1)]
    pub jobs: usize,

    /// Include experimental tests in default corpus selection
    #[arg(long)]
    pub next: bool,

    /// Per-test timeout in seconds
    #[arg(short = 't', long, value_name = "SECONDS", default_value_t = 3.0)]
    pub timeout: f64,

    /// Directory holding the test categories
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub corpus_root: PathBuf,

    /// Engine metadata JSON, emitted as the report's first line
    #[arg(long, value_name = "FILE")]
    pub metadata: Option<PathBuf>,

    /// Do not echo engine output
    #[arg(short, long)]
    pub quiet: bool,

    /// Verbose diagnostics
    #[arg(short, long)]
    pub verbose: bool,

    /// Engine command followed by optional test files or directories
    #[arg(
        value_name = "ENGINE_COMMAND",
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
}

impl Cli {
    /// Build the run configuration
    pub fn to_config(&self) -> HarnessResult<HarnessConfig> {
        if self.jobs == 0 {
            return Err(HarnessError::InvalidWorkers(self.jobs));
        }
        if !self.timeout.is_finite() || self.timeout <= 0.0 {
            return Err(HarnessError::InvalidTimeout(self.timeout));
        }

        let mut config = HarnessConfig::new()
            .with_corpus_root(&self.corpus_root)
            .with_timeout(Duration::from_secs_f64(self.timeout))
            .with_workers(self.jobs)
            .with_next(self.next)
            .with_echo(!self.quiet);
        if let Some(output) = &self.output {
            config = config.with_output(output);
        }
        if let Some(metadata) = &self.metadata {
            config = config.with_metadata(metadata);
        }
        Ok(config)
    }

    /// Default log filter directive
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "warn"
        }
    }
}
