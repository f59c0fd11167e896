//! Run configuration

use crate::runner::DEFAULT_TIMEOUT;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Parameters of one conformance run
#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    /// Directory holding the category folders
    pub corpus_root: PathBuf,
    /// Per-test wall-clock ceiling
    pub timeout: Duration,
    /// Number of parallel workers
    pub workers: usize,
    /// Enumerate the experimental category in default mode
    pub include_next: bool,
    /// Echo engine output to the console
    pub echo_output: bool,
    /// Report file
    pub output: Option<PathBuf>,
    /// Engine metadata JSON file
    pub metadata: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            corpus_root: PathBuf::from("."),
            timeout: DEFAULT_TIMEOUT,
            workers: 1,
            include_next: false,
            echo_output: true,
            output: None,
            metadata: None,
        }
    }
}

impl HarnessConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the corpus root
    pub fn with_corpus_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.corpus_root = root.into();
        self
    }

    /// Set the per-test timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Include the experimental category
    pub fn with_next(mut self, include_next: bool) -> Self {
        self.include_next = include_next;
        self
    }

    /// Echo engine output
    pub fn with_echo(mut self, echo_output: bool) -> Self {
        self.echo_output = echo_output;
        self
    }

    /// Set the report file
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Set the engine metadata file
    pub fn with_metadata(mut self, metadata: impl Into<PathBuf>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    /// Corpus root
    pub fn corpus_root(&self) -> &Path {
        &self.corpus_root
    }
}
