//! Error types for the conformance harness
//!
//! Only failures that make a run meaningless surface here. Anything an
//! engine does wrong while evaluating a test becomes a [`Verdict`] instead.
//!
//! [`Verdict`]: crate::classifier::Verdict

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Harness-level errors
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The engine binary could not be located
    #[error("engine not found: {command}")]
    EngineNotFound {
        /// Leading command token as given on the command line
        command: String,
    },

    /// The engine binary was found but could not be started
    #[error("failed to launch engine '{command}': {source}")]
    EngineLaunch {
        /// Program that failed to start
        command: String,
        /// Underlying spawn error
        source: io::Error,
    },

    /// Nothing was left for the engine command after test selection
    #[error("no engine command given")]
    NoEngineCommand,

    /// Worker count of zero
    #[error("invalid worker count: {0}")]
    InvalidWorkers(usize),

    /// Non-positive or non-finite per-test timeout
    #[error("invalid timeout: {0}")]
    InvalidTimeout(f64),

    /// File system error on a harness-owned path
    #[error("{}: {source}", path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// Engine metadata was not valid JSON
    #[error("invalid engine metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    /// Kangax weight map could not be read
    #[error("invalid weight map {}: {source}", path.display())]
    Weights {
        /// Weight map path
        path: PathBuf,
        /// Underlying parse error
        source: serde_json::Error,
    },

    /// A worker thread panicked
    #[error("worker for shard {shard} panicked")]
    WorkerPanicked {
        /// Index of the shard the worker owned
        shard: usize,
    },

    /// The run was interrupted by a signal
    #[error("interrupted by signal {signal}")]
    Interrupted {
        /// Signal number that triggered the interruption
        signal: i32,
    },
}

impl HarnessError {
    /// Build an [`HarnessError::Io`] for `path`
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        HarnessError::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit status for this error
    ///
    /// Interruption maps to the conventional `128 + signal`.
    pub fn exit_code(&self) -> u8 {
        match self {
            HarnessError::Interrupted { signal } => {
                u8::try_from(128 + signal).unwrap_or(u8::MAX)
            }
            _ => 1,
        }
    }

    /// Check if this error is an interruption
    pub fn is_interrupted(&self) -> bool {
        matches!(self, HarnessError::Interrupted { .. })
    }
}

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;
