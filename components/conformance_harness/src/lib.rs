//! Engine Conformance Harness
//!
//! Runs an external JavaScript engine binary against a corpus of standalone
//! test scripts, classifies each run from its console output, and produces a
//! deterministic report regardless of how many workers ran the corpus.

pub mod adapter;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod error;
pub mod harness;
pub mod interrupt;
pub mod natural;
pub mod report;
pub mod runner;
pub mod scheduler;
pub mod scores;

pub use adapter::{EngineProfile, OutputAdapter};
pub use classifier::{classify, Verdict};
pub use cli::Cli;
pub use config::HarnessConfig;
pub use corpus::{CorpusLocator, Selection, TestCase};
pub use error::{HarnessError, HarnessResult};
pub use harness::{ConformanceHarness, RunOutcome};
pub use interrupt::CancelToken;
pub use report::{Report, ReportEntry, Summary};
pub use runner::{ExecutionResult, ProcessRunner};
pub use scheduler::Scheduler;
pub use scores::Scoreboard;
