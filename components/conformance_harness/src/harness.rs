use crate::adapter::EngineProfile;
use crate::config::HarnessConfig;
use crate::corpus::{CorpusLocator, Selection, TestCase};
use crate::error::{HarnessError, HarnessResult};
use crate::interrupt::CancelToken;
use crate::report::{load_metadata, Report, ReportDestination};
use crate::runner::{resolve_engine, ProcessRunner};
use crate::scheduler::Scheduler;
use crate::scores::{Scoreboard, Weights};
use tracing::{info, warn};

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Merged report
    pub report: Report,
    /// Where the report was persisted
    pub destination: ReportDestination,
    /// Per-category scores
    pub scores: Scoreboard,
}

/// Conformance harness: ties locator, runner, classifier, scheduler and
/// report together for one engine command
#[derive(Debug, Clone)]
pub struct ConformanceHarness {
    config: HarnessConfig,
    cancel: CancelToken,
}

impl ConformanceHarness {
    /// Create a harness with `config`
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Use an externally owned cancellation token
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Configuration in effect
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Token that stops the run
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Split trailing arguments and resolve the tests they select
    pub fn plan(&self, args: &[String]) -> HarnessResult<(Selection, Vec<TestCase>)> {
        let selection = Selection::split(args)?;
        let locator = CorpusLocator::new(self.config.corpus_root())
            .with_next(self.config.include_next);
        let tests = locator.locate(&selection.tests)?;
        Ok((selection, tests))
    }

    /// Run the engine command in `args` over the selected corpus
    ///
    /// The engine is resolved before anything runs; an unresolvable engine
    /// aborts the run with no test attempted.
    pub fn run(&self, args: &[String]) -> HarnessResult<RunOutcome> {
        let (selection, tests) = self.plan(args)?;
        let program = selection.engine.first().ok_or(HarnessError::NoEngineCommand)?;
        let resolved = resolve_engine(program)?;
        let profile = EngineProfile::for_command(program);
        info!(
            engine = %resolved.display(),
            profile = profile.identifier(),
            adapter = ?profile.adapter(),
            "engine resolved"
        );

        let metadata = self
            .config
            .metadata
            .as_deref()
            .map(load_metadata)
            .transpose()?;
        let weights = Weights::load(self.config.corpus_root())?;

        if tests.is_empty() {
            warn!(root = %self.config.corpus_root().display(), "no tests selected");
        }

        let runner = ProcessRunner::new(selection.engine.clone(), profile, self.cancel.clone())
            .with_timeout(self.config.timeout)
            .with_echo(self.config.echo_output);
        let entries = Scheduler::new(&runner, self.config.workers)?.run(&tests)?;
        let report = Report::new(entries, metadata);

        let destination = match &self.config.output {
            Some(path) if report.write_to(path)? => ReportDestination::File(path.clone()),
            Some(_) | None => ReportDestination::Console,
        };

        let scores = Scoreboard::score(&report, &weights);

        Ok(RunOutcome {
            report,
            destination,
            scores,
        })
    }
}
