//! Parallel scheduler
//!
//! The corpus is cut into contiguous shards, one per worker thread. Each
//! worker runs its tests one after another and keeps results to itself; the
//! scheduler waits for all of them and merges by test order, so the worker
//! count never changes what is reported.

use crate::classifier::{classify, Verdict};
use crate::corpus::TestCase;
use crate::error::{HarnessError, HarnessResult};
use crate::report::ReportEntry;
use crate::runner::ProcessRunner;
use tracing::{debug, info};

/// Results of one worker, in shard order
#[derive(Debug, Clone)]
pub struct ShardResult {
    /// Shard index
    pub index: usize,
    /// (test, verdict) pairs
    pub entries: Vec<(TestCase, Verdict)>,
}

impl ShardResult {
    /// `testId: verdict` lines of this shard
    pub fn lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(test, verdict)| format!("{}: {}", test.id(), verdict))
            .collect()
    }
}

/// Split `tests` into at most `workers` contiguous shards
///
/// Shard sizes differ by at most one; earlier shards take the remainder.
pub fn partition(tests: &[TestCase], workers: usize) -> Vec<&[TestCase]> {
    if tests.is_empty() {
        return Vec::new();
    }
    let workers = workers.clamp(1, tests.len());
    let base = tests.len() / workers;
    let extra = tests.len() % workers;

    let mut shards = Vec::with_capacity(workers);
    let mut start = 0;
    for index in 0..workers {
        let len = base + usize::from(index < extra);
        shards.push(&tests[start..start + len]);
        start += len;
    }
    shards
}

/// Fans tests out across worker threads
#[derive(Debug)]
pub struct Scheduler<'a> {
    runner: &'a ProcessRunner,
    workers: usize,
}

impl<'a> Scheduler<'a> {
    /// Create a scheduler with `workers` workers
    pub fn new(runner: &'a ProcessRunner, workers: usize) -> HarnessResult<Self> {
        if workers == 0 {
            return Err(HarnessError::InvalidWorkers(workers));
        }
        Ok(Self { runner, workers })
    }

    /// Number of workers
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every test exactly once and return entries in test order
    pub fn run(&self, tests: &[TestCase]) -> HarnessResult<Vec<ReportEntry>> {
        let shards = partition(tests, self.workers);
        info!(
            tests = tests.len(),
            workers = shards.len(),
            "starting conformance run"
        );

        let runner = self.runner;
        let outcomes: Vec<HarnessResult<ShardResult>> = crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = shards
                .iter()
                .enumerate()
                .map(|(index, shard)| scope.spawn(move |_| run_shard(runner, index, shard)))
                .collect();
            handles
                .into_iter()
                .enumerate()
                .map(|(index, handle)| {
                    handle
                        .join()
                        .unwrap_or(Err(HarnessError::WorkerPanicked { shard: index }))
                })
                .collect()
        })
        .map_err(|_| HarnessError::WorkerPanicked { shard: 0 })?;

        merge(outcomes)
    }
}

fn run_shard(runner: &ProcessRunner, index: usize, shard: &[TestCase]) -> HarnessResult<ShardResult> {
    let mut entries = Vec::with_capacity(shard.len());
    for test in shard {
        runner.cancel_token().check()?;
        let execution = runner.run(test)?;
        let verdict = classify(&execution);
        debug!(shard = index, test = test.id(), verdict = %verdict, "classified");
        entries.push((test.clone(), verdict));
    }
    Ok(ShardResult { index, entries })
}

/// Join shard outcomes into report entries sorted by test order
///
/// An interruption wins over any other error so the caller exits with the
/// signal status.
pub fn merge(outcomes: Vec<HarnessResult<ShardResult>>) -> HarnessResult<Vec<ReportEntry>> {
    let mut shards = Vec::with_capacity(outcomes.len());
    let mut first_error = None;
    for outcome in outcomes {
        match outcome {
            Ok(shard) => shards.push(shard),
            Err(err) if err.is_interrupted() => return Err(err),
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }
    if let Some(err) = first_error {
        return Err(err);
    }

    let mut combined: Vec<(TestCase, Verdict)> =
        shards.into_iter().flat_map(|shard| shard.entries).collect();
    combined.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(combined
        .into_iter()
        .map(|(test, verdict)| ReportEntry::new(test.id(), verdict))
        .collect())
}
