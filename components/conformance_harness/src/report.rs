use crate::classifier::Verdict;
use crate::error::{HarnessError, HarnessResult};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Suffix of a passing report line
pub const PASS_SUFFIX: &str = ": OK";

/// Prefix of the optional metadata line
pub const METADATA_PREFIX: &str = "Metadata: ";

/// One report line: a test id and its verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    test_id: String,
    verdict: Verdict,
}

impl ReportEntry {
    /// Create an entry
    pub fn new(test_id: impl Into<String>, verdict: Verdict) -> Self {
        Self {
            test_id: test_id.into(),
            verdict,
        }
    }

    /// Test id
    pub fn test_id(&self) -> &str {
        &self.test_id
    }

    /// Verdict
    pub fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    /// `testId: verdict`
    pub fn line(&self) -> String {
        format!("{}: {}", self.test_id, self.verdict)
    }
}

/// Build the metadata line from an engine metadata JSON document
///
/// The document is re-serialized compactly so the line stays one line.
pub fn metadata_line(json: &str) -> HarnessResult<String> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    Ok(format!("{METADATA_PREFIX}{}", serde_json::to_string(&value)?))
}

/// Read engine metadata from `path` and build the metadata line
pub fn load_metadata(path: &Path) -> HarnessResult<String> {
    let json = fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
    metadata_line(&json)
}

/// Final merged report of a run
#[derive(Debug, Clone)]
pub struct Report {
    metadata: Option<String>,
    entries: Vec<ReportEntry>,
    pass_count: usize,
    total_count: usize,
}

impl Report {
    /// Create a report from merged entries
    pub fn new(entries: Vec<ReportEntry>, metadata: Option<String>) -> Self {
        let pass_count = entries
            .iter()
            .filter(|entry| entry.line().ends_with(PASS_SUFFIX))
            .count();
        let total_count = entries.len();
        Self {
            metadata,
            entries,
            pass_count,
            total_count,
        }
    }

    /// Metadata line, if engine metadata was available
    pub fn metadata(&self) -> Option<&str> {
        self.metadata.as_deref()
    }

    /// Entries in test order
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// Number of passing tests
    pub fn pass_count(&self) -> usize {
        self.pass_count
    }

    /// Number of tests
    pub fn total_count(&self) -> usize {
        self.total_count
    }

    /// Number of non-passing tests
    pub fn fail_count(&self) -> usize {
        self.total_count - self.pass_count
    }

    /// Integer percentage of passing tests, rounded down
    pub fn pass_percent(&self) -> usize {
        if self.total_count == 0 {
            100
        } else {
            self.pass_count * 100 / self.total_count
        }
    }

    /// Ids of non-passing tests, in report order
    pub fn failing_ids(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|entry| !entry.line().ends_with(PASS_SUFFIX))
            .map(ReportEntry::test_id)
            .collect()
    }

    /// Report lines without the metadata line
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(ReportEntry::line).collect()
    }

    /// Full report file text
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(metadata) = &self.metadata {
            out.push_str(metadata);
            out.push('\n');
        }
        for line in self.lines() {
            out.push_str(&line);
            out.push('\n');
        }
        out
    }

    /// Write the report to `path`
    ///
    /// Without metadata no file is created at all and `Ok(false)` is returned.
    pub fn write_to(&self, path: &Path) -> HarnessResult<bool> {
        if self.metadata.is_none() {
            warn!(path = %path.display(), "no engine metadata, report file not written");
            return Ok(false);
        }
        fs::write(path, self.render()).map_err(|e| HarnessError::io(path, e))?;
        info!(path = %path.display(), tests = self.total_count, "report written");
        Ok(true)
    }

    /// Console summary
    pub fn summary(&self) -> Summary {
        Summary::of(self)
    }
}

/// Console summary of a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summary {
    /// Every test passed
    AllPassed {
        /// Number of tests
        total: usize,
    },
    /// At least half the tests passed
    MostlyPassed {
        /// Passing tests
        passed: usize,
        /// Number of tests
        total: usize,
        /// Pass percentage, rounded down
        percent: usize,
        /// Ids of failing tests
        failing: Vec<String>,
    },
    /// Fewer than half the tests passed
    MostlyFailed {
        /// Passing tests
        passed: usize,
        /// Number of tests
        total: usize,
        /// Pass percentage, rounded down
        percent: usize,
        /// Ids of failing tests
        failing: Vec<String>,
    },
}

impl Summary {
    /// Summarize `report`
    pub fn of(report: &Report) -> Self {
        let passed = report.pass_count();
        let total = report.total_count();
        if passed == total {
            return Summary::AllPassed { total };
        }
        let percent = report.pass_percent();
        let failing = report
            .failing_ids()
            .into_iter()
            .map(str::to_string)
            .collect();
        if percent >= 50 {
            Summary::MostlyPassed {
                passed,
                total,
                percent,
                failing,
            }
        } else {
            Summary::MostlyFailed {
                passed,
                total,
                percent,
                failing,
            }
        }
    }

    /// Banner line, without the failing-test list
    pub fn banner(&self) -> String {
        match self {
            Summary::AllPassed { total } => format!("All {total} tests passed"),
            Summary::MostlyPassed {
                passed,
                total,
                percent,
                ..
            } => format!(
                "{}/{} test(s) failed ({}% passed)",
                total - passed,
                total,
                percent
            ),
            Summary::MostlyFailed {
                passed,
                total,
                percent,
                ..
            } => format!(
                "{}/{} ({}%) passed, {} test(s) failed",
                passed,
                total,
                percent,
                total - passed
            ),
        }
    }

    /// Failing test ids, space-joined
    pub fn failing_line(&self) -> Option<String> {
        match self {
            Summary::AllPassed { .. } => None,
            Summary::MostlyPassed { failing, .. } | Summary::MostlyFailed { failing, .. } => {
                Some(failing.join(" "))
            }
        }
    }

    /// Check if every test passed
    pub fn is_success(&self) -> bool {
        matches!(self, Summary::AllPassed { .. })
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.is_success() { "✓" } else { "✗" };
        write!(f, "{mark} {}", self.banner())?;
        if let Some(failing) = self.failing_line() {
            write!(f, "\nFailed: {failing}")?;
        }
        Ok(())
    }
}

/// Where the report ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportDestination {
    /// Written to a file
    File(PathBuf),
    /// Only available for the console
    Console,
}
