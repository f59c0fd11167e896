//! Output classification
//!
//! Engine output is free text in whatever shape the engine likes. It goes
//! through [`PIPELINE`], an ordered list of line transforms, and the result
//! decides the [`Verdict`]:
//!
//! 1. the first [`NORMALIZE_STEPS`] steps clean up formatting noise; the clean
//!    `<test>: OK` sentinel is looked for in their output
//! 2. the next steps keep only lines that look like a diagnostic
//! 3. the rest tidy the kept lines into a one-line failure message
//!
//! The rule set is tuned on observed engines; new engines may need extra
//! steps, which slot into the list without touching [`classify`].

use crate::runner::ExecutionResult;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::sync::OnceLock;

/// Steps that only normalize formatting
pub const NORMALIZE_STEPS: usize = 4;

/// Steps up to and including relevance filtering
pub const FILTER_STEPS: usize = 6;

/// Longest failure message kept, in characters
pub const MAX_MESSAGE_CHARS: usize = 300;

/// Relevant output must be longer than this to count as a failure message
pub const MIN_MESSAGE_CHARS: usize = 5;

/// Classified outcome of one test
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Clean sentinel seen
    Ok,
    /// Non-passing run with a description
    Failed(String),
    /// Terminated by a signal, with any relevant output
    Crashed {
        /// Signal number
        signal: i32,
        /// Filtered output printed before the crash
        detail: Option<String>,
    },
    /// Killed at the timeout ceiling without saying anything
    Timeout,
}

impl Verdict {
    /// Check if the verdict is a pass
    pub fn is_ok(&self) -> bool {
        matches!(self, Verdict::Ok)
    }

    /// Check if the verdict is a crash
    pub fn is_crash(&self) -> bool {
        matches!(self, Verdict::Crashed { .. })
    }

    /// Check if the verdict is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Verdict::Timeout)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Ok => f.write_str("OK"),
            Verdict::Failed(message) => f.write_str(message),
            Verdict::Crashed {
                signal,
                detail: None,
            } => write!(f, "crashed (signal {signal})"),
            Verdict::Crashed {
                signal,
                detail: Some(detail),
            } => write!(f, "crashed (signal {signal}): {detail}"),
            Verdict::Timeout => f.write_str("timeout"),
        }
    }
}

/// Per-test facts the transforms need
#[derive(Debug, Clone)]
pub struct ClassifyContext {
    test_name: String,
    replacements: Vec<String>,
}

impl ClassifyContext {
    /// Context for `test_name` whose output may mention any of `paths`
    pub fn new(test_name: impl Into<String>, paths: impl IntoIterator<Item = String>) -> Self {
        let mut replacements: Vec<String> = paths.into_iter().filter(|p| !p.is_empty()).collect();
        // Longest first, so a path is never half-replaced through its suffix.
        replacements.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        replacements.dedup();
        Self {
            test_name: test_name.into(),
            replacements,
        }
    }

    /// Context for an execution result
    ///
    /// Every spelling an engine may echo for the test file is replaced:
    /// scratch copies, the absolute path (also symlink-resolved), the path
    /// as invoked and the corpus-relative id.
    pub fn from_result(result: &ExecutionResult) -> Self {
        let canonical = fs::canonicalize(&result.absolute_path).ok();
        let paths = result
            .scratch_paths
            .iter()
            .chain([&result.absolute_path, &result.test_path])
            .chain(canonical.as_ref())
            .map(|p| p.to_string_lossy().into_owned())
            .chain([result.test_id.clone()]);
        Self::new(result.test_name.clone(), paths)
    }

    /// Base name of the test
    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    fn prefix(&self) -> String {
        format!("{}: ", self.test_name)
    }
}

/// One named transform in the pipeline
#[derive(Clone, Copy)]
pub struct NormalizeStep {
    /// Short name, for diagnostics
    pub name: &'static str,
    /// The transform
    pub apply: fn(Vec<String>, &ClassifyContext) -> Vec<String>,
}

impl fmt::Debug for NormalizeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizeStep").field("name", &self.name).finish()
    }
}

/// The ordered transform pipeline
pub const PIPELINE: &[NormalizeStep] = &[
    NormalizeStep {
        name: "strip-log-levels",
        apply: strip_log_levels,
    },
    NormalizeStep {
        name: "strip-timestamps",
        apply: strip_timestamps,
    },
    NormalizeStep {
        name: "strip-escapes",
        apply: strip_escape_sequences,
    },
    NormalizeStep {
        name: "canonical-paths",
        apply: canonicalize_paths,
    },
    NormalizeStep {
        name: "drop-failure-echoes",
        apply: drop_failure_echoes,
    },
    NormalizeStep {
        name: "keep-relevant",
        apply: keep_relevant_lines,
    },
    NormalizeStep {
        name: "unwrap-test-prefix",
        apply: unwrap_test_prefix,
    },
    NormalizeStep {
        name: "strip-error-prefix",
        apply: strip_error_prefix,
    },
    NormalizeStep {
        name: "collapse",
        apply: collapse_lines,
    },
];

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    // Patterns are literals in this module.
    cell.get_or_init(|| Regex::new(pattern).unwrap())
}

/// Drop `[INFO]`, `debug:` and similar level tags at line start
pub fn strip_log_levels(lines: Vec<String>, _ctx: &ClassifyContext) -> Vec<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(
        &RE,
        r"(?i)^\s*(?:\[(?:info|debug|trace|verbose|notice|log|warn|warning)\]:?|(?:info|debug|trace|verbose|notice|log|warn|warning):)\s*",
    );
    lines
        .into_iter()
        .map(|line| re.replace(&line, "").into_owned())
        .collect()
}

/// Drop ISO-8601-like timestamps at line start
pub fn strip_timestamps(lines: Vec<String>, _ctx: &ClassifyContext) -> Vec<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(
        &RE,
        r"^\s*\[?\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:[.,]\d+)?(?:Z|[+-]\d{2}:?\d{2})?\]?\s*",
    );
    lines
        .into_iter()
        .map(|line| re.replace(&line, "").into_owned())
        .collect()
}

/// Remove terminal color and control sequences
pub fn strip_escape_sequences(lines: Vec<String>, _ctx: &ClassifyContext) -> Vec<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(
        &RE,
        r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]|\r",
    );
    lines
        .into_iter()
        .map(|line| re.replace_all(&line, "").into_owned())
        .collect()
}

/// Rewrite scratch and absolute test paths to the test's base name
pub fn canonicalize_paths(lines: Vec<String>, ctx: &ClassifyContext) -> Vec<String> {
    lines
        .into_iter()
        .map(|line| {
            ctx.replacements
                .iter()
                .fold(line, |line, path| line.replace(path.as_str(), &ctx.test_name))
        })
        .collect()
}

/// Drop repeats of a `<test>: failed...` line already seen
pub fn drop_failure_echoes(lines: Vec<String>, ctx: &ClassifyContext) -> Vec<String> {
    let marker = format!("{}: failed", ctx.test_name);
    let mut seen = HashSet::new();
    lines
        .into_iter()
        .filter(|line| !line.starts_with(&marker) || seen.insert(line.clone()))
        .collect()
}

/// Keep diagnostic-looking lines and lines addressed to the test
pub fn keep_relevant_lines(lines: Vec<String>, ctx: &ClassifyContext) -> Vec<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(
        &RE,
        r"(?i)error|panic|exception|uncaught|mismatch|invalid|incorrect|unsupported|cannot|can't|fail",
    );
    let prefix = ctx.prefix();
    lines
        .into_iter()
        .filter(|line| line.starts_with(&prefix) || re.is_match(line))
        .collect()
}

/// `<test>: exception: X` and `<test>: failed: X` become `X;`
pub fn unwrap_test_prefix(lines: Vec<String>, ctx: &ClassifyContext) -> Vec<String> {
    let exception = format!("{}: exception: ", ctx.test_name);
    let failed = format!("{}: failed: ", ctx.test_name);
    lines
        .into_iter()
        .map(|line| {
            match line
                .strip_prefix(&exception)
                .or_else(|| line.strip_prefix(&failed))
            {
                Some(payload) => format!("{payload};"),
                None => line,
            }
        })
        .collect()
}

/// Strip leftover `Uncaught ` / `exception: ` prefixes
pub fn strip_error_prefix(lines: Vec<String>, _ctx: &ClassifyContext) -> Vec<String> {
    lines
        .into_iter()
        .map(|line| {
            let mut rest = line.as_str();
            while let Some(stripped) = rest
                .strip_prefix("Uncaught ")
                .or_else(|| rest.strip_prefix("exception: "))
            {
                rest = stripped;
            }
            rest.to_string()
        })
        .collect()
}

/// Collapse whitespace, drop blank lines and consecutive duplicates
pub fn collapse_lines(lines: Vec<String>, _ctx: &ClassifyContext) -> Vec<String> {
    let mut collapsed: Vec<String> = lines
        .iter()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect();
    collapsed.dedup();
    collapsed
}

/// Join lines into the final one-line message
pub fn render_message(lines: &[String]) -> String {
    let joined = lines.join(" ");
    let trimmed = joined.trim_matches(|c: char| c.is_whitespace() || c == ',' || c == ':');
    trimmed.chars().take(MAX_MESSAGE_CHARS).collect()
}

/// Run `steps` over `lines` in order
pub fn apply_steps(
    steps: &[NormalizeStep],
    lines: Vec<String>,
    ctx: &ClassifyContext,
) -> Vec<String> {
    steps.iter().fold(lines, |lines, step| (step.apply)(lines, ctx))
}

/// Whether normalized output carries a clean success sentinel
///
/// The exact `<test>: OK` line must be present and no `<test>: fail` or
/// `<test>: exception` marker anywhere, case-insensitively.
pub fn has_clean_sentinel(lines: &[String], test_name: &str) -> bool {
    let sentinel = format!("{test_name}: OK");
    if !lines.iter().any(|line| line.trim() == sentinel) {
        return false;
    }
    let fail_marker = format!("{test_name}: fail").to_lowercase();
    let exception_marker = format!("{test_name}: exception").to_lowercase();
    !lines.iter().any(|line| {
        let line = line.to_lowercase();
        line.contains(&fail_marker) || line.contains(&exception_marker)
    })
}

/// Classify one execution
pub fn classify(result: &ExecutionResult) -> Verdict {
    let ctx = ClassifyContext::from_result(result);
    let lines: Vec<String> = result.output_text().lines().map(str::to_string).collect();
    classify_lines(lines, &ctx, result.signal, result.exit_recorded)
}

/// Classify raw output lines given how the process ended
pub fn classify_lines(
    lines: Vec<String>,
    ctx: &ClassifyContext,
    signal: Option<i32>,
    exit_recorded: bool,
) -> Verdict {
    let normalized = apply_steps(&PIPELINE[..NORMALIZE_STEPS], lines, ctx);
    if signal.is_none() && has_clean_sentinel(&normalized, ctx.test_name()) {
        return Verdict::Ok;
    }

    let relevant = apply_steps(&PIPELINE[NORMALIZE_STEPS..FILTER_STEPS], normalized, ctx);
    let substantive = relevant.iter().map(|l| l.trim().chars().count()).sum::<usize>()
        > MIN_MESSAGE_CHARS;
    let message = render_message(&apply_steps(&PIPELINE[FILTER_STEPS..], relevant, ctx));
    let detail = (substantive && !message.is_empty()).then_some(message);

    match (signal, detail) {
        (Some(signal), detail) => Verdict::Crashed { signal, detail },
        (None, Some(message)) => Verdict::Failed(message),
        (None, None) if !exit_recorded => Verdict::Timeout,
        (None, None) => Verdict::Failed("failed".to_string()),
    }
}
