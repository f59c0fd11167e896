//! Per-category conformance scores
//!
//! Compat-table tests come in feature groups of very different sizes, so
//! they are weighted: a group is worth 1, 2, 4 or 8 depending on its size
//! tag, split evenly across its tests. Everything else weighs 1.

use crate::corpus::category_rank;
use crate::error::{HarnessError, HarnessResult};
use crate::natural::natural_cmp;
use crate::report::Report;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// Weight map file name inside the corpus root
pub const WEIGHTS_FILE: &str = "gen-kangax.json";

#[derive(Debug, Deserialize)]
struct KangaxMap {
    map: BTreeMap<String, String>,
}

/// Per-test weights
#[derive(Debug, Clone, Default)]
pub struct Weights {
    by_test: HashMap<String, f64>,
}

impl Weights {
    /// Parse a `{"map": {"<feature> (<size>) > <sub>": "<test id>"}}` document
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        static GROUP: OnceLock<Regex> = OnceLock::new();
        let re = GROUP.get_or_init(|| {
            Regex::new(r"^(.*) \((tiny|small|medium|large)\) > .*").unwrap()
        });

        let kangax: KangaxMap = serde_json::from_str(json)?;
        let mut group_sizes: HashMap<&str, usize> = HashMap::new();
        for key in kangax.map.keys() {
            if let Some(caps) = re.captures(key) {
                let group = caps.get(1).map_or("", |m| m.as_str());
                *group_sizes.entry(group).or_default() += 1;
            }
        }

        let mut by_test = HashMap::new();
        for (key, test) in &kangax.map {
            let weight = match re.captures(key) {
                Some(caps) => {
                    let group = caps.get(1).map_or("", |m| m.as_str());
                    let size = match caps.get(2).map(|m| m.as_str()) {
                        Some("tiny") => 1.0,
                        Some("small") => 2.0,
                        Some("medium") => 4.0,
                        _ => 8.0,
                    };
                    size / group_sizes.get(group).copied().unwrap_or(1) as f64
                }
                None => 1.0,
            };
            by_test.insert(test.clone(), weight);
        }
        Ok(Self { by_test })
    }

    /// Load `gen-kangax.json` from the corpus root, if present
    pub fn load(corpus_root: &Path) -> HarnessResult<Self> {
        let path = corpus_root.join(WEIGHTS_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let json = fs::read_to_string(&path).map_err(|e| HarnessError::io(&path, e))?;
        Self::from_json(&json).map_err(|source| HarnessError::Weights { path, source })
    }

    /// Weight of a test id
    pub fn weight(&self, test_id: &str) -> f64 {
        self.by_test.get(test_id).copied().unwrap_or(1.0)
    }
}

/// Format a 0..=1 score; only a perfect score shows as `100%`
pub fn format_score(score: f64) -> String {
    if score >= 1.0 {
        "100%".to_string()
    } else {
        format!("{:.0}%", score.min(0.99) * 100.0)
    }
}

/// Whether a verdict text describes a crash
pub fn is_crash_text(result: &str) -> bool {
    result.starts_with("crashed") || result.starts_with("panic:")
}

/// Score of one category or aggregate
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryScore {
    /// Category directory or aggregate name
    pub name: String,
    /// Weighted passing fraction
    pub score: f64,
    /// Number of crashed tests
    pub crashes: usize,
}

#[derive(Debug, Default)]
struct Tally {
    passed: f64,
    total: f64,
    crashes: usize,
}

/// Scores of every category present in a report
#[derive(Debug, Clone, Default)]
pub struct Scoreboard {
    categories: Vec<CategoryScore>,
    aggregates: Vec<CategoryScore>,
}

impl Scoreboard {
    /// Score `report` with `weights`
    ///
    /// Ids without a category directory are not scored.
    pub fn score(report: &Report, weights: &Weights) -> Self {
        let mut tallies: HashMap<&str, Tally> = HashMap::new();
        for entry in report.entries() {
            let Some((category, _)) = entry.test_id().split_once('/') else {
                continue;
            };
            let weight = weights.weight(entry.test_id());
            let tally = tallies.entry(category).or_default();
            tally.total += weight;
            if entry.verdict().is_ok() {
                tally.passed += weight;
            }
            if is_crash_text(&entry.verdict().to_string()) {
                tally.crashes += 1;
            }
        }

        let mut names: Vec<&str> = tallies.keys().copied().collect();
        names.sort_by(|a, b| {
            category_rank(a)
                .cmp(&category_rank(b))
                .then_with(|| natural_cmp(a, b))
        });

        let categories = names
            .iter()
            .map(|name| {
                let tally = &tallies[name];
                CategoryScore {
                    name: name.to_string(),
                    score: ratio(tally.passed, tally.total),
                    crashes: tally.crashes,
                }
            })
            .collect();

        let aggregates = [("es1-es5", r"^es[1-5]$"), ("kangax-es2016plus", r"^kangax-es20..$")]
            .iter()
            .filter_map(|(name, pattern)| aggregate(name, pattern, &tallies))
            .collect();

        Self {
            categories,
            aggregates,
        }
    }

    /// Per-category scores in category order
    pub fn categories(&self) -> &[CategoryScore] {
        &self.categories
    }

    /// Aggregate scores over category families
    pub fn aggregates(&self) -> &[CategoryScore] {
        &self.aggregates
    }

    /// Score of a category or aggregate by name
    pub fn get(&self, name: &str) -> Option<&CategoryScore> {
        self.categories
            .iter()
            .chain(&self.aggregates)
            .find(|score| score.name == name)
    }

    /// Total crashes across categories
    pub fn crashes(&self) -> usize {
        self.categories.iter().map(|c| c.crashes).sum()
    }

    /// Check if nothing was scored
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Scores are kept to four decimals before formatting
const SCORE_PRECISION: f64 = 10_000.0;

/// Passing fraction rounded to four decimals
fn ratio(passed: f64, total: f64) -> f64 {
    if total > 0.0 {
        (passed / total * SCORE_PRECISION).round() / SCORE_PRECISION
    } else {
        0.0
    }
}

fn aggregate(name: &str, pattern: &str, tallies: &HashMap<&str, Tally>) -> Option<CategoryScore> {
    let re = Regex::new(pattern).ok()?;
    let mut passed = 0.0;
    let mut total = 0.0;
    let mut crashes = 0;
    for (category, tally) in tallies {
        if re.is_match(category) {
            passed += tally.passed;
            total += tally.total;
            crashes += tally.crashes;
        }
    }
    (total > 0.0).then(|| CategoryScore {
        name: name.to_string(),
        score: ratio(passed, total),
        crashes,
    })
}

impl fmt::Display for CategoryScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, format_score(self.score))?;
        match self.crashes {
            0 => Ok(()),
            1 => write!(f, ", 1 crash"),
            n => write!(f, ", {n} crashes"),
        }
    }
}

impl fmt::Display for Scoreboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for score in self.categories.iter().chain(&self.aggregates) {
            writeln!(f, "{score}")?;
        }
        Ok(())
    }
}
