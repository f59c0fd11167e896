//! Test corpus resolution
//!
//! A corpus is a directory of category folders (`es1`, `es5`, `kangax-es6`,
//! ...) holding standalone `*.js` scripts. Tests are either selected
//! explicitly on the command line or enumerated from the default category
//! sequence.

use crate::error::{HarnessError, HarnessResult};
use crate::natural::natural_path_cmp;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Baseline language editions, always run first
pub const BASELINE_CATEGORIES: &[&str] = &["es1", "es3", "es5"];

/// Optional compat-table suites, run after the baseline
pub const EXTENDED_CATEGORIES: &[&str] = &[
    "kangax-es6",
    "kangax-es2016",
    "kangax-es2017",
    "kangax-es2018",
    "kangax-es2019",
    "kangax-es2020",
    "kangax-es2021",
    "kangax-es2022",
    "kangax-es2023",
    "kangax-es2024",
    "kangax-es2025",
    "kangax-intl",
];

/// Experimental suite, only enumerated with `--next`
pub const NEXT_CATEGORY: &str = "kangax-next";

/// Argument that stops greedy test-selection consumption
pub const SELECTION_SENTINEL: &str = "--";

/// File name suffix of test scripts
pub const TEST_SUFFIX: &str = ".js";

/// Helper files sharing a directory with tests
const FIXTURE_SUFFIX: &str = "_FIXTURE.js";

/// Position of a category in the fixed priority sequence
///
/// Ids outside every known category rank after all of them.
pub fn category_rank(id: &str) -> usize {
    let first = id.split('/').next().unwrap_or(id);
    BASELINE_CATEGORIES
        .iter()
        .chain(EXTENDED_CATEGORIES)
        .chain(std::iter::once(&NEXT_CATEGORY))
        .position(|category| *category == first)
        .unwrap_or(usize::MAX)
}

/// A single test script in the corpus
///
/// Identity is the id; ordering is category rank, then natural order.
#[derive(Debug, Clone)]
pub struct TestCase {
    id: String,
    path: PathBuf,
    rank: usize,
}

impl TestCase {
    /// Create a test case from its id and on-disk location
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let id = id.into();
        let rank = category_rank(&id);
        Self {
            id,
            path: path.into(),
            rank,
        }
    }

    /// Path relative to the corpus root, `/`-separated
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Location used to invoke the engine
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Absolute location, for matching paths echoed back by engines
    pub fn absolute_path(&self) -> PathBuf {
        absolutize(&self.path)
    }

    /// Base file name, as used in the `<name>: OK` sentinel
    pub fn file_name(&self) -> &str {
        self.id.rsplit('/').next().unwrap_or(&self.id)
    }

    /// Category directory, if the id has one
    pub fn category(&self) -> Option<&str> {
        self.id.split_once('/').map(|(category, _)| category)
    }
}

impl PartialEq for TestCase {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TestCase {}

impl PartialOrd for TestCase {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TestCase {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank
            .cmp(&other.rank)
            .then_with(|| natural_path_cmp(&self.id, &other.id))
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Engine command and explicit test selection split out of the trailing
/// command-line arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Engine invocation, binary first
    pub engine: Vec<String>,
    /// Explicitly selected files and directories, in argument order
    pub tests: Vec<PathBuf>,
}

impl Selection {
    /// Split `args` into engine command and test selection
    ///
    /// Arguments are consumed from the end while they name an existing file
    /// or directory or end in `.js`. The first [`SELECTION_SENTINEL`] met
    /// ends consumption and is dropped. The first argument always belongs
    /// to the engine.
    pub fn split(args: &[String]) -> HarnessResult<Self> {
        let mut end = args.len();
        let mut tests = Vec::new();

        while end > 1 {
            let arg = &args[end - 1];
            if arg == SELECTION_SENTINEL {
                end -= 1;
                break;
            }
            if !is_test_like(arg) {
                break;
            }
            tests.push(PathBuf::from(arg));
            end -= 1;
        }

        if end == 0 {
            return Err(HarnessError::NoEngineCommand);
        }

        tests.reverse();
        Ok(Self {
            engine: args[..end].to_vec(),
            tests,
        })
    }
}

fn is_test_like(arg: &str) -> bool {
    arg.ends_with(TEST_SUFFIX) || Path::new(arg).exists()
}

/// Resolves the ordered list of tests to run
#[derive(Debug, Clone)]
pub struct CorpusLocator {
    root: PathBuf,
    include_next: bool,
}

impl CorpusLocator {
    /// Create a locator rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            include_next: false,
        }
    }

    /// Opt the experimental category into default-mode enumeration
    pub fn with_next(mut self, include_next: bool) -> Self {
        self.include_next = include_next;
        self
    }

    /// Corpus root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Categories enumerated in default mode, in priority order
    pub fn categories(&self) -> Vec<&'static str> {
        let mut categories: Vec<&'static str> = BASELINE_CATEGORIES
            .iter()
            .chain(EXTENDED_CATEGORIES)
            .copied()
            .collect();
        if self.include_next {
            categories.push(NEXT_CATEGORY);
        }
        categories
    }

    /// Resolve tests: explicit selection if any, otherwise default mode
    pub fn locate(&self, selection: &[PathBuf]) -> HarnessResult<Vec<TestCase>> {
        if selection.is_empty() {
            self.locate_default()
        } else {
            self.locate_explicit(selection)
        }
    }

    /// Enumerate every default category under the root
    pub fn locate_default(&self) -> HarnessResult<Vec<TestCase>> {
        let mut paths = Vec::new();
        for category in self.categories() {
            let dir = self.root.join(category);
            if !dir.is_dir() {
                debug!(category, "category directory missing, skipping");
                continue;
            }
            paths.extend(self.expand_dir(&dir)?);
        }
        Ok(self.finish(paths))
    }

    /// Expand explicit file and directory arguments
    ///
    /// Directories contribute their immediate `*.js` children; anything
    /// else is taken as a test file as-is.
    pub fn locate_explicit(&self, selection: &[PathBuf]) -> HarnessResult<Vec<TestCase>> {
        let mut paths = Vec::new();
        for entry in selection {
            if entry.is_dir() {
                paths.extend(self.expand_dir(entry)?);
            } else {
                paths.push(entry.clone());
            }
        }
        Ok(self.finish(paths))
    }

    /// Immediate `*.js` children of `dir`, fixtures excluded
    fn expand_dir(&self, dir: &Path) -> HarnessResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
                HarnessError::io(dir, source)
            })?;
            let name = entry.file_name().to_string_lossy();
            if entry.file_type().is_file()
                && name.ends_with(TEST_SUFFIX)
                && !name.ends_with(FIXTURE_SUFFIX)
            {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    fn finish(&self, paths: Vec<PathBuf>) -> Vec<TestCase> {
        let mut seen = HashSet::new();
        let mut tests: Vec<TestCase> = paths
            .into_iter()
            .map(|path| TestCase::new(self.test_id(&path), path))
            .filter(|test| seen.insert(test.id().to_string()))
            .collect();
        tests.sort();
        tests
    }

    /// Id of `path`: relative to the root when inside it, as given otherwise
    ///
    /// Containment is decided on absolute, `.`/`..`-free forms first and on
    /// symlink-resolved forms second, so `./es5/a.js` and `/cwd/es5/a.js`
    /// get the same id under root `.`.
    pub fn test_id(&self, path: &Path) -> String {
        match self.relative_to_root(path) {
            Some(relative) => slash_join(&relative),
            None => slash_join(path),
        }
    }

    fn relative_to_root(&self, path: &Path) -> Option<PathBuf> {
        let lexical = (absolutize(&self.root), absolutize(path));
        let canonical = fs::canonicalize(&self.root)
            .ok()
            .zip(fs::canonicalize(path).ok());

        std::iter::once(lexical)
            .chain(canonical)
            .find_map(|(root, path)| {
                path.strip_prefix(&root)
                    .ok()
                    .filter(|rel| !rel.as_os_str().is_empty())
                    .map(Path::to_path_buf)
            })
    }
}

/// Absolute form of `path` with `.` and `..` resolved lexically
///
/// Relative paths are taken against the current directory; if that is
/// unavailable the path is only cleaned up.
pub fn absolutize(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normal = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normal.pop() {
                    normal.push(component);
                }
            }
            other => normal.push(other),
        }
    }
    normal
}

fn slash_join(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| match c {
            Component::RootDir => String::new(),
            other => other.as_os_str().to_string_lossy().into_owned(),
        })
        .collect();
    parts.join("/")
}
