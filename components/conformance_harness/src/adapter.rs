//! Engine adapter registry
//!
//! Most engines take a script path and print through `console.log`. The ones
//! that don't are listed in [`REGISTRY`] with the adjustment they need.

use crate::error::{HarnessError, HarnessResult};
use regex::{NoExpand, Regex};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Engine families whose names contain `_` but are not variant-tagged
pub const MULTI_SEGMENT_FAMILIES: &[&str] = &["quickjs_ng", "tiny_js", "jerry_script"];

/// File name of the materialized console shim
pub const SHIM_FILE_NAME: &str = "console-shim.js";

/// `console` implementation layered over a bare `print` primitive
pub const CONSOLE_SHIM: &str = r#"(function (global) {
  if (typeof global.console === 'object' && typeof global.console.log === 'function') {
    return;
  }
  var write = typeof print === 'function' ? print : function () {};
  var emit = function () {
    var parts = [];
    for (var i = 0; i < arguments.length; i++) {
      parts.push(String(arguments[i]));
    }
    write(parts.join(' '));
  };
  global.console = { log: emit, error: emit, info: emit, warn: emit };
})(this);
"#;

/// How an engine invocation is adjusted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputAdapter {
    /// Engine is invoked as-is
    NoOp,
    /// A fixed flag goes right before the test file argument
    PrependFlag(&'static str),
    /// The console shim is passed as an extra script before the test file
    InjectShimScript,
    /// Console calls in the test source are redirected to `print_fn`
    RewriteSource {
        /// Native print primitive of the engine
        print_fn: &'static str,
    },
}

/// Known engines that need an adapter, keyed by normalized name
pub const REGISTRY: &[(&str, OutputAdapter)] = &[
    ("qjs", OutputAdapter::PrependFlag("--std")),
    ("xst", OutputAdapter::PrependFlag("-s")),
    ("jjs", OutputAdapter::PrependFlag("--language=es6")),
    ("duk", OutputAdapter::InjectShimScript),
    ("mujs", OutputAdapter::InjectShimScript),
    ("jerry", OutputAdapter::InjectShimScript),
    ("rhino", OutputAdapter::InjectShimScript),
    ("mjs", OutputAdapter::RewriteSource { print_fn: "print" }),
    ("espruino", OutputAdapter::RewriteSource { print_fn: "print" }),
    ("tiny_js", OutputAdapter::RewriteSource { print_fn: "print" }),
    ("cscript", OutputAdapter::RewriteSource { print_fn: "WScript.Echo" }),
];

/// Reduce a command token to its engine name
///
/// Takes the base name, drops a `.exe` extension, then strips a variant tag
/// after the first `_` unless the name belongs to a multi-segment family.
pub fn normalize_engine_name(command: &str) -> String {
    let base = Path::new(command)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| command.to_string());
    let base = base.strip_suffix(".exe").unwrap_or(&base);

    for family in MULTI_SEGMENT_FAMILIES {
        if base == *family || base.starts_with(&format!("{family}_")) {
            return family.to_string();
        }
    }

    match base.split_once('_') {
        Some((engine, _variant)) => engine.to_string(),
        None => base.to_string(),
    }
}

/// Fully shaped command line for one test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to execute
    pub program: String,
    /// Arguments, test file last
    pub args: Vec<String>,
    /// Scratch files standing in for the test file
    pub scratch_paths: Vec<PathBuf>,
}

/// Quirk profile of the engine under test, fixed for the whole run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineProfile {
    identifier: String,
    adapter: OutputAdapter,
}

impl EngineProfile {
    /// Create a profile with an explicit adapter
    pub fn new(identifier: impl Into<String>, adapter: OutputAdapter) -> Self {
        Self {
            identifier: identifier.into(),
            adapter,
        }
    }

    /// Look up the profile for an engine's leading command token
    ///
    /// Unknown engines get [`OutputAdapter::NoOp`].
    pub fn for_command(command: &str) -> Self {
        let identifier = normalize_engine_name(command);
        let adapter = REGISTRY
            .iter()
            .find(|(name, _)| *name == identifier)
            .map(|(_, adapter)| *adapter)
            .unwrap_or(OutputAdapter::NoOp);
        Self::new(identifier, adapter)
    }

    /// Normalized engine name
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Adapter applied to every invocation
    pub fn adapter(&self) -> OutputAdapter {
        self.adapter
    }

    /// Shape the command line for `test`
    ///
    /// Any auxiliary file goes into `scratch`, which must be private to
    /// this invocation.
    pub fn prepare(
        &self,
        engine: &[String],
        test: &Path,
        scratch: &Path,
    ) -> HarnessResult<Invocation> {
        let (program, leading) = engine.split_first().ok_or(HarnessError::NoEngineCommand)?;
        let mut args = leading.to_vec();
        let mut scratch_paths = Vec::new();
        let test_arg = test.to_string_lossy().into_owned();

        match self.adapter {
            OutputAdapter::NoOp => args.push(test_arg),
            OutputAdapter::PrependFlag(flag) => {
                args.push(flag.to_string());
                args.push(test_arg);
            }
            OutputAdapter::InjectShimScript => {
                let shim = scratch.join(SHIM_FILE_NAME);
                fs::write(&shim, CONSOLE_SHIM).map_err(|e| HarnessError::io(&shim, e))?;
                args.push(shim.to_string_lossy().into_owned());
                args.push(test_arg);
            }
            OutputAdapter::RewriteSource { print_fn } => {
                let source = fs::read_to_string(test).map_err(|e| HarnessError::io(test, e))?;
                let file_name = test
                    .file_name()
                    .ok_or_else(|| {
                        HarnessError::io(test, std::io::Error::other("test path has no file name"))
                    })?;
                let rewritten = scratch.join(file_name);
                fs::write(&rewritten, rewrite_console_calls(&source, print_fn))
                    .map_err(|e| HarnessError::io(&rewritten, e))?;
                args.push(rewritten.to_string_lossy().into_owned());
                scratch_paths.push(rewritten);
            }
        }

        Ok(Invocation {
            program: program.clone(),
            args,
            scratch_paths,
        })
    }
}

/// Redirect `console.log(...)`-style calls to `print_fn(...)`
pub fn rewrite_console_calls(source: &str, print_fn: &str) -> String {
    static CONSOLE_CALL: OnceLock<Regex> = OnceLock::new();
    let re = CONSOLE_CALL.get_or_init(|| {
        Regex::new(r"\bconsole\s*\.\s*(?:log|error|info|warn)\s*\(").unwrap()
    });
    let replacement = format!("{print_fn}(");
    re.replace_all(source, NoExpand(&replacement)).into_owned()
}
