//! Process runner: one engine invocation against one test file
//!
//! stdout and stderr share a single pipe so the captured output keeps the
//! engine's own interleaving. The engine runs in a fresh process group,
//! which lets a timeout or interrupt take down anything it spawned.

use crate::adapter::EngineProfile;
use crate::corpus::TestCase;
use crate::error::{HarnessError, HarnessResult};
use crate::interrupt::{kill_process_group, CancelToken};
use std::borrow::Cow;
use std::env;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::os::fd::{FromRawFd, OwnedFd, RawFd};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default per-test wall-clock ceiling
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const READ_CHUNK: usize = 8192;

/// Everything observed while running one test
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Id of the test that ran
    pub test_id: String,
    /// Base file name of the test
    pub test_name: String,
    /// Test path as handed to the engine
    pub test_path: PathBuf,
    /// Absolute test path
    pub absolute_path: PathBuf,
    /// Per-invocation scratch files standing in for the test file
    pub scratch_paths: Vec<PathBuf>,
    /// Merged stdout and stderr
    pub combined_output: Vec<u8>,
    /// Whether the engine exited on its own (false after a forced kill)
    pub exit_recorded: bool,
    /// Exit code, if the engine exited normally
    pub exit_code: Option<i32>,
    /// Terminating signal, if the engine died from one
    pub signal: Option<i32>,
    /// Whether the timeout ceiling was hit
    pub timed_out: bool,
    /// Wall time from spawn to reap
    pub elapsed: Duration,
}

impl ExecutionResult {
    /// Captured output as text, invalid UTF-8 replaced
    pub fn output_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.combined_output)
    }
}

/// How a wait on the engine ended
enum WaitOutcome {
    Exited(ExitStatus),
    TimedOut,
    Interrupted(i32),
}

/// Runs tests against one engine command
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    engine: Vec<String>,
    profile: EngineProfile,
    timeout: Duration,
    echo: bool,
    cancel: CancelToken,
}

impl ProcessRunner {
    /// Create a runner for `engine` (binary first, then its own arguments)
    pub fn new(engine: Vec<String>, profile: EngineProfile, cancel: CancelToken) -> Self {
        Self {
            engine,
            profile,
            timeout: DEFAULT_TIMEOUT,
            echo: true,
            cancel,
        }
    }

    /// Set the per-test timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Stream engine output to stdout while capturing it
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Per-test timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Engine quirk profile
    pub fn profile(&self) -> &EngineProfile {
        &self.profile
    }

    /// Token this runner obeys
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Run `test` once
    ///
    /// Engine misbehavior never fails this call. Errors are reserved for an
    /// engine that cannot be launched, scratch I/O, and interruption.
    pub fn run(&self, test: &TestCase) -> HarnessResult<ExecutionResult> {
        self.cancel.check()?;

        let scratch = tempfile::Builder::new()
            .prefix("conformance-")
            .tempdir()
            .map_err(|e| HarnessError::io(env::temp_dir(), e))?;
        let invocation = self.profile.prepare(&self.engine, test.path(), scratch.path())?;

        let (reader, writer) = output_pipe()?;
        let stderr_writer = writer
            .try_clone()
            .map_err(|e| HarnessError::io("pipe", e))?;

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(writer))
            .stderr(Stdio::from(stderr_writer))
            .process_group(0);

        debug!(test = test.id(), program = %invocation.program, args = ?invocation.args, "launching engine");
        let started = Instant::now();
        let mut child = command.spawn().map_err(|source| HarnessError::EngineLaunch {
            command: invocation.program.clone(),
            source,
        })?;
        // The parent's copies of the write ends live in `command`; close them
        // so the reader sees EOF once the engine side is done.
        drop(command);

        let group = child.id();
        self.cancel.track(group);

        let echo = self.echo;
        let collector = thread::spawn(move || collect_output(reader, echo));
        let outcome = self.wait(&mut child, group, started);
        // Descendants may still hold the pipe open after the engine exits.
        kill_process_group(group);
        self.cancel.untrack(group);
        let elapsed = started.elapsed();
        let combined_output = collector.join().unwrap_or_default();

        let (exit_recorded, exit_code, signal, timed_out) = match outcome? {
            WaitOutcome::Exited(status) => (true, status.code(), status.signal(), false),
            WaitOutcome::TimedOut => (false, None, None, true),
            WaitOutcome::Interrupted(signal) => {
                return Err(HarnessError::Interrupted { signal });
            }
        };

        debug!(
            test = test.id(),
            elapsed_ms = elapsed.as_millis() as u64,
            exit_code,
            signal,
            timed_out,
            "engine finished"
        );

        Ok(ExecutionResult {
            test_id: test.id().to_string(),
            test_name: test.file_name().to_string(),
            test_path: test.path().to_path_buf(),
            absolute_path: test.absolute_path(),
            scratch_paths: invocation.scratch_paths,
            combined_output,
            exit_recorded,
            exit_code,
            signal,
            timed_out,
            elapsed,
        })
    }

    fn wait(&self, child: &mut Child, group: u32, started: Instant) -> HarnessResult<WaitOutcome> {
        loop {
            if let Some(status) = child
                .try_wait()
                .map_err(|e| HarnessError::io(&self.engine[0], e))?
            {
                // A cancelled token kills the group itself; that death is not
                // the engine's doing.
                return Ok(match self.cancel.signal() {
                    Some(signal) => WaitOutcome::Interrupted(signal),
                    None => WaitOutcome::Exited(status),
                });
            }

            if let Some(signal) = self.cancel.signal() {
                kill_and_reap(child, group);
                return Ok(WaitOutcome::Interrupted(signal));
            }

            let remaining = self.timeout.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                kill_and_reap(child, group);
                return Ok(WaitOutcome::TimedOut);
            }
            thread::sleep(remaining.min(POLL_INTERVAL));
        }
    }
}

fn kill_and_reap(child: &mut Child, group: u32) {
    kill_process_group(group);
    let _ = child.wait();
}

/// Drain the merged output pipe until every writer is gone
fn collect_output(mut reader: File, echo: bool) -> Vec<u8> {
    let mut captured = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                if echo {
                    let mut stdout = io::stdout().lock();
                    let _ = stdout.write_all(&chunk[..n]);
                    let _ = stdout.flush();
                }
                captured.extend_from_slice(&chunk[..n]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    captured
}

/// Create a close-on-exec pipe, returning (read end, write end)
fn output_pipe() -> HarnessResult<(File, OwnedFd)> {
    let mut fds = [0 as RawFd; 2];
    // SAFETY: `fds` has room for the two descriptors pipe writes.
    let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if ret != 0 {
        return Err(HarnessError::io("pipe", io::Error::last_os_error()));
    }
    for &fd in &fds {
        // SAFETY: both descriptors were just returned by pipe.
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFD);
            libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }
    }
    // SAFETY: the descriptors are open and owned by nobody else.
    let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
    Ok((File::from(read), write))
}

/// Locate the engine binary before any test runs
///
/// A command containing `/` must name an executable file; a bare name is
/// looked up on `PATH`.
pub fn resolve_engine(command: &str) -> HarnessResult<PathBuf> {
    let not_found = || HarnessError::EngineNotFound {
        command: command.to_string(),
    };

    if command.contains('/') {
        let path = Path::new(command);
        return if is_executable(path) {
            Ok(path.to_path_buf())
        } else {
            Err(not_found())
        };
    }

    let search = env::var_os("PATH").ok_or_else(not_found)?;
    env::split_paths(&search)
        .map(|dir| dir.join(command))
        .find(|candidate| is_executable(candidate))
        .ok_or_else(not_found)
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
