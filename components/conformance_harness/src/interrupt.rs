//! Cancellation and operator interrupts
//!
//! Every engine runs in its own process group. A [`CancelToken`] tracks the
//! live groups so that cancelling it kills all outstanding engines at once,
//! and runners poll it to stop picking up new work.

use crate::error::{HarnessError, HarnessResult};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::warn;

const WATCH_INTERVAL: Duration = Duration::from_millis(50);

/// Last signal delivered to the process, 0 if none
static PENDING_SIGNAL: AtomicI32 = AtomicI32::new(0);

#[derive(Debug, Default)]
struct CancelState {
    signal: AtomicI32,
    groups: Mutex<HashSet<u32>>,
}

/// Shared cancellation flag, cloned into every worker
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    state: Arc<CancelState>,
}

impl CancelToken {
    /// Create an uncancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel on behalf of `signal` and kill every tracked process group
    pub fn cancel(&self, signal: i32) {
        self.state.signal.store(signal, Ordering::SeqCst);
        let groups = self.state.groups.lock();
        for &group in groups.iter() {
            kill_process_group(group);
        }
    }

    /// Check if the token was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.signal().is_some()
    }

    /// Signal the token was cancelled with
    pub fn signal(&self) -> Option<i32> {
        match self.state.signal.load(Ordering::SeqCst) {
            0 => None,
            signal => Some(signal),
        }
    }

    /// Fail with [`HarnessError::Interrupted`] once cancelled
    pub fn check(&self) -> HarnessResult<()> {
        match self.signal() {
            Some(signal) => Err(HarnessError::Interrupted { signal }),
            None => Ok(()),
        }
    }

    /// Track a live engine process group
    pub(crate) fn track(&self, group: u32) {
        self.state.groups.lock().insert(group);
    }

    /// Stop tracking a reaped engine process group
    pub(crate) fn untrack(&self, group: u32) {
        self.state.groups.lock().remove(&group);
    }
}

/// SIGKILL a whole process group; already-gone groups are ignored
pub(crate) fn kill_process_group(group: u32) {
    let Ok(pgid) = libc::pid_t::try_from(group) else {
        return;
    };
    // SAFETY: killpg has no memory-safety preconditions.
    unsafe {
        libc::killpg(pgid, libc::SIGKILL);
    }
}

extern "C" fn record_signal(signal: libc::c_int) {
    PENDING_SIGNAL.store(signal, Ordering::SeqCst);
}

/// Route SIGINT and SIGTERM into `token`
///
/// The handler only records the signal; a watcher thread performs the
/// cancellation outside signal context.
pub fn install_handlers(token: &CancelToken) -> HarnessResult<()> {
    for signal in [libc::SIGINT, libc::SIGTERM] {
        // SAFETY: the action is fully initialized and the handler only
        // touches an atomic, which is async-signal-safe.
        let ret = unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            action.sa_sigaction = record_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
            libc::sigemptyset(&mut action.sa_mask);
            libc::sigaction(signal, &action, std::ptr::null_mut())
        };
        if ret != 0 {
            return Err(HarnessError::io(
                "sigaction",
                std::io::Error::last_os_error(),
            ));
        }
    }

    let token = token.clone();
    thread::Builder::new()
        .name("interrupt-watcher".to_string())
        .spawn(move || loop {
            let signal = PENDING_SIGNAL.swap(0, Ordering::SeqCst);
            if signal != 0 {
                warn!(signal, "interrupted, stopping all engines");
                token.cancel(signal);
                return;
            }
            thread::sleep(WATCH_INTERVAL);
        })
        .map_err(|e| HarnessError::io("interrupt-watcher", e))?;

    Ok(())
}
