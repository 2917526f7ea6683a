//! External process supervision.
//!
//! [`ProcessRunner`] launches the copy tool as a subprocess, blocks until
//! it exits, and reports a [`ProcessResult`]. A shared [`ProcessHandle`]
//! allows another thread (the activity monitor, a ctrl-c handler) to
//! terminate the running process at any time; launch and terminate are
//! synchronized on the same mutex so a terminate in flight can never
//! race a fresh launch into an inconsistent handle.

use std::io;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// How often the waiting thread polls the child for exit.
const WAIT_POLL: Duration = Duration::from_millis(50);

/// Something that can be cooperatively stopped from another thread.
pub trait Terminable: Send + Sync {
    /// Stop the underlying activity. Returns `true` if there was
    /// something to stop.
    fn terminate(&self) -> bool;
}

/// Result of running an external process to completion.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    /// The exit code, if the process ran and exited normally.
    pub exit_code: Option<i32>,
    /// The process was explicitly killed via [`ProcessHandle::terminate`].
    pub terminated: bool,
    /// Waiting for the process gave up after a timeout.
    pub timed_out: bool,
    /// Waiting was interrupted.
    pub interrupted: bool,
    /// The process could not be started (message from the spawn failure).
    pub startup_failure: Option<String>,
    /// The command line, joined for log messages.
    pub command: String,
}

impl ProcessResult {
    /// Whether the process ran to completion with exit code 0.
    pub fn is_ok(&self) -> bool {
        !self.terminated
            && !self.timed_out
            && !self.interrupted
            && self.startup_failure.is_none()
            && self.exit_code == Some(0)
    }

    /// Log the outcome at an appropriate level.
    pub fn log(&self) {
        if self.is_ok() {
            debug!(command = %self.command, "process finished successfully");
        } else if let Some(failure) = &self.startup_failure {
            warn!(command = %self.command, %failure, "process could not be started");
        } else {
            warn!(
                command = %self.command,
                exit_code = ?self.exit_code,
                terminated = self.terminated,
                timed_out = self.timed_out,
                interrupted = self.interrupted,
                "process failed"
            );
        }
    }
}

/// Shared handle to at most one tracked subprocess.
///
/// The handle outlives individual runs: each [`ProcessRunner::run`]
/// installs its child here, and [`terminate`](ProcessHandle::terminate)
/// kills whichever child is current. If no process was ever launched,
/// `terminate` is a no-op returning `false`.
#[derive(Debug, Default)]
pub struct ProcessHandle {
    child: Mutex<Option<Child>>,
    terminated: AtomicBool,
}

impl ProcessHandle {
    /// Create an empty handle.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_child(&self) -> MutexGuard<'_, Option<Child>> {
        // A poisoned lock only means another thread panicked mid-update;
        // the Option inside is still usable.
        match self.child.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Whether [`terminate`](ProcessHandle::terminate) killed the current run.
    pub fn was_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    pub(crate) fn clear_terminated(&self) {
        self.terminated.store(false, Ordering::SeqCst);
    }
}

impl Terminable for ProcessHandle {
    /// Kill the tracked process, if any. Idempotent and safe to call
    /// from any thread.
    fn terminate(&self) -> bool {
        let mut guard = self.lock_child();
        match guard.as_mut() {
            Some(child) => {
                self.terminated.store(true, Ordering::SeqCst);
                match child.kill() {
                    Ok(()) => debug!(pid = child.id(), "terminated process"),
                    // Already exited between our check and the kill.
                    Err(e) => trace!(pid = child.id(), error = %e, "kill was a no-op"),
                }
                true
            }
            None => false,
        }
    }
}

/// Runs one external command at a time against a shared [`ProcessHandle`].
#[derive(Debug, Default)]
pub struct ProcessRunner {
    handle: Arc<ProcessHandle>,
}

impl ProcessRunner {
    /// Create a runner with a fresh handle.
    pub fn new() -> Self {
        Self {
            handle: Arc::new(ProcessHandle::new()),
        }
    }

    /// The handle through which the current run can be terminated.
    pub fn handle(&self) -> Arc<ProcessHandle> {
        Arc::clone(&self.handle)
    }

    /// Launch `command_line` and block until it exits or is terminated.
    ///
    /// The first element is the executable, the rest are its arguments.
    /// Stdout and stderr are discarded; the copy tool's own diagnostics
    /// are summarized by its exit code.
    ///
    /// A runner tracks one subprocess at a time. Callers must not invoke
    /// `run` concurrently on the same runner: a second run would install
    /// its child over the first one's in the shared handle.
    pub fn run(&self, command_line: &[String]) -> ProcessResult {
        let command = command_line.join(" ");
        debug!(%command, "running command");

        let (executable, args) = match command_line.split_first() {
            Some(split) => split,
            None => {
                return ProcessResult {
                    exit_code: None,
                    terminated: false,
                    timed_out: false,
                    interrupted: false,
                    startup_failure: Some("empty command line".to_string()),
                    command,
                };
            }
        };

        // Spawn while holding the child lock so a concurrent terminate
        // sees either no child or the fully installed new one.
        {
            let mut guard = self.handle.lock_child();
            self.handle.clear_terminated();
            match Command::new(executable)
                .args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
            {
                Ok(child) => {
                    trace!(pid = child.id(), "process started");
                    *guard = Some(child);
                }
                Err(e) => {
                    return ProcessResult {
                        exit_code: None,
                        terminated: false,
                        timed_out: false,
                        interrupted: false,
                        startup_failure: Some(e.to_string()),
                        command,
                    };
                }
            }
        }

        let (exit_code, interrupted) = self.wait_for_exit();
        let result = ProcessResult {
            exit_code,
            terminated: self.handle.was_terminated(),
            timed_out: false,
            interrupted,
            startup_failure: None,
            command,
        };
        result.log();
        result
    }

    /// Poll the child until it exits. Polling (instead of a blocking
    /// `wait`) keeps the child lock free so `terminate` can get in.
    fn wait_for_exit(&self) -> (Option<i32>, bool) {
        loop {
            {
                let mut guard = self.handle.lock_child();
                let Some(child) = guard.as_mut() else {
                    return (None, false);
                };
                match child.try_wait() {
                    Ok(Some(status)) => {
                        *guard = None;
                        return (status.code(), false);
                    }
                    Ok(None) => {}
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                        reap(child);
                        *guard = None;
                        return (None, true);
                    }
                    Err(e) => {
                        warn!(error = %e, "waiting for process failed");
                        reap(child);
                        *guard = None;
                        return (None, false);
                    }
                }
            }
            std::thread::sleep(WAIT_POLL);
        }
    }
}

/// Kill and wait on a child before it is dropped from the handle, so a
/// child we stop tracking is never left as a zombie.
fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
