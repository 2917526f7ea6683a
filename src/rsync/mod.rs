//! The rsync-backed [`PathCopier`] implementation.
//!
//! [`RsyncCopier`] builds rsync command lines for mutable (incremental,
//! resumable) copies and immutable hard-link copies, runs them through a
//! [`ProcessRunner`](crate::process::ProcessRunner), and translates the
//! outcome into a [`Status`] via the exit-code table.
//!
//! Mutable copies always pass `--archive --delete-before --inplace` and then
//! either `--append` (resume partial transfers) or `--whole-file`.
//! Whole-file mode is chosen when overwriting is forced, when the
//! destination filesystem requires pre-deletion, or when the local rsync
//! is too old to append reliably.

pub mod exit_codes;
pub mod version;

use crate::copier::{DestinationMode, PathCopier};
use crate::error::{Error, Result};
use crate::process::{ProcessHandle, ProcessResult, ProcessRunner, Terminable};
use crate::status::{Status, StatusKind};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use version::RsyncVersion;

/// Minimum rsync version this crate supports at all.
const MIN_VERSION: (u32, u32, u32) = (2, 6, 0);

/// First rsync version whose `--append` is trusted for resuming.
const APPEND_VERSION: (u32, u32, u32) = (2, 6, 7);

/// Encapsulates rsync invocations for archive copying.
///
/// # Example
///
/// ```no_run
/// use pathmover::{PathCopier, RsyncCopier};
/// use std::path::Path;
///
/// let copier = RsyncCopier::new("/usr/bin/rsync");
/// copier.check()?;
/// let status = copier.copy(Path::new("/data/run-17"), Path::new("/archive"));
/// assert!(status.is_ok());
/// # Ok::<(), pathmover::Error>(())
/// ```
pub struct RsyncCopier {
    executable: PathBuf,
    ssh_executable: Option<PathBuf>,
    version: Option<RsyncVersion>,
    overwrite: bool,
    destination_requires_deletion_before_creation: bool,
    additional_flags: Vec<String>,
    /// If set, replaces all standard flags for mutable copying.
    override_flags: Option<Vec<String>>,
    runner: ProcessRunner,
}

impl RsyncCopier {
    /// Create a copier around the given rsync executable.
    ///
    /// The executable's version is probed once here; call
    /// [`check`](PathCopier::check) to turn a failed probe into an
    /// error.
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        let executable = executable.into();
        let version = version::probe_version(&executable);
        Self {
            executable,
            ssh_executable: None,
            version,
            overwrite: false,
            destination_requires_deletion_before_creation: false,
            additional_flags: Vec::new(),
            override_flags: None,
            runner: ProcessRunner::new(),
        }
    }

    /// Use `ssh` for tunnelling remote copies without an rsync module.
    #[must_use]
    pub fn with_ssh_executable(mut self, ssh: impl Into<PathBuf>) -> Self {
        self.ssh_executable = Some(ssh.into());
        self
    }

    /// Always copy whole files instead of resuming partial transfers.
    #[must_use]
    pub fn with_overwrite(mut self) -> Self {
        self.overwrite = true;
        self
    }

    /// Mark the destination filesystem as requiring deletion of existing
    /// paths before they are re-created (forces whole-file mode).
    #[must_use]
    pub fn with_destination_requires_deletion_before_creation(mut self) -> Self {
        self.destination_requires_deletion_before_creation = true;
        self
    }

    /// Append extra command-line flags to every mutable copy.
    #[must_use]
    pub fn with_additional_flags(mut self, flags: impl IntoIterator<Item = String>) -> Self {
        self.additional_flags = flags.into_iter().collect();
        self
    }

    /// Replace the standard mutable-copy flags entirely.
    #[must_use]
    pub fn with_override_flags(mut self, flags: impl IntoIterator<Item = String>) -> Self {
        self.override_flags = Some(flags.into_iter().collect());
        self
    }

    /// The handle through which a running copy can be terminated.
    pub fn handle(&self) -> Arc<ProcessHandle> {
        self.runner.handle()
    }

    /// Probe an rsync daemon by listing the module root.
    pub fn check_rsync_connection(
        &self,
        host: &str,
        rsync_module: &str,
        password_file: Option<&Path>,
    ) -> bool {
        let mut command_line = vec![tool_path(&self.executable)];
        push_password_file(&mut command_line, Some(rsync_module), password_file);
        command_line.push(build_path_for_server(
            Some(host),
            Path::new("/"),
            Some(rsync_module),
            false,
        ));
        let result = self.runner.run(&command_line);
        result.is_ok()
    }

    fn rsync_supports_append(version: Option<&RsyncVersion>) -> bool {
        match version {
            Some(v) => v.is_newer_or_equal(APPEND_VERSION.0, APPEND_VERSION.1, APPEND_VERSION.2),
            // Unknown version: assume a modern rsync.
            None => true,
        }
    }

    fn is_overwrite_mode(&self) -> bool {
        self.overwrite
            || self.destination_requires_deletion_before_creation
            || !Self::rsync_supports_append(self.version.as_ref())
    }

    fn copy_impl(
        &self,
        source: &Path,
        source_host: Option<&str>,
        destination_dir: &Path,
        destination_host: Option<&str>,
        rsync_module: Option<&str>,
        password_file: Option<&Path>,
        copy_directory_content: bool,
    ) -> Status {
        // Only one side can be remote.
        debug_assert!(source_host.is_none() || destination_host.is_none());
        let command_line = self.build_mutable_command_line(
            source,
            source_host,
            destination_dir,
            destination_host,
            rsync_module,
            password_file,
            copy_directory_content,
        );
        status_from_result(&self.runner.run(&command_line))
    }

    #[allow(clippy::too_many_arguments)]
    fn build_mutable_command_line(
        &self,
        source: &Path,
        source_host: Option<&str>,
        destination_dir: &Path,
        destination_host: Option<&str>,
        rsync_module: Option<&str>,
        password_file: Option<&Path>,
        copy_directory_content: bool,
    ) -> Vec<String> {
        let mut command_line = vec![tool_path(&self.executable)];
        if let Some(flags) = &self.override_flags {
            command_line.extend(flags.iter().cloned());
        } else {
            command_line.extend(
                ["--archive", "--delete-before", "--inplace"]
                    .iter()
                    .map(ToString::to_string),
            );
            if self.is_overwrite_mode() {
                command_line.push("--whole-file".to_string());
            } else {
                command_line.push("--append".to_string());
            }
        }
        let any_host = source_host.or(destination_host);
        if let Some(ssh) = &self.ssh_executable {
            if any_host.is_some() && rsync_module.is_none() {
                command_line.push("--rsh".to_string());
                command_line.push(format!("{} -oBatchMode=yes", tool_path(ssh)));
            }
        }
        push_password_file(&mut command_line, rsync_module, password_file);
        command_line.extend(self.additional_flags.iter().cloned());
        command_line.push(build_path_for_server(
            source_host,
            source,
            rsync_module,
            copy_directory_content,
        ));
        command_line.push(build_path_for_server(
            destination_host,
            destination_dir,
            rsync_module,
            true,
        ));
        command_line
    }

    fn build_immutable_command_line(&self, source_dir: &Path, target: &Path) -> Vec<String> {
        vec![
            tool_path(&self.executable),
            "--archive".to_string(),
            format!("--link-dest={}", tool_path(source_dir)),
            format!("{}/", tool_path(source_dir)),
            tool_path(target),
        ]
    }
}

impl Terminable for RsyncCopier {
    /// Terminate the currently running copy process, if any.
    fn terminate(&self) -> bool {
        self.runner.handle().terminate()
    }
}

impl PathCopier for RsyncCopier {
    fn copy(&self, source: &Path, destination_dir: &Path) -> Status {
        self.copy_impl(source, None, destination_dir, None, None, None, false)
    }

    fn copy_content(&self, source: &Path, destination_dir: &Path) -> Status {
        self.copy_impl(source, None, destination_dir, None, None, None, true)
    }

    fn copy_from_remote(
        &self,
        source: &Path,
        source_host: &str,
        destination_dir: &Path,
        rsync_module: Option<&str>,
        password_file: Option<&Path>,
    ) -> Status {
        self.copy_impl(
            source,
            Some(source_host),
            destination_dir,
            None,
            rsync_module,
            password_file,
            false,
        )
    }

    fn copy_to_remote(
        &self,
        source: &Path,
        destination_dir: &Path,
        destination_host: &str,
        rsync_module: Option<&str>,
        password_file: Option<&Path>,
    ) -> Status {
        self.copy_impl(
            source,
            None,
            destination_dir,
            Some(destination_host),
            rsync_module,
            password_file,
            false,
        )
    }

    fn copy_directory_immutably(
        &self,
        source_dir: &Path,
        destination_dir: &Path,
        target_name: Option<&str>,
        mode: DestinationMode,
    ) -> Status {
        let target = match target_name {
            Some(name) => destination_dir.join(name),
            None => match source_dir.file_name() {
                Some(name) => destination_dir.join(name),
                None => {
                    return Status::fatal(format!(
                        "source directory has no name: '{}'",
                        source_dir.display()
                    ));
                }
            },
        };
        if target.exists() {
            match mode {
                DestinationMode::Error => {
                    return Status::fatal(format!(
                        "target already exists: '{}'",
                        target.display()
                    ));
                }
                DestinationMode::Overwrite => {
                    if let Err(e) = fs::remove_dir_all(&target) {
                        return Status::fatal(format!(
                            "cannot remove existing target '{}': {e}",
                            target.display()
                        ));
                    }
                }
            }
        }
        let command_line = self.build_immutable_command_line(source_dir, &target);
        status_from_result(&self.runner.run(&command_line))
    }

    fn check(&self) -> Result<()> {
        debug!(executable = %self.executable.display(), "testing rsync executable");
        let version = match &self.version {
            Some(version) => version,
            None => {
                if self.executable.exists() {
                    return Err(Error::RsyncInvalid {
                        path: self.executable.clone(),
                        reason: "version probe failed".to_string(),
                    });
                }
                return Err(Error::RsyncNotFound(self.executable.clone()));
            }
        };
        if !version.is_newer_or_equal(MIN_VERSION.0, MIN_VERSION.1, MIN_VERSION.2) {
            return Err(Error::RsyncTooOld {
                path: self.executable.clone(),
                required: format!("{}.{}.{}", MIN_VERSION.0, MIN_VERSION.1, MIN_VERSION.2),
                found: version.version_string().to_string(),
            });
        }
        info!(
            executable = %self.executable.display(),
            version = %version,
            mode = if self.is_overwrite_mode() { "overwrite" } else { "append" },
            "using rsync executable"
        );
        if version.is_pre_release() {
            warn!(
                executable = %self.executable.display(),
                version = %version,
                "rsync executable is a pre-release version; not recommended for production"
            );
        }
        Ok(())
    }
}

fn push_password_file(
    command_line: &mut Vec<String>,
    rsync_module: Option<&str>,
    password_file: Option<&Path>,
) {
    // A password file only makes sense for daemon-module transfers, and
    // rsync refuses to start if the file is missing.
    if rsync_module.is_some() {
        if let Some(file) = password_file {
            if file.exists() {
                command_line.push("--password-file".to_string());
                command_line.push(tool_path(file));
            }
        }
    }
}

/// Build a source or destination argument in rsync's address syntax.
///
/// Local paths come out as plain paths, remote ones as `host:path` or
/// `host::module`. The server side is expected to be a Unix machine, so
/// a Unix path is built regardless of the client platform. A trailing
/// slash makes rsync copy the directory's content rather than the
/// directory entry.
fn build_path_for_server(
    host: Option<&str>,
    resource: &Path,
    rsync_module: Option<&str>,
    trailing_slash: bool,
) -> String {
    match host {
        None => {
            let mut path = tool_path(resource);
            if trailing_slash {
                path.push('/');
            }
            path
        }
        Some(host) => {
            let (separator, mut path) = match rsync_module {
                Some(module) => ("::", module.to_string()),
                // Not the absolute local path: how to resolve it is the
                // remote host's business.
                None => (":", resource.to_string_lossy().into_owned()),
            };
            if trailing_slash {
                path.push('/');
            }
            format!("{host}{separator}{path}")
        }
    }
}

/// Render a path in the dialect the copy tool expects.
///
/// Rsync under Windows is from Cygwin, so drive-letter paths are
/// translated to `/cygdrive/...` form there.
fn tool_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    if cfg!(windows) {
        to_cygwin(&raw)
    } else {
        raw.into_owned()
    }
}

fn to_cygwin(path: &str) -> String {
    let forward = path.replace('\\', "/");
    let mut chars = forward.chars();
    match (chars.next(), chars.next()) {
        (Some(drive), Some(':')) => format!("/cygdrive/{drive}{}", chars.as_str()),
        _ => forward,
    }
}

/// Map a finished process into the status taxonomy.
///
/// Process-layer conditions (killed, interrupted, timed out) are
/// retriable by definition; everything else goes through the exit-code
/// table.
fn status_from_result(result: &ProcessResult) -> Status {
    if let Some(failure) = &result.startup_failure {
        return Status::fatal(format!("copy process could not be started: {failure}"));
    }
    if result.terminated {
        return Status::retriable("process was terminated");
    }
    if result.interrupted {
        return Status::retriable("process was interrupted");
    }
    if result.timed_out {
        return Status::retriable("process has stopped because of timeout");
    }
    match result.exit_code {
        Some(code) => match exit_codes::classify(code) {
            StatusKind::Ok => Status::OK,
            StatusKind::RetriableError => Status::retriable(exit_codes::message(code)),
            StatusKind::FatalError => Status::fatal(exit_codes::message(code)),
        },
        None => Status::retriable("process was killed by a signal"),
    }
}
