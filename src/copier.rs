//! The copier seam used by the mover.
//!
//! [`PathCopier`] is the interface the mover drives; [`RsyncCopier`]
//! (the production implementation) wraps the external rsync tool, and
//! tests substitute scripted fakes. Expected failures come back as
//! [`Status`] values; [`check`](PathCopier::check) alone raises
//! configuration errors.

use crate::error::Result;
use crate::process::Terminable;
use crate::status::Status;
use std::path::Path;

/// How an immutable copy treats a pre-existing target directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DestinationMode {
    /// Fail with a fatal status if the target already exists.
    #[default]
    Error,
    /// Delete the pre-existing target, then copy.
    Overwrite,
}

/// A recursive copier for local and remote directory trees.
///
/// At most one copy subprocess is tracked per copier instance at a
/// time; [`Terminable::terminate`] kills it from any thread.
pub trait PathCopier: Terminable {
    /// Copy `source` (file or directory entry) into `destination_dir`,
    /// both local.
    fn copy(&self, source: &Path, destination_dir: &Path) -> Status;

    /// Copy the *content* of the `source` directory into
    /// `destination_dir` instead of the directory entry itself.
    fn copy_content(&self, source: &Path, destination_dir: &Path) -> Status;

    /// Copy `source` on `source_host` into the local `destination_dir`.
    fn copy_from_remote(
        &self,
        source: &Path,
        source_host: &str,
        destination_dir: &Path,
        rsync_module: Option<&str>,
        password_file: Option<&Path>,
    ) -> Status;

    /// Copy the local `source` into `destination_dir` on
    /// `destination_host`.
    fn copy_to_remote(
        &self,
        source: &Path,
        destination_dir: &Path,
        destination_host: &str,
        rsync_module: Option<&str>,
        password_file: Option<&Path>,
    ) -> Status;

    /// Hard-link copy of `source_dir` below `destination_dir`: same file
    /// content, new directory entries, no data duplicated on disk.
    ///
    /// The target is named `target_name`, or like the source when
    /// `None`.
    fn copy_directory_immutably(
        &self,
        source_dir: &Path,
        destination_dir: &Path,
        target_name: Option<&str>,
        mode: DestinationMode,
    ) -> Status;

    /// Validate the external tool is present and recent enough.
    ///
    /// Called once at startup; failures are configuration errors, not
    /// retriable statuses.
    fn check(&self) -> Result<()>;
}
