//! Remote store variants.
//!
//! [`RemoteMountedStore`] is a remote root visible through a local mount
//! point: both filesystem operations and copies go through the mount,
//! the host name is kept for diagnostics. [`RemoteStore`] is only
//! reachable over the network; it answers no filesystem queries and is
//! never extended, so markers destined for it have to be staged locally
//! and shipped by the copier.

use super::local::{delete_below, last_changed_below};
use super::{ExtendedFileStore, FileStore, StoreItem};
use crate::status::Status;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A store on a remote host that is mounted into the local filesystem.
#[derive(Debug, Clone)]
pub struct RemoteMountedStore {
    host: String,
    mount_root: PathBuf,
}

impl RemoteMountedStore {
    /// Create a store for `host` whose content is visible at `mount_root`.
    pub fn new(host: impl Into<String>, mount_root: impl Into<PathBuf>) -> Self {
        Self {
            host: host.into(),
            mount_root: mount_root.into(),
        }
    }
}

impl FileStore for RemoteMountedStore {
    fn exists(&self, item: &StoreItem) -> bool {
        fs::symlink_metadata(self.child_path(item)).is_ok()
    }

    fn last_changed(
        &self,
        item: &StoreItem,
        stop_when_younger_than: Option<SystemTime>,
    ) -> io::Result<SystemTime> {
        last_changed_below(&self.child_path(item), stop_when_younger_than)
    }

    fn delete(&self, item: &StoreItem) -> Status {
        delete_below(&self.child_path(item))
    }

    fn probe(&self) -> Status {
        if self.mount_root.is_dir() {
            Status::OK
        } else {
            Status::retriable(format!(
                "mount of '{}' is not accessible: '{}'",
                self.host,
                self.mount_root.display()
            ))
        }
    }

    fn try_as_extended(&self) -> Option<&dyn ExtendedFileStore> {
        Some(self)
    }

    fn path(&self) -> &Path {
        &self.mount_root
    }

    fn describe(&self) -> String {
        format!("remote-mounted '{}' at '{}'", self.host, self.mount_root.display())
    }
}

impl ExtendedFileStore for RemoteMountedStore {
    fn create_new_file(&self, item: &StoreItem) -> io::Result<()> {
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.child_path(item))
            .map(|_| ())
    }
}

/// A store on a remote host reachable only through the copy tool.
///
/// No filesystem queries are possible; `exists` conservatively reports
/// `false`, deletes fail fatally, and activity monitoring is
/// unsupported. The mover compensates by keeping its markers on the
/// local side.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    host: String,
    root: PathBuf,
    rsync_module: Option<String>,
    password_file: Option<PathBuf>,
}

impl RemoteStore {
    /// Create a store for `root` on `host`.
    pub fn new(host: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            host: host.into(),
            root: root.into(),
            rsync_module: None,
            password_file: None,
        }
    }

    /// Address the store through an rsync daemon module instead of ssh.
    #[must_use]
    pub fn with_rsync_module(mut self, module: impl Into<String>) -> Self {
        self.rsync_module = Some(module.into());
        self
    }

    /// Use a password file when talking to the rsync daemon.
    #[must_use]
    pub fn with_password_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.password_file = Some(path.into());
        self
    }
}

impl FileStore for RemoteStore {
    fn exists(&self, _item: &StoreItem) -> bool {
        false
    }

    fn last_changed(
        &self,
        item: &StoreItem,
        _stop_when_younger_than: Option<SystemTime>,
    ) -> io::Result<SystemTime> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!(
                "no filesystem access to '{}' on host '{}'",
                item, self.host
            ),
        ))
    }

    fn delete(&self, item: &StoreItem) -> Status {
        Status::fatal(format!(
            "cannot delete '{item}' on remote host '{}' without filesystem access",
            self.host
        ))
    }

    fn probe(&self) -> Status {
        // Reachability of a network-only store is established by the
        // copy tool itself; nothing cheap to check here.
        Status::OK
    }

    fn supports_activity_monitoring(&self) -> bool {
        false
    }

    fn try_as_extended(&self) -> Option<&dyn ExtendedFileStore> {
        None
    }

    fn host(&self) -> Option<&str> {
        Some(&self.host)
    }

    fn rsync_module(&self) -> Option<&str> {
        self.rsync_module.as_deref()
    }

    fn password_file(&self) -> Option<&Path> {
        self.password_file.as_deref()
    }

    fn path(&self) -> &Path {
        &self.root
    }

    fn describe(&self) -> String {
        match &self.rsync_module {
            Some(module) => format!("remote '{}::{}'", self.host, module),
            None => format!("remote '{}:{}'", self.host, self.root.display()),
        }
    }
}
