//! File store abstraction: the unit of work and where it lives.
//!
//! A [`StoreItem`] names one file or directory inside a store root,
//! independent of any physical path. A [`FileStore`] is a local or
//! remote root holding items; variants are composed rather than
//! subclassed, with [`FileStore::try_as_extended`] as the capability tag
//! for stores that support direct file creation (needed for marker
//! files).
//!
//! | Variant | FS access | Extended |
//! |---------|-----------|----------|
//! | [`LocalStore`] | direct | yes |
//! | [`RemoteMountedStore`] | via mount point | yes |
//! | [`RemoteStore`] | none (rsync/ssh only) | no |

mod local;
mod remote;

pub use local::LocalStore;
pub use remote::{RemoteMountedStore, RemoteStore};

use crate::status::Status;
use std::fmt;
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Prefix of the marker recording "deletion of the source is in progress".
pub const DELETION_IN_PROGRESS_PREFIX: &str = ".MARKER_deletion_in_progress_";

/// Prefix of the marker recording "this item arrived completely".
pub const FINISHED_PREFIX: &str = ".MARKER_is_finished_";

/// A named file or directory within a [`FileStore`], used as the unit of
/// work.
///
/// The name is a single path component; it never contains separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreItem {
    name: String,
}

impl StoreItem {
    /// Create an item from a single path component.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        debug_assert!(
            !name.contains(['/', '\\']),
            "store item names must be single path components: {name}"
        );
        Self { name }
    }

    /// The item's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The marker item recording that deletion of this item has started.
    pub fn deletion_in_progress_marker(&self) -> StoreItem {
        StoreItem::new(format!("{DELETION_IN_PROGRESS_PREFIX}{}", self.name))
    }

    /// The marker item recording that this item finished copying.
    pub fn finished_marker(&self) -> StoreItem {
        StoreItem::new(format!("{FINISHED_PREFIX}{}", self.name))
    }

    /// Whether this item is itself a marker file.
    pub fn is_marker(&self) -> bool {
        self.name.starts_with(DELETION_IN_PROGRESS_PREFIX) || self.name.starts_with(FINISHED_PREFIX)
    }

    /// The item a marker refers to, or `None` if this is not a marker.
    pub fn marked_item(&self) -> Option<StoreItem> {
        self.name
            .strip_prefix(DELETION_IN_PROGRESS_PREFIX)
            .or_else(|| self.name.strip_prefix(FINISHED_PREFIX))
            .map(StoreItem::new)
    }
}

impl fmt::Display for StoreItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for StoreItem {
    fn from(name: &str) -> Self {
        StoreItem::new(name)
    }
}

/// A local or remote root holding [`StoreItem`]s.
///
/// Stores are read-mostly; the only mutations this subsystem performs
/// are [`delete`](FileStore::delete) and, on extended stores,
/// [`create_new_file`](ExtendedFileStore::create_new_file).
pub trait FileStore: Send + Sync {
    /// Whether the item currently exists in this store.
    fn exists(&self, item: &StoreItem) -> bool;

    /// The most recent modification time anywhere below the item.
    ///
    /// If `stop_when_younger_than` is given, implementations may return
    /// as soon as any path younger than it is seen; the activity monitor
    /// uses this to bound the latency of its quick check. Returns an
    /// error if the item is missing or the store has no direct
    /// filesystem access.
    fn last_changed(
        &self,
        item: &StoreItem,
        stop_when_younger_than: Option<SystemTime>,
    ) -> io::Result<SystemTime>;

    /// Delete the item (recursively for directories).
    fn delete(&self, item: &StoreItem) -> Status;

    /// Quick reachability probe of the store root itself.
    fn probe(&self) -> Status;

    /// Whether [`last_changed`](FileStore::last_changed) can be answered,
    /// i.e. whether an activity monitor can watch this store.
    fn supports_activity_monitoring(&self) -> bool {
        true
    }

    /// The capability tag: the same store as an [`ExtendedFileStore`],
    /// if it supports direct file creation.
    fn try_as_extended(&self) -> Option<&dyn ExtendedFileStore>;

    /// The remote host owning this store, if any.
    fn host(&self) -> Option<&str> {
        None
    }

    /// The rsync transfer module configured for this store, if any.
    fn rsync_module(&self) -> Option<&str> {
        None
    }

    /// The rsync daemon password file configured for this store, if any.
    fn password_file(&self) -> Option<&Path> {
        None
    }

    /// The store root as seen by the copy tool.
    fn path(&self) -> &Path;

    /// The physical path of an item, where the store has one.
    fn child_path(&self, item: &StoreItem) -> std::path::PathBuf {
        self.path().join(item.name())
    }

    /// Human-readable description for log messages.
    fn describe(&self) -> String;
}

/// A [`FileStore`] that additionally supports direct file creation.
///
/// Marker files can only live in extended stores.
pub trait ExtendedFileStore: FileStore {
    /// Create a zero-byte file with create-new semantics (fails if the
    /// item already exists).
    fn create_new_file(&self, item: &StoreItem) -> io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_names() {
        let item = StoreItem::new("batch-42");
        assert_eq!(
            item.deletion_in_progress_marker().name(),
            ".MARKER_deletion_in_progress_batch-42"
        );
        assert_eq!(item.finished_marker().name(), ".MARKER_is_finished_batch-42");
    }

    #[test]
    fn test_marker_detection_and_roundtrip() {
        let item = StoreItem::new("data");
        assert!(!item.is_marker());
        assert_eq!(item.marked_item(), None);

        let marker = item.finished_marker();
        assert!(marker.is_marker());
        assert_eq!(marker.marked_item(), Some(item.clone()));

        let marker = item.deletion_in_progress_marker();
        assert!(marker.is_marker());
        assert_eq!(marker.marked_item(), Some(item));
    }

    #[test]
    fn test_display_is_name() {
        assert_eq!(format!("{}", StoreItem::new("a.txt")), "a.txt");
    }
}
