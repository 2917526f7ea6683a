//! The local filesystem store variant.

use super::{ExtendedFileStore, FileStore, StoreItem};
use crate::status::Status;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A store rooted at a directory on the local filesystem.
///
/// This is the extended variant: it supports every [`FileStore`]
/// operation including direct file creation, so marker files can be
/// placed here.
///
/// # Example
///
/// ```no_run
/// use pathmover::{FileStore, LocalStore, StoreItem};
///
/// let store = LocalStore::new("/data/incoming");
/// let item = StoreItem::new("run-17");
/// if store.exists(&item) {
///     println!("found {item}");
/// }
/// ```
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FileStore for LocalStore {
    fn exists(&self, item: &StoreItem) -> bool {
        // symlink_metadata so a dangling symlink still counts as present
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
        if self.root.is_dir() {
            Status::OK
        } else {
            Status::retriable(format!(
                "store directory is not accessible: '{}'",
                self.root.display()
            ))
        }
    }

    fn try_as_extended(&self) -> Option<&dyn ExtendedFileStore> {
        Some(self)
    }

    fn path(&self) -> &Path {
        &self.root
    }

    fn describe(&self) -> String {
        format!("local '{}'", self.root.display())
    }
}

impl ExtendedFileStore for LocalStore {
    fn create_new_file(&self, item: &StoreItem) -> io::Result<()> {
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.child_path(item))
            .map(|_| ())
    }
}

/// Recursive max-mtime below `path`.
///
/// With `stop_when_younger_than` set, returns early once any entry
/// younger than the threshold is seen; the caller only needs to know
/// that *something* recent changed, not the exact maximum.
pub(crate) fn last_changed_below(
    path: &Path,
    stop_when_younger_than: Option<SystemTime>,
) -> io::Result<SystemTime> {
    let meta = fs::symlink_metadata(path)?;
    let mut newest = meta.modified()?;
    if early_exit(newest, stop_when_younger_than) {
        return Ok(newest);
    }
    if meta.is_dir() {
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let child = last_changed_below(&entry.path(), stop_when_younger_than)?;
            if child > newest {
                newest = child;
            }
            if early_exit(newest, stop_when_younger_than) {
                return Ok(newest);
            }
        }
    }
    Ok(newest)
}

fn early_exit(observed: SystemTime, stop_when_younger_than: Option<SystemTime>) -> bool {
    matches!(stop_when_younger_than, Some(threshold) if observed > threshold)
}

pub(crate) fn delete_below(path: &Path) -> Status {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Status::fatal(format!("path does not exist: '{}'", path.display()));
        }
        Err(e) => {
            return Status::retriable(format!("cannot stat '{}': {e}", path.display()));
        }
    };
    let result = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => Status::OK,
        Err(e) => Status::retriable(format!("cannot delete '{}': {e}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{FileTime, set_file_mtime};
    use tempfile::tempdir;

    #[test]
    fn test_exists_and_delete_file() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let item = StoreItem::new("file.txt");

        assert!(!store.exists(&item));
        fs::write(dir.path().join("file.txt"), "content").unwrap();
        assert!(store.exists(&item));

        assert!(store.delete(&item).is_ok());
        assert!(!store.exists(&item));
    }

    #[test]
    fn test_delete_directory_recursively() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        fs::create_dir_all(dir.path().join("tree/sub")).unwrap();
        fs::write(dir.path().join("tree/sub/x.txt"), "x").unwrap();

        assert!(store.delete(&StoreItem::new("tree")).is_ok());
        assert!(!dir.path().join("tree").exists());
    }

    #[test]
    fn test_delete_missing_is_fatal() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let status = store.delete(&StoreItem::new("ghost"));
        assert!(status.is_fatal());
    }

    #[test]
    fn test_last_changed_takes_deep_maximum() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        fs::create_dir_all(dir.path().join("tree/sub")).unwrap();
        fs::write(dir.path().join("tree/old.txt"), "a").unwrap();
        fs::write(dir.path().join("tree/sub/new.txt"), "b").unwrap();

        let old = FileTime::from_unix_time(1_000_000, 0);
        let new = FileTime::from_unix_time(2_000_000, 0);
        set_file_mtime(dir.path().join("tree"), old).unwrap();
        set_file_mtime(dir.path().join("tree/old.txt"), old).unwrap();
        set_file_mtime(dir.path().join("tree/sub"), old).unwrap();
        set_file_mtime(dir.path().join("tree/sub/new.txt"), new).unwrap();

        let changed = store.last_changed(&StoreItem::new("tree"), None).unwrap();
        assert_eq!(
            changed,
            SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(2_000_000)
        );
    }

    #[test]
    fn test_last_changed_missing_item_errors() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        assert!(store.last_changed(&StoreItem::new("ghost"), None).is_err());
    }

    #[test]
    fn test_last_changed_quick_threshold_short_circuits() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        fs::write(dir.path().join("fresh.txt"), "x").unwrap();

        // Threshold far in the past: the first observation already beats it.
        let threshold = SystemTime::UNIX_EPOCH;
        let changed = store
            .last_changed(&StoreItem::new("fresh.txt"), Some(threshold))
            .unwrap();
        assert!(changed > threshold);
    }

    #[test]
    fn test_create_new_file_is_exclusive() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let marker = StoreItem::new("data").finished_marker();

        store.create_new_file(&marker).unwrap();
        assert!(store.exists(&marker));
        assert_eq!(
            fs::metadata(store.child_path(&marker)).unwrap().len(),
            0,
            "markers are zero-byte"
        );

        // Second creation must fail: create-new semantics.
        assert!(store.create_new_file(&marker).is_err());
    }

    #[test]
    fn test_probe() {
        let dir = tempdir().unwrap();
        assert!(LocalStore::new(dir.path()).probe().is_ok());
        assert!(LocalStore::new(dir.path().join("missing")).probe().is_retriable());
    }
}
