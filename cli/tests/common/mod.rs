//! Shared fixtures for the pmv integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Source and destination directories plus a fake rsync that really
/// copies, so the full move flow can run without rsync installed.
pub struct MoveFixture {
    pub src: TempDir,
    pub dst: TempDir,
    tools: TempDir,
}

impl MoveFixture {
    pub fn new() -> Self {
        let fixture = Self {
            src: TempDir::new().expect("Failed to create temp source dir"),
            dst: TempDir::new().expect("Failed to create temp dest dir"),
            tools: TempDir::new().expect("Failed to create temp tools dir"),
        };
        write_fake_rsync(&fixture.tools.path().join("rsync"));
        fixture
    }

    pub fn rsync(&self) -> PathBuf {
        self.tools.path().join("rsync")
    }

    /// Create an item directory in the source with a couple of files.
    pub fn seed_item(&self, name: &str) {
        let item = self.src.path().join(name);
        fs::create_dir_all(item.join("sub")).expect("Failed to create item dir");
        fs::write(item.join("data.txt"), format!("payload of {name}"))
            .expect("Failed to write file");
        fs::write(item.join("sub/more.txt"), "nested").expect("Failed to write file");
    }

    pub fn assert_moved(&self, name: &str) {
        let copied = self.dst.path().join(name);
        assert!(copied.join("data.txt").exists(), "copy missing: {name}");
        assert_eq!(
            fs::read_to_string(copied.join("data.txt")).expect("Failed to read copy"),
            format!("payload of {name}"),
        );
        assert!(copied.join("sub/more.txt").exists());
        assert!(
            !self.src.path().join(name).exists(),
            "source not removed: {name}"
        );
        assert!(
            self.dst
                .path()
                .join(format!(".MARKER_is_finished_{name}"))
                .exists(),
            "finished marker missing: {name}"
        );
        assert!(
            !self
                .dst
                .path()
                .join(format!(".MARKER_deletion_in_progress_{name}"))
                .exists(),
            "deletion marker left behind: {name}"
        );
    }
}

impl Default for MoveFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A stand-in rsync: answers `--version` like rsync 3.2.7, can be made
/// to fail through `FAKE_RSYNC_EXIT`, and otherwise copies the last two
/// positional arguments with rsync's trailing-slash semantics.
fn write_fake_rsync(path: &Path) {
    let script = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
    echo "rsync  version 3.2.7  protocol version 31"
    exit 0
fi
if [ -n "$FAKE_RSYNC_EXIT" ]; then
    exit "$FAKE_RSYNC_EXIT"
fi
src=""
dst=""
for arg in "$@"; do
    case "$arg" in
        -*) ;;
        *) src="$dst"; dst="$arg" ;;
    esac
done
if [ -n "$FAKE_RSYNC_FAIL_FOR" ]; then
    case "$src" in
        *"$FAKE_RSYNC_FAIL_FOR"*) exit 23 ;;
    esac
fi
dst="${dst%/}"
case "$src" in
    */) mkdir -p "$dst" && cp -R "${src}." "$dst" ;;
    *)
        name=$(basename "$src")
        rm -rf "$dst/$name"
        mkdir -p "$dst" && cp -R "$src" "$dst/$name"
        ;;
esac
"#;
    fs::write(path, script).expect("Failed to write fake rsync");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
            .expect("Failed to set permissions");
    }
}
