//! Probing and comparing rsync versions.
//!
//! The minimum supported version (2.6.0) is enforced once at
//! [`check`](crate::RsyncCopier::check) time; the append-capability
//! threshold (2.6.7) is consulted per copy when choosing between
//! `--append` and `--whole-file`.

use std::fmt;
use std::path::Path;
use std::process::Command;

/// A parsed three-part rsync version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsyncVersion {
    major: u32,
    minor: u32,
    patch: u32,
    raw: String,
}

impl RsyncVersion {
    /// Parse a version string such as `3.2.7` or `3.0.0pre1`.
    pub fn parse(version: &str) -> Option<Self> {
        let mut parts = version.splitn(3, '.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let rest = parts.next()?;
        // The patch component may carry a pre-release suffix ("0pre1").
        let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
        let patch = digits.parse().ok()?;
        Some(Self {
            major,
            minor,
            patch,
            raw: version.to_string(),
        })
    }

    /// Parse the first line of `rsync --version` output, e.g.
    /// `rsync  version 3.2.7  protocol version 31`.
    pub fn parse_version_line(line: &str) -> Option<Self> {
        let after = line.split("version").nth(1)?;
        let token = after.split_whitespace().next()?;
        Self::parse(token)
    }

    /// Whether this version is at least `major.minor.patch`.
    pub fn is_newer_or_equal(&self, major: u32, minor: u32, patch: u32) -> bool {
        (self.major, self.minor, self.patch) >= (major, minor, patch)
    }

    /// Whether the version string marks a pre-release build.
    pub fn is_pre_release(&self) -> bool {
        self.raw.contains("pre")
    }

    /// The version string as reported by the tool.
    pub fn version_string(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for RsyncVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Run `<executable> --version` and parse the reported version.
///
/// Returns `None` if the executable cannot be run or its output is not
/// recognized; the caller decides whether that is fatal.
pub(crate) fn probe_version(executable: &Path) -> Option<RsyncVersion> {
    let output = Command::new(executable).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let first_line = stdout.lines().next()?;
    RsyncVersion::parse_version_line(first_line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_version() {
        let v = RsyncVersion::parse("3.2.7").unwrap();
        assert!(v.is_newer_or_equal(2, 6, 7));
        assert!(v.is_newer_or_equal(3, 2, 7));
        assert!(!v.is_newer_or_equal(3, 2, 8));
        assert!(!v.is_pre_release());
    }

    #[test]
    fn test_parse_pre_release() {
        let v = RsyncVersion::parse("3.0.0pre1").unwrap();
        assert!(v.is_pre_release());
        assert!(v.is_newer_or_equal(3, 0, 0));
        assert_eq!(v.version_string(), "3.0.0pre1");
    }

    #[test]
    fn test_parse_version_line() {
        let v =
            RsyncVersion::parse_version_line("rsync  version 3.1.3  protocol version 31").unwrap();
        assert_eq!(v.version_string(), "3.1.3");
    }

    #[test]
    fn test_parse_modern_version_line() {
        // Newer rsync prints the version differently.
        let v = RsyncVersion::parse_version_line(
            "rsync  version 3.2.7  protocol version 31",
        )
        .unwrap();
        assert!(v.is_newer_or_equal(3, 2, 0));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(RsyncVersion::parse("not-a-version").is_none());
        assert!(RsyncVersion::parse_version_line("bash: rsync: not found").is_none());
    }

    #[test]
    fn test_ordering_across_components() {
        let v = RsyncVersion::parse("2.6.9").unwrap();
        assert!(v.is_newer_or_equal(2, 6, 7));
        assert!(!v.is_newer_or_equal(2, 7, 0));
        assert!(!v.is_newer_or_equal(3, 0, 0));
    }
}
