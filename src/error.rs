//! Error types for pathmover.
//!
//! This module provides the [`Error`] enum for configuration-class
//! failures and the [`Result`] type alias.
//!
//! Expected runtime failures (a copy process dying, a remote share going
//! away mid-transfer) are *not* errors in this sense: they are reported
//! as [`Status`](crate::Status) values so retry logic can act on them.
//! [`Error`] is reserved for problems no retry can fix: a missing or
//! too-old rsync binary, invalid timing parameters, a mover wired to
//! stores that cannot hold marker files.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for pathmover setup operations.
///
/// This is a type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration-class failures raised at construction or check time.
///
/// All variants indicate an unrecoverable setup problem; none of them is
/// produced during the per-item move lifecycle.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The rsync executable does not exist at the configured path
    #[error("rsync executable does not exist: {0}")]
    RsyncNotFound(PathBuf),

    /// The rsync executable exists but its version could not be determined
    #[error("rsync executable is invalid: {path}: {reason}")]
    RsyncInvalid {
        /// Path to the executable that failed the probe
        path: PathBuf,
        /// What went wrong when probing it
        reason: String,
    },

    /// The rsync executable is older than the minimum supported version
    #[error("rsync executable is too old (required: {required}, found: {found}): {path}")]
    RsyncTooOld {
        /// Path to the executable
        path: PathBuf,
        /// Minimum supported version
        required: String,
        /// Version that was actually found
        found: String,
    },

    /// Timing parameters violate an invariant
    #[error("invalid timing parameters: {0}")]
    InvalidTimingParameters(String),

    /// Neither the source nor the destination store can hold marker files
    #[error("no store accepts marker files (source: {source_store}, destination: {destination_store})")]
    NoExtendedStore {
        /// Description of the source store
        source_store: String,
        /// Description of the destination store
        destination_store: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsync_too_old_display() {
        let error = Error::RsyncTooOld {
            path: PathBuf::from("/usr/bin/rsync"),
            required: "2.6.0".to_string(),
            found: "2.5.7".to_string(),
        };
        let msg = format!("{}", error);
        assert!(msg.contains("too old"));
        assert!(msg.contains("2.6.0"));
        assert!(msg.contains("2.5.7"));
    }

    #[test]
    fn test_no_extended_store_display() {
        let error = Error::NoExtendedStore {
            source_store: "local '/in'".to_string(),
            destination_store: "remote 'h:/out'".to_string(),
        };
        assert!(format!("{}", error).contains("marker files"));
    }
}
