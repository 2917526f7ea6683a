//! The tri-state outcome type for operations that are expected to fail.
//!
//! Copying over a network and deleting on a remote share fail routinely.
//! Those failures are data, not exceptional control flow, so every
//! operation in this crate that can fail in an expected way returns a
//! [`Status`] value instead of an `Err`. Only configuration-class
//! problems (missing rsync binary, invalid timing parameters) use
//! [`crate::Error`].
//!
//! # Example
//!
//! ```
//! use pathmover::Status;
//!
//! let status = Status::retriable("connection reset by peer");
//! assert!(status.is_retriable());
//! assert!(!status.is_ok());
//! ```

use std::fmt;

/// Classification of an operation outcome.
///
/// | Kind | Meaning |
/// |------|---------|
/// | `Ok` | The operation succeeded |
/// | `RetriableError` | Failed, but a retry may succeed (transient I/O, timeout, killed process) |
/// | `FatalError` | Failed and retrying is futile (bad arguments, missing target) |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    /// The operation succeeded.
    Ok,
    /// The operation failed but may succeed when retried.
    RetriableError,
    /// The operation failed permanently.
    FatalError,
}

/// Outcome of a copy, delete, or move step, with an optional message.
///
/// Construct with [`Status::OK`], [`Status::retriable`] or
/// [`Status::fatal`]. The message is carried for logging; [`StatusKind`]
/// drives control flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    kind: StatusKind,
    message: Option<String>,
}

impl Status {
    /// The canonical success value.
    pub const OK: Status = Status {
        kind: StatusKind::Ok,
        message: None,
    };

    /// Create a retriable error with a message.
    pub fn retriable(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::RetriableError,
            message: Some(message.into()),
        }
    }

    /// Create a fatal error with a message.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::FatalError,
            message: Some(message.into()),
        }
    }

    /// Create an error whose retriability is decided at runtime.
    pub fn error(retriable: bool, message: impl Into<String>) -> Self {
        if retriable {
            Self::retriable(message)
        } else {
            Self::fatal(message)
        }
    }

    /// The classification of this status.
    pub fn kind(&self) -> StatusKind {
        self.kind
    }

    /// Whether the operation succeeded.
    pub fn is_ok(&self) -> bool {
        self.kind == StatusKind::Ok
    }

    /// Whether the operation failed (retriable or fatal).
    pub fn is_error(&self) -> bool {
        self.kind != StatusKind::Ok
    }

    /// Whether the operation failed but is worth retrying.
    pub fn is_retriable(&self) -> bool {
        self.kind == StatusKind::RetriableError
    }

    /// Whether the operation failed permanently.
    pub fn is_fatal(&self) -> bool {
        self.kind == StatusKind::FatalError
    }

    /// The message attached to this status, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, self.message.as_deref()) {
            (StatusKind::Ok, _) => write!(f, "OK"),
            (StatusKind::RetriableError, Some(msg)) => write!(f, "retriable error: {msg}"),
            (StatusKind::RetriableError, None) => write!(f, "retriable error"),
            (StatusKind::FatalError, Some(msg)) => write!(f, "fatal error: {msg}"),
            (StatusKind::FatalError, None) => write!(f, "fatal error"),
        }
    }
}
