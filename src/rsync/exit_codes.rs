//! Translation of rsync exit codes into [`StatusKind`].
//!
//! The classification table is the external tool's documented contract
//! and is kept in one place as data. Transient failure classes (socket,
//! file and protocol I/O, diagnostics, IPC, signals, waitpid, memory
//! allocation, partial or vanished transfers, stopped deletes, timeouts,
//! and the generic 255 the remote shell produces when killed) are
//! retriable; every other non-zero code is fatal. Future rsync versions
//! may renumber codes, so edit the tables, not the logic.

use crate::status::StatusKind;

/// Exit codes for which a retry has a realistic chance of succeeding.
const RETRIABLE_EXIT_CODES: &[i32] = &[10, 11, 12, 13, 14, 20, 21, 22, 23, 24, 25, 30, 255];

/// Documented meanings of well-known rsync exit codes.
const EXIT_CODE_MESSAGES: &[(i32, &str)] = &[
    (1, "syntax or usage error"),
    (2, "protocol incompatibility"),
    (3, "errors selecting input/output files, dirs"),
    (4, "requested action not supported"),
    (5, "error starting client-server protocol"),
    (6, "daemon unable to append to log-file"),
    (10, "error in socket IO"),
    (11, "error in file IO"),
    (12, "error in rsync protocol data stream"),
    (13, "errors with program diagnostics"),
    (14, "error in IPC code"),
    (20, "received SIGUSR1 or SIGINT"),
    (21, "some error returned by waitpid()"),
    (22, "error allocating core memory buffers"),
    (23, "partial transfer due to error"),
    (24, "partial transfer due to vanished source files"),
    (25, "the --max-delete limit stopped deletions"),
    (30, "timeout in data send/receive"),
    (35, "timeout waiting for daemon connection"),
    (255, "unexplained error (e.g. killed remote shell)"),
];

/// Classify an rsync exit code.
///
/// Total over all of `i32`: 0 is [`StatusKind::Ok`], the retriable table
/// yields [`StatusKind::RetriableError`], everything else
/// [`StatusKind::FatalError`].
pub fn classify(exit_code: i32) -> StatusKind {
    if exit_code == 0 {
        StatusKind::Ok
    } else if RETRIABLE_EXIT_CODES.contains(&exit_code) {
        StatusKind::RetriableError
    } else {
        StatusKind::FatalError
    }
}

/// The documented meaning of a non-zero rsync exit code.
///
/// Must not be called for code 0; unknown codes get a generic message
/// carrying the code itself.
pub fn message(exit_code: i32) -> String {
    debug_assert_ne!(exit_code, 0, "message() must not be called for success");
    match EXIT_CODE_MESSAGES
        .iter()
        .find(|(code, _)| *code == exit_code)
    {
        Some((_, msg)) => format!("rsync: {msg} (exit code {exit_code})"),
        None => format!("rsync: unknown error (exit code {exit_code})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_ok() {
        assert_eq!(classify(0), StatusKind::Ok);
    }

    #[test]
    fn test_retriable_table() {
        for code in [10, 11, 12, 13, 14, 20, 21, 22, 23, 24, 25, 30, 255] {
            assert_eq!(classify(code), StatusKind::RetriableError, "code {code}");
        }
    }

    #[test]
    fn test_known_fatal_codes() {
        for code in [1, 2, 3, 4, 5, 6, 35] {
            assert_eq!(classify(code), StatusKind::FatalError, "code {code}");
        }
    }

    #[test]
    fn test_classification_total_over_byte_range() {
        // Every possible wait-status byte classifies to exactly one kind,
        // and only 0 is OK.
        for code in 0..=255 {
            let kind = classify(code);
            if code == 0 {
                assert_eq!(kind, StatusKind::Ok);
            } else {
                assert_ne!(kind, StatusKind::Ok, "code {code}");
            }
        }
    }

    #[test]
    fn test_message_known_code() {
        let msg = message(23);
        assert!(msg.contains("partial transfer"));
        assert!(msg.contains("23"));
    }

    #[test]
    fn test_message_unknown_code() {
        let msg = message(99);
        assert!(msg.contains("unknown error"));
        assert!(msg.contains("99"));
    }
}
