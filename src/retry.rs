//! Bounded retry with fixed backoff.
//!
//! [`RetryingOperation`] wraps an idempotent (or safely repeatable)
//! operation and retries it up to a configured bound with a fixed sleep
//! between attempts. It stops early when the operation's target has
//! vanished (nothing left to do) or when cancellation is requested.
//!
//! # Example
//!
//! ```
//! use pathmover::{RetryOutcome, RetryingOperation};
//! use std::time::Duration;
//!
//! let outcome = RetryingOperation::new("demo", 2, Duration::ZERO)
//!     .run(|| true, || false);
//! assert_eq!(outcome, RetryOutcome::Failed);
//! ```

use crate::store::{FileStore, StoreItem};
use crate::timing::TimingParameters;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info};

/// Slice length for cancellation-aware sleeps.
const SLEEP_SLICE: Duration = Duration::from_millis(20);

/// Terminal outcome of a retried operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Some attempt succeeded.
    Succeeded,
    /// All attempts failed.
    Failed,
    /// The operation's target vanished; there is nothing left to do.
    /// Not counted as a failure.
    TargetVanished,
    /// Cancellation was requested during a sleep.
    Cancelled,
}

impl RetryOutcome {
    /// Whether the outcome means the work is done (either performed or
    /// moot).
    pub fn is_done(self) -> bool {
        matches!(self, RetryOutcome::Succeeded | RetryOutcome::TargetVanished)
    }
}

/// Applies bounded retries with fixed backoff to a recoverable
/// operation.
///
/// `max_retries = N` yields at most `N + 1` attempts (one initial plus N
/// retries); `max_retries = 0` means exactly one attempt.
pub struct RetryingOperation {
    description: String,
    max_retries: u32,
    delay: Duration,
    cancel: Option<Arc<AtomicBool>>,
}

impl RetryingOperation {
    /// Create a wrapper for an operation described by `description`
    /// (used in log messages).
    pub fn new(description: impl Into<String>, max_retries: u32, delay: Duration) -> Self {
        Self {
            description: description.into(),
            max_retries,
            delay,
            cancel: None,
        }
    }

    /// Create a wrapper taking its bounds from [`TimingParameters`].
    pub fn from_timing(description: impl Into<String>, timing: &TimingParameters) -> Self {
        Self::new(
            description,
            timing.max_retries,
            timing.interval_to_wait_after_failure,
        )
    }

    /// Observe a cancellation token between attempts.
    #[must_use]
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Run `operation` until it succeeds or the retry budget is
    /// exhausted.
    ///
    /// `target_present` is checked before every attempt; when it reports
    /// `false` the target precondition has vanished and the wrapper
    /// stops immediately without counting a failure.
    pub fn run(
        &self,
        mut target_present: impl FnMut() -> bool,
        mut operation: impl FnMut() -> bool,
    ) -> RetryOutcome {
        for attempt in 0..=self.max_retries {
            if !target_present() {
                info!(
                    operation = %self.description,
                    "target vanished, nothing left to do"
                );
                return RetryOutcome::TargetVanished;
            }
            if operation() {
                if attempt > 0 {
                    info!(
                        operation = %self.description,
                        attempt = attempt + 1,
                        "operation succeeded after retrying"
                    );
                }
                return RetryOutcome::Succeeded;
            }
            if attempt < self.max_retries {
                debug!(
                    operation = %self.description,
                    attempt = attempt + 1,
                    attempts_left = self.max_retries - attempt,
                    delay = ?self.delay,
                    "operation failed, will retry"
                );
                if !sleep_unless_cancelled(self.delay, self.cancel.as_deref()) {
                    info!(operation = %self.description, "cancelled while waiting to retry");
                    return RetryOutcome::Cancelled;
                }
            }
        }
        error!(
            operation = %self.description,
            attempts = self.max_retries + 1,
            "operation failed permanently, giving up"
        );
        RetryOutcome::Failed
    }
}

/// Sleep for `total`, observing the cancellation token. Returns `false`
/// if cancelled.
pub(crate) fn sleep_unless_cancelled(total: Duration, cancel: Option<&AtomicBool>) -> bool {
    let check = |cancel: Option<&AtomicBool>| {
        cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
    };
    if check(cancel) {
        return false;
    }
    let mut remaining = total;
    while !remaining.is_zero() {
        let slice = remaining.min(SLEEP_SLICE);
        std::thread::sleep(slice);
        remaining -= slice;
        if check(cancel) {
            return false;
        }
    }
    true
}

/// Delete `item` from `store` with bounded retries.
///
/// Returns `true` when the item is gone afterwards (deleted now, or
/// vanished on its own). A fatal delete status stops retrying at once.
pub(crate) fn retrying_delete(
    store: &dyn FileStore,
    item: &StoreItem,
    timing: &TimingParameters,
    cancel: Option<Arc<AtomicBool>>,
) -> bool {
    let mut fatal = false;
    let mut wrapper = RetryingOperation::from_timing(
        format!("remove '{item}' from {}", store.describe()),
        timing,
    );
    if let Some(cancel) = cancel {
        wrapper = wrapper.with_cancel(cancel);
    }
    let outcome = wrapper.run(
        || store.exists(item),
        || {
            let status = store.delete(item);
            if status.is_ok() {
                true
            } else if status.is_fatal() {
                // Retrying a fatal delete is futile; stop the loop but
                // report failure to the caller.
                fatal = true;
                true
            } else {
                false
            }
        },
    );
    outcome.is_done() && !fatal
}
