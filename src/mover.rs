//! The move-and-clean orchestrator.
//!
//! [`RemotePathMover`] drives the full lifecycle for one work item:
//! copy the item to the destination store under activity supervision,
//! remove the source, and record completion with a marker file. The
//! multi-step sequence is made crash-recoverable by marker files: a
//! "deletion in progress" marker is written immediately before the
//! source is removed and deleted immediately after, so a marker found on
//! restart proves the copy had already completed and the mover can skip
//! straight to cleanup. Re-running the cleanup steps is harmless; they
//! are idempotent.
//!
//! State machine per item:
//!
//! ```text
//! DetectRecovery ──(marker found)──────────────┐
//!       │                                      │
//!       ▼                                      ▼
//!   Copying ──ok──► RemovingSource ──► MarkingFinished ──► Done
//!       │ retriable: sleep, retry (bounded)
//!       └──fatal / budget exhausted──► Failed
//! ```

use crate::bounded::call_with_timeout;
use crate::copier::PathCopier;
use crate::monitor::ActivityMonitor;
use crate::process::Terminable;
use crate::retry::{retrying_delete, sleep_unless_cancelled};
use crate::status::Status;
use crate::store::{ExtendedFileStore, FileStore, StoreItem};
use crate::timing::TimingParameters;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Timeout for the pre-copy destination reachability probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Moves work items from a source store to a destination store,
/// supervising each copy and recovering interrupted cleanups.
///
/// One mover instance handles one item at a time; process several items
/// concurrently by giving each worker thread its own instance.
pub struct RemotePathMover {
    source: Arc<dyn FileStore>,
    destination: Arc<dyn FileStore>,
    copier: Arc<dyn PathCopier>,
    timing: TimingParameters,
    cancel: Option<Arc<AtomicBool>>,
}

impl std::fmt::Debug for RemotePathMover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemotePathMover")
            .field("timing", &self.timing)
            .finish_non_exhaustive()
    }
}

impl RemotePathMover {
    /// Create a mover between two stores.
    ///
    /// Fails fast if the timing parameters are invalid or if neither
    /// store can hold marker files (the sequence would not be
    /// recoverable).
    pub fn new(
        source: Arc<dyn FileStore>,
        destination: Arc<dyn FileStore>,
        copier: Arc<dyn PathCopier>,
        timing: TimingParameters,
    ) -> crate::Result<Self> {
        timing.validate()?;
        if destination.try_as_extended().is_none() && source.try_as_extended().is_none() {
            return Err(crate::Error::NoExtendedStore {
                source_store: source.describe(),
                destination_store: destination.describe(),
            });
        }
        Ok(Self {
            source,
            destination,
            copier,
            timing,
            cancel: None,
        })
    }

    /// Observe a cancellation token during sleeps between retries.
    #[must_use]
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Move one item end to end. Returns `true` when the item arrived
    /// at the destination, the source is cleaned up, and the finished
    /// marker is in place.
    ///
    /// On failure the item is left untouched in the source for a later
    /// pass; the source is never deleted before a confirmed-complete
    /// copy.
    pub fn handle(&self, item: &StoreItem) -> bool {
        if item.is_marker() {
            warn!(%item, "refusing to move a marker file as a work item");
            return false;
        }
        info!(
            %item,
            from = %self.source.describe(),
            to = %self.destination.describe(),
            "moving item"
        );

        if self.detect_recovery(item) {
            info!(
                %item,
                "found deletion-in-progress marker; copy already complete, resuming cleanup"
            );
        } else if !self.copy_with_retries(item) {
            return false;
        }

        self.remove_source(item);
        self.mark_finished(item);
        info!(%item, "move complete");
        true
    }

    /// The store that holds marker files: the destination when possible,
    /// the source otherwise. `new` guarantees one of them qualifies.
    fn marker_store(&self) -> &dyn ExtendedFileStore {
        self.destination
            .try_as_extended()
            .or_else(|| self.source.try_as_extended())
            .unwrap_or_else(|| unreachable!("checked in RemotePathMover::new"))
    }

    fn detect_recovery(&self, item: &StoreItem) -> bool {
        self.marker_store()
            .exists(&item.deletion_in_progress_marker())
    }

    /// The copying state: bounded retries around a supervised copy.
    fn copy_with_retries(&self, item: &StoreItem) -> bool {
        let max_attempts = self.timing.max_retries + 1;
        for attempt in 1..=max_attempts {
            if !self.check_destination_reachable() {
                warn!(
                    %item,
                    attempt,
                    destination = %self.destination.describe(),
                    "destination is not reachable"
                );
            } else {
                let status = self.supervised_copy(item);
                if status.is_ok() {
                    debug!(%item, attempt, "copy succeeded");
                    return true;
                }
                if status.is_fatal() {
                    error!(
                        %item,
                        attempt,
                        status = %status,
                        "copy failed fatally, giving up on this item"
                    );
                    return false;
                }
                if attempt == 1 {
                    warn!(%item, status = %status, "copy failed, will retry");
                } else {
                    warn!(
                        %item,
                        status = %status,
                        attempt,
                        max_attempts,
                        "copy retry failed"
                    );
                }
            }
            if attempt < max_attempts
                && !sleep_unless_cancelled(
                    self.timing.interval_to_wait_after_failure,
                    self.cancel.as_deref(),
                )
            {
                info!(%item, "cancelled while waiting to retry copy");
                return false;
            }
        }
        error!(
            %item,
            attempts = max_attempts,
            from = %self.source.describe(),
            to = %self.destination.describe(),
            "moving failed permanently; item stays in the source store"
        );
        false
    }

    /// One copy attempt with the activity monitor watching the
    /// destination. The monitor is always stopped before returning, so
    /// no timer thread can outlive the copy step.
    fn supervised_copy(&self, item: &StoreItem) -> Status {
        let monitor_handle = if self.destination.supports_activity_monitoring() {
            let monitor = ActivityMonitor::new(
                Arc::clone(&self.destination),
                terminable_of(&self.copier),
                self.timing.clone(),
            );
            Some(monitor.spawn(item.clone()))
        } else {
            debug!(
                destination = %self.destination.describe(),
                "destination cannot be watched; copying without activity monitor"
            );
            None
        };

        let status = self.copy_item(item);

        if let Some(handle) = monitor_handle {
            handle.stop();
        }
        status
    }

    /// Dispatch to the right copier operation for the store pair.
    fn copy_item(&self, item: &StoreItem) -> Status {
        let source_path = self.source.child_path(item);
        match (self.source.host(), self.destination.host()) {
            (None, None) => self.copier.copy(&source_path, self.destination.path()),
            (None, Some(host)) => self.copier.copy_to_remote(
                &source_path,
                self.destination.path(),
                host,
                self.destination.rsync_module(),
                self.destination.password_file(),
            ),
            (Some(host), None) => self.copier.copy_from_remote(
                &source_path,
                host,
                self.destination.path(),
                self.source.rsync_module(),
                self.source.password_file(),
            ),
            (Some(_), Some(_)) => {
                Status::fatal("both stores are remote; exactly one side may be remote")
            }
        }
    }

    /// Bounded-latency probe of the destination root. A hanging mount
    /// must not block the mover thread forever.
    fn check_destination_reachable(&self) -> bool {
        let destination = Arc::clone(&self.destination);
        match call_with_timeout("destination-probe", PROBE_TIMEOUT, move || {
            destination.probe()
        }) {
            Some(status) if status.is_ok() => true,
            Some(status) => {
                warn!(status = %status, "destination probe failed");
                false
            }
            None => {
                warn!(timeout = ?PROBE_TIMEOUT, "destination probe timed out");
                false
            }
        }
    }

    /// The removing-source state. The destination copy is durable at
    /// this point, so failures here are reported but do not undo the
    /// move.
    fn remove_source(&self, item: &StoreItem) {
        let marker_store = self.marker_store();
        let marker = item.deletion_in_progress_marker();

        // Best effort: without the marker a crash between here and the
        // delete loses only recovery convenience, not data.
        if !marker_store.exists(&marker) {
            if let Err(e) = marker_store.create_new_file(&marker) {
                warn!(%item, error = %e, "cannot write deletion-in-progress marker");
            }
        }

        if !retrying_delete(
            self.source.as_ref(),
            item,
            &self.timing,
            self.cancel.clone(),
        ) {
            error!(
                %item,
                source = %self.source.describe(),
                "cannot remove item from source store; manual cleanup needed"
            );
        }

        let status = marker_store.delete(&marker);
        if status.is_error() && marker_store.exists(&marker) {
            warn!(
                %item,
                status = %status,
                "cannot remove deletion-in-progress marker"
            );
        }
    }

    /// The marking-finished state. When the destination cannot be
    /// touched directly, the marker is staged in the source store and
    /// shipped over with a dedicated copy.
    fn mark_finished(&self, item: &StoreItem) {
        let marker = item.finished_marker();
        if let Some(destination) = self.destination.try_as_extended() {
            if destination.exists(&marker) {
                // Idempotent re-run after a crash.
                return;
            }
            if let Err(e) = destination.create_new_file(&marker) {
                warn!(%item, error = %e, "cannot write finished marker at destination");
            }
            return;
        }

        // Destination is purely remote: stage locally, ship, clean up.
        let Some(source) = self.source.try_as_extended() else {
            // new() guarantees one extended store, and it is not the
            // destination here.
            return;
        };
        let Some(host) = self.destination.host() else {
            warn!(%item, "destination is neither extended nor remote; cannot mark finished");
            return;
        };
        if !source.exists(&marker) {
            if let Err(e) = source.create_new_file(&marker) {
                warn!(%item, error = %e, "cannot stage finished marker in source store");
                return;
            }
        }
        let status = self.copier.copy_to_remote(
            &source.child_path(&marker),
            self.destination.path(),
            host,
            self.destination.rsync_module(),
            self.destination.password_file(),
        );
        if status.is_error() {
            warn!(%item, status = %status, "cannot ship finished marker to destination");
        }
        let status = source.delete(&marker);
        if status.is_error() {
            warn!(%item, status = %status, "cannot remove staged finished marker");
        }
    }
}

fn terminable_of(copier: &Arc<dyn PathCopier>) -> Arc<dyn Terminable> {
    let copier = Arc::clone(copier);
    Arc::new(CopierTerminable { copier })
}

struct CopierTerminable {
    copier: Arc<dyn PathCopier>,
}

impl Terminable for CopierTerminable {
    fn terminate(&self) -> bool {
        self.copier.terminate()
    }
}
