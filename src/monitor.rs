//! Stall detection for in-flight copies.
//!
//! [`ActivityMonitor`] watches the destination of a copy: on every tick
//! it observes the newest modification time below the destination item
//! and, if nothing has progressed for longer than the inactivity period,
//! terminates the associated copy process.
//!
//! The monitor is an explicit state machine: `Idle`, then
//! [`start`](ActivityMonitor::start), then one
//! [`tick`](ActivityMonitor::tick) at a time until
//! [`stop`](ActivityMonitor::stop) or a stall, so tests can drive it
//! with simulated clocks. [`ActivityMonitor::spawn`] wraps it in a
//! background thread for production use.
//!
//! Timing queries never run on the poll loop itself: a hung network
//! filesystem must not wedge the watchdog, so each observation is
//! dispatched through a bounded worker. A cheap quick check (budgeted at
//! a fraction of the poll interval, allowed to stop as soon as it sees
//! anything recent) is tried first, with a slower full check as
//! fallback.

use crate::bounded::call_with_timeout;
use crate::process::Terminable;
use crate::store::{FileStore, StoreItem};
use crate::timing::TimingParameters;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};
use tracing::{debug, error, trace, warn};

/// Slice length for interruptible sleeps in the monitor thread.
const SLEEP_SLICE: Duration = Duration::from_millis(20);

/// Lifecycle state of an [`ActivityMonitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Created, not yet watching anything.
    Idle,
    /// Watching an item; ticks are expected.
    Running,
    /// Stopped, either explicitly or after declaring a stall. Terminal.
    Stopped,
}

/// Watches one destination item for progress and kills the copy process
/// when it stalls.
pub struct ActivityMonitor {
    store: Arc<dyn FileStore>,
    copy_process: Arc<dyn Terminable>,
    timing: TimingParameters,
    state: MonitorState,
    item: Option<StoreItem>,
    /// Monotonic maximum of all observed last-changed times. Taking the
    /// max avoids false alarms in the gap after one file finishes and
    /// before the next one appears.
    last_changed: Option<SystemTime>,
    /// Wall-clock time the watch started; nothing can stall before the
    /// first inactivity period has even elapsed once.
    started_at: Option<SystemTime>,
}

impl ActivityMonitor {
    /// Create a monitor for `store`, terminating `copy_process` on stall.
    pub fn new(
        store: Arc<dyn FileStore>,
        copy_process: Arc<dyn Terminable>,
        timing: TimingParameters,
    ) -> Self {
        Self {
            store,
            copy_process,
            timing,
            state: MonitorState::Idle,
            item: None,
            last_changed: None,
            started_at: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Begin watching `item` as of `now`.
    pub fn start(&mut self, item: StoreItem, now: SystemTime) {
        debug!(%item, store = %self.store.describe(), "starting activity monitor");
        self.item = Some(item);
        self.last_changed = None;
        self.started_at = Some(now);
        self.state = MonitorState::Running;
    }

    /// Stop watching. Idempotent; the state is terminal.
    pub fn stop(&mut self) {
        if self.state == MonitorState::Running {
            debug!("stopping activity monitor");
        }
        self.state = MonitorState::Stopped;
    }

    /// One observation of the destination, evaluated at `now`.
    ///
    /// No-op unless the monitor is `Running`. On a stall this
    /// terminates the copy process (exactly once, because the state
    /// flips to `Stopped`).
    pub fn tick(&mut self, now: SystemTime) {
        if self.state != MonitorState::Running {
            return;
        }
        let Some(item) = self.item.clone() else {
            return;
        };

        if !self.store.exists(&item) {
            // Not created yet; the transfer may still be connecting. No
            // observation, no alarm.
            trace!(%item, "destination item not present yet");
            return;
        }
        if let Some(observed) = self.observe_last_changed(&item, now) {
            if observed > now {
                error!(
                    %item,
                    ?observed,
                    "observed modification time is in the future; check for clock skew"
                );
            }
            let newest = match self.last_changed {
                Some(previous) => previous.max(observed),
                None => observed,
            };
            self.last_changed = Some(newest);
        }

        // Until the first successful observation, measure inactivity
        // from the start of the watch.
        let reference = self.last_changed.or(self.started_at);
        let Some(reference) = reference else { return };
        match now.duration_since(reference) {
            Ok(inactive_for) if inactive_for > self.timing.inactivity_period => {
                warn!(
                    %item,
                    ?inactive_for,
                    inactivity_period = ?self.timing.inactivity_period,
                    "no progress on destination; terminating copy process"
                );
                self.copy_process.terminate();
                self.state = MonitorState::Stopped;
            }
            _ => {}
        }
    }

    /// Quick bounded probe first, full check as fallback. `None` when
    /// neither answered in time (that tick simply records nothing).
    fn observe_last_changed(&self, item: &StoreItem, now: SystemTime) -> Option<SystemTime> {
        let quick_budget = self.timing.quick_check_budget();
        let quick_threshold =
            now - (self.timing.inactivity_period.saturating_sub(quick_budget * 2));

        let store = Arc::clone(&self.store);
        let quick_item = item.clone();
        let quick = call_with_timeout("quick-check", quick_budget, move || {
            store.last_changed(&quick_item, Some(quick_threshold))
        });
        let answer = match quick {
            Some(answer) => answer,
            None => {
                trace!(%item, "quick check missed its budget, falling back to full check");
                let store = Arc::clone(&self.store);
                let full_item = item.clone();
                call_with_timeout("full-check", self.timing.full_check_timeout(), move || {
                    store.last_changed(&full_item, None)
                })?
            }
        };
        match answer {
            Ok(changed) => Some(changed),
            Err(e) => {
                warn!(%item, error = %e, "could not determine last change of destination");
                None
            }
        }
    }

    /// Drive the monitor on a background thread, ticking every
    /// `check_interval`.
    ///
    /// The returned handle must be stopped before the caller proceeds
    /// past the copy step; dropping it also stops the thread.
    pub fn spawn(mut self, item: StoreItem) -> MonitorHandle {
        self.start(item, SystemTime::now());
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let interval = self.timing.check_interval;
        let thread = thread::Builder::new()
            .name("activity-monitor".to_string())
            .spawn(move || {
                while !stop_flag.load(Ordering::Relaxed) {
                    sleep_interruptibly(interval, &stop_flag);
                    if stop_flag.load(Ordering::Relaxed) {
                        break;
                    }
                    self.tick(SystemTime::now());
                    if self.state == MonitorState::Stopped {
                        break;
                    }
                }
            })
            .ok();
        MonitorHandle { stop, thread }
    }
}

fn sleep_interruptibly(total: Duration, stop: &AtomicBool) {
    let mut remaining = total;
    while !remaining.is_zero() && !stop.load(Ordering::Relaxed) {
        let slice = remaining.min(SLEEP_SLICE);
        thread::sleep(slice);
        remaining -= slice;
    }
}

/// Handle to a monitor running on its own thread.
pub struct MonitorHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Stop the monitor and wait for its thread to finish.
    pub fn stop(mut self) {
        self.stop_inner();
    }

    fn stop_inner(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.stop_inner();
    }
}
