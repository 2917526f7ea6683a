//! Bounded-latency calls against possibly hanging filesystems.
//!
//! A last-changed query against an NFS mount whose server went away can
//! block for minutes. The activity monitor must never be wedged by its
//! own observation, so timing queries run on a short-lived worker thread
//! and the caller waits with a timeout. A worker that misses its
//! deadline is abandoned; it finishes (or hangs) in the background and
//! its answer is discarded.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tracing::trace;

/// Run `f` on a worker thread, waiting at most `timeout` for the answer.
///
/// Returns `None` if the deadline passed. The worker is detached, not
/// cancelled; `f` must not hold resources the caller needs back.
pub(crate) fn call_with_timeout<T, F>(description: &str, timeout: Duration, f: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let builder = thread::Builder::new().name(format!("bounded-{description}"));
    let spawned = builder.spawn(move || {
        // The receiver may be gone already if we lost the race.
        let _ = tx.send(f());
    });
    if spawned.is_err() {
        return None;
    }
    match rx.recv_timeout(timeout) {
        Ok(value) => Some(value),
        Err(_) => {
            trace!(description, ?timeout, "bounded call missed its deadline");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_call_returns_value() {
        let result = call_with_timeout("fast", Duration::from_secs(5), || 42);
        assert_eq!(result, Some(42));
    }

    #[test]
    fn test_slow_call_times_out() {
        let result = call_with_timeout("slow", Duration::from_millis(50), || {
            thread::sleep(Duration::from_secs(10));
            42
        });
        assert_eq!(result, None);
    }
}
