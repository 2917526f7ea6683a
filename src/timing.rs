//! Timing configuration for supervision and retry.
//!
//! This module provides [`TimingParameters`], the immutable bundle of
//! intervals and bounds shared by the activity monitor, the retry
//! wrapper, and the mover.
//!
//! # Example
//!
//! ```
//! use pathmover::TimingParameters;
//! use std::time::Duration;
//!
//! let timing = TimingParameters::default()
//!     .with_check_interval(Duration::from_secs(30))
//!     .with_max_retries(3);
//! timing.validate().unwrap();
//! ```

use crate::error::{Error, Result};
use std::time::Duration;

/// Timing parameters for copy supervision and retrying.
///
/// Use [`Default::default()`] to get the standard values, then customize
/// with the builder methods.
///
/// # Default Values
///
/// | Field | Default | Description |
/// |-------|---------|-------------|
/// | `check_interval` | 60 s | Activity monitor poll interval |
/// | `inactivity_period` | 600 s | Max tolerated time without progress |
/// | `max_retries` | 10 | Retries after the initial attempt |
/// | `interval_to_wait_after_failure` | 1800 s | Sleep before retrying a failed copy |
/// | `quick_check_fraction` | 0.2 | Fraction of `check_interval` budgeted for the quick last-changed probe |
///
/// # Invariants
///
/// Checked by [`validate`](TimingParameters::validate):
///
/// - `inactivity_period >= 2 * quick_check_budget`
/// - `quick_check_fraction` in `(0.0, 1.0]`
/// - `check_interval` non-zero
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimingParameters {
    /// Interval between activity checks on the destination.
    pub check_interval: Duration,

    /// Maximum tolerated duration without observed progress before a
    /// transfer is declared stalled and its process terminated.
    pub inactivity_period: Duration,

    /// Number of retries of a failed operation (the initial attempt is
    /// not counted, so `max_retries = 0` means exactly one attempt).
    pub max_retries: u32,

    /// Time to wait after a retriable failure before trying again.
    pub interval_to_wait_after_failure: Duration,

    /// Fraction of `check_interval` allowed for the bounded quick
    /// last-changed probe before falling back to a full check.
    ///
    /// The 0.2 default is empirical; it is exposed as a tunable rather
    /// than hard-coded.
    pub quick_check_fraction: f64,
}

impl Default for TimingParameters {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            inactivity_period: Duration::from_secs(600),
            max_retries: 10,
            interval_to_wait_after_failure: Duration::from_secs(1800),
            quick_check_fraction: 0.2,
        }
    }
}

impl TimingParameters {
    /// Timing suitable for unit tests: millisecond-scale intervals, no
    /// post-failure wait.
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            check_interval: Duration::from_millis(10),
            inactivity_period: Duration::from_millis(100),
            max_retries: 2,
            interval_to_wait_after_failure: Duration::ZERO,
            quick_check_fraction: 0.2,
        }
    }

    /// Set the activity check interval.
    #[must_use]
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Set the inactivity period after which a transfer counts as stalled.
    #[must_use]
    pub fn with_inactivity_period(mut self, period: Duration) -> Self {
        self.inactivity_period = period;
        self
    }

    /// Set the number of retries after the initial attempt.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the wait between a failure and the next attempt.
    #[must_use]
    pub fn with_interval_to_wait_after_failure(mut self, interval: Duration) -> Self {
        self.interval_to_wait_after_failure = interval;
        self
    }

    /// Set the quick-check budget as a fraction of the check interval.
    #[must_use]
    pub fn with_quick_check_fraction(mut self, fraction: f64) -> Self {
        self.quick_check_fraction = fraction;
        self
    }

    /// The wall-clock budget for the bounded quick last-changed probe.
    pub fn quick_check_budget(&self) -> Duration {
        self.check_interval.mul_f64(self.quick_check_fraction)
    }

    /// Timeout for the unbounded fallback last-changed check.
    ///
    /// Capped at the inactivity period: a check that takes longer than
    /// that could never exonerate the transfer anyway.
    pub fn full_check_timeout(&self) -> Duration {
        (self.check_interval * 3).min(self.inactivity_period)
    }

    /// Check the invariants, returning a configuration error on violation.
    pub fn validate(&self) -> Result<()> {
        if self.check_interval.is_zero() {
            return Err(Error::InvalidTimingParameters(
                "check interval must be non-zero".to_string(),
            ));
        }
        if !(self.quick_check_fraction > 0.0 && self.quick_check_fraction <= 1.0) {
            return Err(Error::InvalidTimingParameters(format!(
                "quick check fraction must be in (0, 1], got {}",
                self.quick_check_fraction
            )));
        }
        if self.inactivity_period < self.quick_check_budget() * 2 {
            return Err(Error::InvalidTimingParameters(format!(
                "inactivity period ({:?}) must be at least twice the quick check budget ({:?})",
                self.inactivity_period,
                self.quick_check_budget()
            )));
        }
        Ok(())
    }
}
