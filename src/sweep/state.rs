//! Live scan counters

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::types::ScanStats;

/// Aggregate report produced by one batch once every candidate in it is done
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub checked: u64,
    pub resolved: u64,
    pub found: u64,
    pub errors: u64,
    pub persist_failures: u64,
    pub cancelled: u64,
}

/// Process-wide counters for a scan session.
///
/// Batch totals are folded in by the coordinator only; the in-flight gauge is
/// moved by the batch units themselves.
#[derive(Debug)]
pub struct ScanState {
    total_space: u64,
    checked: AtomicU64,
    resolved: AtomicU64,
    found: AtomicU64,
    errors: AtomicU64,
    persist_failures: AtomicU64,
    batches_completed: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanSnapshot {
    pub total_space: u64,
    pub checked: u64,
    pub resolved: u64,
    pub found: u64,
    pub errors: u64,
    pub persist_failures: u64,
    pub batches_completed: u64,
    pub in_flight: usize,
    pub peak_in_flight: usize,
}

impl ScanState {
    /// Create a new scan state
    pub fn new(total_space: u64) -> Self {
        Self {
            total_space,
            checked: AtomicU64::new(0),
            resolved: AtomicU64::new(0),
            found: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            persist_failures: AtomicU64::new(0),
            batches_completed: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn total_space(&self) -> u64 {
        self.total_space
    }

    pub fn checked(&self) -> u64 {
        self.checked.load(Ordering::Acquire)
    }

    pub fn found(&self) -> u64 {
        self.found.load(Ordering::Acquire)
    }

    /// Fold a completed batch into the totals and return the new stats
    pub fn record_batch(&self, report: &BatchReport) -> ScanStats {
        let checked = self.checked.fetch_add(report.checked, Ordering::AcqRel) + report.checked;
        self.resolved.fetch_add(report.resolved, Ordering::Relaxed);
        let found = self.found.fetch_add(report.found, Ordering::AcqRel) + report.found;
        self.errors.fetch_add(report.errors, Ordering::Relaxed);
        self.persist_failures
            .fetch_add(report.persist_failures, Ordering::Relaxed);
        self.batches_completed.fetch_add(1, Ordering::Relaxed);

        ScanStats {
            checked,
            total: self.total_space,
            found,
        }
    }

    /// Mark a batch unit as started
    pub fn enter_unit(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::AcqRel);
    }

    /// Mark a batch unit as finished
    pub fn leave_unit(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn stats(&self) -> ScanStats {
        ScanStats {
            checked: self.checked(),
            total: self.total_space,
            found: self.found(),
        }
    }

    pub fn snapshot(&self) -> ScanSnapshot {
        ScanSnapshot {
            total_space: self.total_space,
            checked: self.checked(),
            resolved: self.resolved.load(Ordering::Relaxed),
            found: self.found(),
            errors: self.errors.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            batches_completed: self.batches_completed.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Acquire),
            peak_in_flight: self.peak_in_flight.load(Ordering::Acquire),
        }
    }

    /// Get progress percentage
    pub fn progress_percent(&self) -> f64 {
        self.stats().percent()
    }
}

/// Guard that keeps the in-flight gauge accurate even if a unit panics
pub(crate) struct UnitGuard<'a> {
    state: &'a ScanState,
}

impl<'a> UnitGuard<'a> {
    pub(crate) fn enter(state: &'a ScanState) -> Self {
        state.enter_unit();
        Self { state }
    }
}

impl Drop for UnitGuard<'_> {
    fn drop(&mut self) {
        self.state.leave_unit();
    }
}
