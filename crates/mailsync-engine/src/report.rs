//! Cycle outcome accounting.
//!
//! A thread-safe tracker accumulates counters while worker tasks run, then
//! freezes into a serializable report once the cycle completes.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

/// What happened to one entity during a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityOutcome {
    /// At least one store had no record and one was created.
    Created,
    /// An existing record's active flag was switched on.
    Activated,
    /// Only the display name changed.
    Renamed,
    /// Both stores already matched the source.
    Unchanged,
    /// A store call failed; the entity retries next cycle.
    Failed,
}

/// Summary of one completed synchronization cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleReport {
    /// Well-formed entities in the snapshot after deduplication.
    pub entities_total: u32,
    /// Source rows dropped for missing required attributes.
    pub rows_skipped: u32,
    /// Entities that got a record created in at least one store.
    pub created: u32,
    /// Entities whose active flag was switched on in a store.
    pub activated: u32,
    /// Entities whose display name was updated.
    pub renamed: u32,
    /// Entities that needed no mutation anywhere.
    pub unchanged: u32,
    /// Entities with at least one failed store call.
    pub errored: u32,
    /// Addresses deactivated by the sweep.
    pub swept: u32,
    /// Sweep candidates whose remote deactivation failed.
    pub sweep_errors: u32,
    /// Wall-clock duration of the cycle in milliseconds.
    pub duration_ms: u64,
}

impl CycleReport {
    /// Whether every attempted mutation succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errored == 0 && self.sweep_errors == 0
    }
}

/// Accumulates counters across concurrent worker tasks.
pub struct CycleTracker {
    entities_total: AtomicU32,
    rows_skipped: AtomicU32,
    created: AtomicU32,
    activated: AtomicU32,
    renamed: AtomicU32,
    unchanged: AtomicU32,
    errored: AtomicU32,
    swept: AtomicU32,
    sweep_errors: AtomicU32,
    started: Instant,
}

impl CycleTracker {
    /// Start tracking a cycle over the given snapshot size.
    #[must_use]
    pub fn new(entities_total: u32, rows_skipped: u32) -> Self {
        Self {
            entities_total: AtomicU32::new(entities_total),
            rows_skipped: AtomicU32::new(rows_skipped),
            created: AtomicU32::new(0),
            activated: AtomicU32::new(0),
            renamed: AtomicU32::new(0),
            unchanged: AtomicU32::new(0),
            errored: AtomicU32::new(0),
            swept: AtomicU32::new(0),
            sweep_errors: AtomicU32::new(0),
            started: Instant::now(),
        }
    }

    /// Record a per-entity outcome.
    pub fn record(&self, outcome: EntityOutcome) {
        let counter = match outcome {
            EntityOutcome::Created => &self.created,
            EntityOutcome::Activated => &self.activated,
            EntityOutcome::Renamed => &self.renamed,
            EntityOutcome::Unchanged => &self.unchanged,
            EntityOutcome::Failed => &self.errored,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a swept (deactivated) address.
    pub fn record_swept(&self) {
        self.swept.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a sweep candidate whose remote deactivation failed.
    pub fn record_sweep_error(&self) {
        self.sweep_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Freeze the counters into a report.
    #[must_use]
    pub fn finish(&self) -> CycleReport {
        CycleReport {
            entities_total: self.entities_total.load(Ordering::Relaxed),
            rows_skipped: self.rows_skipped.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            activated: self.activated.load(Ordering::Relaxed),
            renamed: self.renamed.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
            errored: self.errored.load(Ordering::Relaxed),
            swept: self.swept.load(Ordering::Relaxed),
            sweep_errors: self.sweep_errors.load(Ordering::Relaxed),
            duration_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_accumulates_outcomes() {
        let tracker = CycleTracker::new(5, 2);
        tracker.record(EntityOutcome::Created);
        tracker.record(EntityOutcome::Created);
        tracker.record(EntityOutcome::Activated);
        tracker.record(EntityOutcome::Unchanged);
        tracker.record(EntityOutcome::Failed);
        tracker.record_swept();
        tracker.record_sweep_error();

        let report = tracker.finish();
        assert_eq!(report.entities_total, 5);
        assert_eq!(report.rows_skipped, 2);
        assert_eq!(report.created, 2);
        assert_eq!(report.activated, 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.errored, 1);
        assert_eq!(report.swept, 1);
        assert_eq!(report.sweep_errors, 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn clean_report_has_no_errors() {
        let tracker = CycleTracker::new(1, 0);
        tracker.record(EntityOutcome::Unchanged);
        assert!(tracker.finish().is_clean());
    }

    #[test]
    fn report_serializes() {
        let report = CycleTracker::new(3, 1).finish();
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"entities_total\":3"));
    }
}
