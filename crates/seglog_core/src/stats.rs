//! Writer statistics.
//!
//! Counters are shared between the caller thread and the background tasks,
//! so they are atomics and can be read while writes are in progress.
//!
//! ```rust,ignore
//! let stats = writer.stats();
//! println!("records: {}", stats.records_written);
//! println!("segments: {}", stats.segments_flushed);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Live writer counters.
#[derive(Debug, Default)]
pub struct WriterStats {
    /// Records accepted by `write`.
    records_written: AtomicU64,
    /// Record bytes accepted, terminators included.
    bytes_buffered: AtomicU64,
    /// Memtables handed to the flush pipeline.
    memtables_submitted: AtomicU64,
    /// Segments written and sealed.
    segments_flushed: AtomicU64,
    /// Bytes written to segment files.
    bytes_flushed: AtomicU64,
    /// Segments recorded in the index.
    segments_indexed: AtomicU64,
    /// Segments that exceeded their size budget.
    budget_overruns: AtomicU64,
    /// Background failures.
    errors: AtomicU64,
}

impl WriterStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_write(&self, footprint: u64) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_buffered.fetch_add(footprint, Ordering::Relaxed);
    }

    pub(crate) fn record_submit(&self) {
        self.memtables_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self, bytes: u64) {
        self.segments_flushed.fetch_add(1, Ordering::Relaxed);
        self.bytes_flushed.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_index(&self) {
        self.segments_indexed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_budget_overrun(&self) {
        self.budget_overruns.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of records accepted.
    pub fn records_written(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }

    /// Returns the number of segments written.
    pub fn segments_flushed(&self) -> u64 {
        self.segments_flushed.load(Ordering::Relaxed)
    }

    /// Returns the number of segments indexed.
    pub fn segments_indexed(&self) -> u64 {
        self.segments_indexed.load(Ordering::Relaxed)
    }

    /// Returns the number of background failures.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            records_written: self.records_written(),
            bytes_buffered: self.bytes_buffered.load(Ordering::Relaxed),
            memtables_submitted: self.memtables_submitted.load(Ordering::Relaxed),
            segments_flushed: self.segments_flushed(),
            bytes_flushed: self.bytes_flushed.load(Ordering::Relaxed),
            segments_indexed: self.segments_indexed(),
            budget_overruns: self.budget_overruns.load(Ordering::Relaxed),
            errors: self.errors(),
        }
    }
}

/// A point-in-time copy of [`WriterStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize)]
pub struct StatsSnapshot {
    /// Records accepted by `write`.
    pub records_written: u64,
    /// Record bytes accepted, terminators included.
    pub bytes_buffered: u64,
    /// Memtables handed to the flush pipeline.
    pub memtables_submitted: u64,
    /// Segments written and sealed.
    pub segments_flushed: u64,
    /// Bytes written to segment files.
    pub bytes_flushed: u64,
    /// Segments recorded in the index.
    pub segments_indexed: u64,
    /// Segments that exceeded their size budget.
    pub budget_overruns: u64,
    /// Background failures.
    pub errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        assert_eq!(WriterStats::new().snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn snapshot_reflects_counters() {
        let stats = WriterStats::new();
        stats.record_write(10);
        stats.record_write(5);
        stats.record_submit();
        stats.record_flush(15);
        stats.record_index();
        stats.record_budget_overrun();

        let snap = stats.snapshot();
        assert_eq!(snap.records_written, 2);
        assert_eq!(snap.bytes_buffered, 15);
        assert_eq!(snap.memtables_submitted, 1);
        assert_eq!(snap.segments_flushed, 1);
        assert_eq!(snap.bytes_flushed, 15);
        assert_eq!(snap.segments_indexed, 1);
        assert_eq!(snap.budget_overruns, 1);
        assert_eq!(snap.errors, 0);
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(WriterStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..100 {
                        s.record_flush(2);
                        s.record_index();
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(stats.segments_flushed(), 800);
        assert_eq!(stats.segments_indexed(), 800);
    }
}
