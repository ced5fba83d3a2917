//! Ingest counters and their periodic display

use log::info;

/// What the ingest loop has consumed so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Records read from the ring
    pub events: u64,
    /// Non-empty `read_batch` calls
    pub batches: u64,
    /// Records with an unassigned kind tag
    pub unknown_kinds: u64,
    /// Records that were malformed in context (unmatched RETURN or GC_END)
    pub ignored: u64,
    /// Intervals, GC spans and state events dropped by retention
    pub pruned: u64,
    /// Snapshots handed to the renderer
    pub snapshots: u64,
}

impl IngestStats {
    /// Average records per non-empty batch
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_batch(&self) -> f64 {
        if self.batches == 0 {
            0.0
        } else {
            self.events as f64 / self.batches as f64
        }
    }
}

/// Log a one-line summary of the counters
pub fn display_statistics(stats: &IngestStats) {
    info!(
        "stats: events={} batches={} (mean {:.1}) unknown={} ignored={} pruned={} snapshots={}",
        stats.events,
        stats.batches,
        stats.mean_batch(),
        stats.unknown_kinds,
        stats.ignored,
        stats.pruned,
        stats.snapshots
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_batch() {
        assert!(IngestStats::default().mean_batch().abs() < f64::EPSILON);
        let stats = IngestStats { events: 300, batches: 4, ..Default::default() };
        assert!((stats.mean_batch() - 75.0).abs() < f64::EPSILON);
    }
}
