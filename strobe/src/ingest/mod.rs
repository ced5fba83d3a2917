//! # Event ingest
//!
//! Sole reader of the ring. Drains it in batches, folds the records into the
//! [`Timeline`] and hands owned [`TimelineSnapshot`]s to the renderer.
//!
//! ## Hand-off
//!
//! Snapshots travel through a `crossbeam_channel::bounded(1)`. While the
//! renderer has not taken the previous snapshot no new one is built, so a
//! slow frame costs at most one stale snapshot and never blocks ingest.

pub mod stats;

use crossbeam_channel::{Sender, TrySendError};
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use strobe_common::{RingReader, TraceEvent, UnknownKind, CAPACITY};

use crate::timeline::{Applied, Timeline, TimelineSnapshot};
pub use stats::{display_statistics, IngestStats};

/// Sleep between polls of an empty ring
pub const IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// Batches drained per `poll` before returning to the caller
const MAX_BATCHES_PER_POLL: usize = 16;

pub struct Ingest {
    reader: RingReader,
    timeline: Timeline,
    batch: Vec<TraceEvent>,
    stats: IngestStats,
}

impl Ingest {
    #[must_use]
    pub fn new(reader: RingReader, retention: Duration) -> Self {
        Self {
            reader,
            timeline: Timeline::new(retention),
            batch: vec![TraceEvent::default(); CAPACITY],
            stats: IngestStats::default(),
        }
    }

    /// Drain what is available and apply it; returns the number of records read
    ///
    /// Never blocks. Stops after a bounded number of batches so a producer
    /// that refills the ring as fast as it is drained cannot starve the
    /// snapshot hand-off.
    pub fn poll(&mut self) -> usize {
        let mut total = 0;
        for _ in 0..MAX_BATCHES_PER_POLL {
            let n = self.reader.read_batch(&mut self.batch);
            if n == 0 {
                break;
            }
            self.stats.batches += 1;
            self.stats.events += n as u64;
            total += n;

            for event in &self.batch[..n] {
                match self.timeline.apply(event) {
                    Ok(Applied::Recorded) => {}
                    Ok(Applied::Ignored) => self.stats.ignored += 1,
                    Err(UnknownKind(tag)) => {
                        if self.stats.unknown_kinds == 0 {
                            warn!("Skipping record with unknown kind tag {tag}");
                        }
                        self.stats.unknown_kinds += 1;
                    }
                }
            }
        }

        if total > 0 {
            let pruned = self.timeline.prune();
            if pruned > 0 {
                debug!("Pruned {pruned} expired timeline entries");
            }
            self.stats.pruned += pruned as u64;
        }
        total
    }

    #[must_use]
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    #[must_use]
    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// Build a snapshot and count it as handed off
    pub fn snapshot(&mut self) -> TimelineSnapshot {
        self.stats.snapshots += 1;
        self.timeline.snapshot()
    }
}

/// Run `ingest` on a dedicated thread until `stop` is set or the receiver is gone
///
/// The thread returns its final counters.
///
/// # Errors
/// Returns the OS error if the thread cannot be spawned.
pub fn spawn(
    mut ingest: Ingest,
    snapshots: Sender<TimelineSnapshot>,
    stop: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<IngestStats>> {
    thread::Builder::new().name("ingest".to_owned()).spawn(move || {
        let mut dirty = false;
        while !stop.load(Ordering::Relaxed) {
            let read = ingest.poll();
            dirty |= read > 0;

            if dirty && !snapshots.is_full() {
                match snapshots.try_send(ingest.snapshot()) {
                    Ok(()) => dirty = false,
                    Err(TrySendError::Full(_)) => {}
                    Err(TrySendError::Disconnected(_)) => break,
                }
            }

            if read == 0 {
                thread::sleep(IDLE_BACKOFF);
            }
        }
        debug!("Ingest thread stopping");
        ingest.stats()
    })
}
