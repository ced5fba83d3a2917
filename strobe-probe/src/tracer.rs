//! Producer bridge: stamps events and pushes them into the channel
//!
//! `record` is called from the host runtime's hooks on every call and return,
//! so the common path is one clock read, one uncontended lock and one ring
//! push. When the ring is full the producer spins until the viewer drains
//! it; if the viewer has died the sink is dropped for good and every later
//! record is discarded.

use log::{info, warn};
use parking_lot::Mutex;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use strobe_common::{channel, EventKind, RingWriter};

use crate::config::TracerConfig;
use crate::epoch::Epoch;
use crate::error::ProbeError;
use crate::process::{spawn_consumer, ConsumerLiveness, ConsumerProcess};
use crate::registry::ThreadRegistry;

struct Sink<L> {
    writer: RingWriter,
    consumer: L,
}

/// Counters describing what a [`Tracer`] did so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TracerStats {
    /// Events pushed into the ring
    pub recorded: u64,
    /// Events discarded because the viewer was gone
    pub dropped: u64,
    /// Failed pushes while waiting for the viewer to make room
    pub backpressure_spins: u64,
}

pub struct Tracer<K, L = ConsumerProcess> {
    epoch: Epoch,
    sink: Mutex<Option<Sink<L>>>,
    threads: ThreadRegistry<K>,
    recorded: AtomicU64,
    dropped: AtomicU64,
    backpressure_spins: AtomicU64,
}

impl<K: Eq + Hash + Clone> Tracer<K, ConsumerProcess> {
    /// Create the channel, launch the viewer on it and register `initiating` as thread 0
    ///
    /// # Errors
    /// Any failure aborts setup. A channel created before a failed spawn is
    /// unlinked again when its writer is dropped.
    pub fn start(config: &TracerConfig, initiating: K) -> Result<Self, ProbeError> {
        let viewer = config.viewer()?;
        let (writer, name) = channel::create()?;
        let consumer = spawn_consumer(viewer, &name)?;
        info!("Tracing to channel {name} (viewer pid {})", consumer.id());
        Ok(Self::with_sink(writer, consumer, initiating))
    }
}

impl<K: Eq + Hash + Clone, L: ConsumerLiveness> Tracer<K, L> {
    /// Tracer over an already connected writer and consumer
    pub fn with_sink(writer: RingWriter, consumer: L, initiating: K) -> Self {
        Self {
            epoch: Epoch::new(),
            sink: Mutex::new(Some(Sink { writer, consumer })),
            threads: ThreadRegistry::new(initiating),
            recorded: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            backpressure_spins: AtomicU64::new(0),
        }
    }

    /// Stamp and push one event, waiting while the viewer catches up
    ///
    /// Never fails from the host's point of view. Once the viewer is found
    /// dead the event and all later ones are dropped.
    pub fn record(&self, kind: EventKind, payload: u64) {
        let mut guard = self.sink.lock();
        let Some(sink) = guard.as_mut() else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };

        // Stamped under the lock so ring order matches timestamp order
        let event = self.epoch.event(kind, payload);
        while !sink.writer.push(event) {
            if !sink.consumer.is_alive() {
                warn!(
                    "Viewer is gone, tracing disabled ({} events recorded)",
                    self.recorded.load(Ordering::Relaxed)
                );
                *guard = None;
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
            self.backpressure_spins.fetch_add(1, Ordering::Relaxed);
            std::hint::spin_loop();
        }
        self.recorded.fetch_add(1, Ordering::Relaxed);
    }

    /// Small sequential id for a host thread identity
    pub fn get_thread_id(&self, identity: &K) -> u32 {
        self.threads.get_thread_id(identity)
    }

    pub(crate) fn release_thread(&self, identity: &K) {
        self.threads.release(identity);
    }

    /// `false` once the viewer was found dead
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.sink.lock().is_some()
    }

    #[must_use]
    pub fn stats(&self) -> TracerStats {
        TracerStats {
            recorded: self.recorded.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            backpressure_spins: self.backpressure_spins.load(Ordering::Relaxed),
        }
    }

    #[must_use]
    pub fn epoch(&self) -> &Epoch {
        &self.epoch
    }
}

impl<K, L> Drop for Tracer<K, L> {
    fn drop(&mut self) {
        info!(
            "Tracer stopped: {} recorded, {} dropped, {} backpressure spins",
            self.recorded.get_mut(),
            self.dropped.get_mut(),
            self.backpressure_spins.get_mut()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;
    use strobe_common::{ring, TraceEvent, CAPACITY};

    /// Liveness controlled by the test
    struct FakeConsumer(Arc<AtomicBool>);

    impl ConsumerLiveness for FakeConsumer {
        fn is_alive(&mut self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn tracer() -> (Tracer<u64, FakeConsumer>, ring::RingReader, Arc<AtomicBool>) {
        let (writer, reader) = ring::local();
        let alive = Arc::new(AtomicBool::new(true));
        let tracer = Tracer::with_sink(writer, FakeConsumer(Arc::clone(&alive)), 0);
        (tracer, reader, alive)
    }

    #[test]
    fn test_record_pushes_stamped_events() {
        let (tracer, mut reader, _alive) = tracer();
        tracer.record(EventKind::Call, 42);
        tracer.record(EventKind::Return, 42);

        let first = reader.pop().expect("call recorded");
        assert_eq!(first.kind(), Ok(EventKind::Call));
        assert_eq!(first.timestamp(), 0);
        assert_eq!(first.payload(), 42);

        let second = reader.pop().expect("return recorded");
        assert_eq!(second.kind(), Ok(EventKind::Return));
        assert!(second.timestamp() >= first.timestamp());
        assert_eq!(tracer.stats().recorded, 2);
    }

    #[test]
    fn test_dead_consumer_disables_tracing() {
        let (tracer, mut reader, alive) = tracer();
        for i in 0..CAPACITY as u64 {
            tracer.record(EventKind::Call, i);
        }
        assert!(tracer.is_recording());

        alive.store(false, Ordering::SeqCst);
        for i in 0..1_000 {
            tracer.record(EventKind::Return, i);
        }
        assert!(!tracer.is_recording());

        let stats = tracer.stats();
        assert_eq!(stats.recorded, CAPACITY as u64);
        assert_eq!(stats.dropped, 1_000);

        // Only the events recorded before death are in the ring
        let mut out = vec![TraceEvent::default(); CAPACITY + 1];
        assert_eq!(reader.read_batch(&mut out), CAPACITY);
        assert!(out[..CAPACITY].iter().all(|e| e.kind() == Ok(EventKind::Call)));
    }

    #[test]
    fn test_full_ring_waits_for_live_consumer() {
        const EXTRA: u64 = 5_000;
        let (tracer, mut reader, _alive) = tracer();
        let tracer = Arc::new(tracer);

        let producer = {
            let tracer = Arc::clone(&tracer);
            thread::spawn(move || {
                for i in 0..CAPACITY as u64 + EXTRA {
                    tracer.record(EventKind::Call, i);
                }
            })
        };

        let mut expected = 0;
        while expected < CAPACITY as u64 + EXTRA {
            match reader.pop() {
                Some(event) => {
                    assert_eq!(event.payload(), expected);
                    expected += 1;
                }
                None => thread::yield_now(),
            }
        }
        producer.join().expect("producer panicked");

        assert!(tracer.is_recording());
        assert_eq!(tracer.stats().recorded, CAPACITY as u64 + EXTRA);
        assert_eq!(tracer.stats().dropped, 0);
    }

    #[test]
    fn test_thread_ids_stable() {
        let (tracer, _reader, _alive) = tracer();
        assert_eq!(tracer.get_thread_id(&0), 0);
        assert_eq!(tracer.get_thread_id(&77), 1);
        assert_eq!(tracer.get_thread_id(&77), 1);
        assert_eq!(tracer.get_thread_id(&78), 2);
    }
}
