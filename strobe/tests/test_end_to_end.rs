//! Producer to timeline over a real shared-memory channel
//!
//! The tracer writes through `channel::create`, the viewer side reads
//! through `channel::open`, exactly as the two processes would.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strobe::domain::{MethodId, ThreadId};
use strobe::ingest::{self, Ingest};
use strobe::render::{CallBox, IdleBox, IDLE_SUSPENDED, OPEN_END};
use strobe_common::{channel, ThreadState};
use strobe_probe::{ConsumerLiveness, RuntimeHooks, Tracer};

struct AlwaysAlive;

impl ConsumerLiveness for AlwaysAlive {
    fn is_alive(&mut self) -> bool {
        true
    }
}

fn tracer_and_ingest() -> (Tracer<&'static str, AlwaysAlive>, Ingest) {
    let (writer, name) = channel::create().expect("Failed to create channel");
    let reader = channel::open(&name).expect("Failed to open channel");
    let tracer = Tracer::with_sink(writer, AlwaysAlive, "main");
    (tracer, Ingest::new(reader, Duration::from_secs(30)))
}

#[test]
fn test_two_threads_reconstruct() {
    let (tracer, mut ingest) = tracer_and_ingest();

    // main runs 10 { 11 } then enters 12 and yields with two frames open
    tracer.on_thread_transition(&"main", ThreadState::Resumed);
    tracer.on_call(10);
    tracer.on_call(11);
    tracer.on_return(11);
    tracer.on_call(12);
    tracer.on_thread_transition(&"main", ThreadState::Suspended);

    tracer.on_thread_transition(&"worker", ThreadState::Resumed);
    tracer.on_call(20);
    tracer.on_gc_start();
    tracer.on_gc_end();
    tracer.on_return(20);
    tracer.on_thread_transition(&"worker", ThreadState::Exited);

    assert_eq!(ingest.poll(), 14);
    let stats = ingest.stats();
    assert_eq!(stats.events, 14);
    assert_eq!(stats.ignored, 0);
    assert_eq!(stats.unknown_kinds, 0);

    let snapshot = ingest.snapshot();
    assert_eq!(snapshot.thread_count(), 2);
    assert_eq!(snapshot.max_depth, 2);
    assert_eq!(snapshot.open_count(), 2);
    assert_eq!(snapshot.gc.len(), 1);
    assert!(snapshot.gc[0].end.is_some());

    let main = snapshot.lane(ThreadId(0)).expect("main lane");
    assert_eq!(main.current_state(), Some(ThreadState::Suspended));
    let methods: Vec<_> = main.intervals.iter().map(|i| (i.method_id, i.depth, i.is_open())).collect();
    assert_eq!(
        methods,
        vec![(MethodId(11), 1, false), (MethodId(10), 0, true), (MethodId(12), 1, true)]
    );
    let open = &main.intervals[1];

    let worker = snapshot.lane(ThreadId(1)).expect("worker lane");
    assert_eq!(worker.current_state(), Some(ThreadState::Exited));
    assert_eq!(worker.intervals.len(), 1);
    assert_eq!(worker.intervals[0].method_id, MethodId(20));

    let call_box = CallBox::from_interval(open);
    assert_eq!(call_box.end_time, OPEN_END);

    // main is still suspended, so its lane carries one open idle box
    let idle: Vec<IdleBox> = main.idle_spans().iter().map(IdleBox::from_span).collect();
    assert_eq!(idle.len(), 1);
    assert_eq!(idle[0].state, IDLE_SUSPENDED);
    assert_eq!(idle[0].end_time, OPEN_END);
    assert!(worker.idle_spans().is_empty());
}

#[test]
fn test_nested_intervals_are_well_formed() {
    let (tracer, mut ingest) = tracer_and_ingest();

    tracer.on_thread_transition(&"main", ThreadState::Resumed);
    for depth in 0..32 {
        tracer.on_call(depth);
    }
    for depth in (0..32).rev() {
        tracer.on_return(depth);
    }

    ingest.poll();
    let intervals = ingest.timeline().intervals(ThreadId(0));
    assert_eq!(intervals.len(), 32);
    assert_eq!(ingest.timeline().max_depth(), 32);

    for interval in &intervals {
        let end = interval.end.expect("every frame returned");
        assert!(interval.start <= end);
        assert_eq!(u64::from(interval.depth), interval.method_id.0);
    }
    let outer = intervals.iter().find(|i| i.depth == 0).expect("outer frame");
    for inner in intervals.iter().filter(|i| i.depth > 0) {
        assert!(inner.start >= outer.start);
        assert!(inner.end <= outer.end);
    }
}

#[test]
fn test_spawned_ingest_sees_live_tracer() {
    let (tracer, ingest) = tracer_and_ingest();
    let (tx, rx) = crossbeam_channel::bounded(1);
    let stop = Arc::new(AtomicBool::new(false));
    let handle = ingest::spawn(ingest, tx, Arc::clone(&stop)).expect("spawn ingest");

    tracer.on_thread_transition(&"main", ThreadState::Resumed);
    tracer.on_call(1);

    let snapshot = loop {
        let snapshot = rx.recv_timeout(Duration::from_secs(5)).expect("snapshot within 5s");
        if snapshot.interval_count() > 0 {
            break snapshot;
        }
    };
    assert_eq!(snapshot.open_count(), 1);

    stop.store(true, Ordering::Relaxed);
    let stats = handle.join().expect("ingest thread");
    assert_eq!(stats.events, 2);
    assert!(stats.snapshots >= 1);
}
