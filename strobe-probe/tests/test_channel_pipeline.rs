use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use strobe_common::{channel, TraceEvent, CAPACITY};
use strobe_probe::{
    ConsumerLiveness, EventKind, ProbeError, RuntimeHooks, ThreadState, Tracer, TracerConfig,
};

struct AlwaysAlive;

impl ConsumerLiveness for AlwaysAlive {
    fn is_alive(&mut self) -> bool {
        true
    }
}

#[test]
fn test_events_cross_shared_memory() {
    let (writer, name) = channel::create().expect("Failed to create channel");
    let mut reader = channel::open(&name).expect("Failed to open channel");
    let tracer = Tracer::with_sink(writer, AlwaysAlive, 0u64);

    tracer.on_thread_transition(&0, ThreadState::Resumed);
    tracer.on_call(1);
    tracer.on_call(2);
    tracer.on_return(2);
    tracer.on_return(1);

    let mut out = vec![TraceEvent::default(); 16];
    let n = reader.read_batch(&mut out);
    assert_eq!(n, 5);

    let kinds: Vec<_> = out[..n].iter().map(|e| e.kind().expect("valid kind")).collect();
    assert_eq!(
        kinds,
        vec![EventKind::ThreadResume, EventKind::Call, EventKind::Call, EventKind::Return, EventKind::Return]
    );
    assert_eq!(out[0].timestamp(), 0);
    assert!(out[..n].windows(2).all(|w| w[0].timestamp() <= w[1].timestamp()));
}

#[test]
fn test_viewer_drains_across_threads() {
    const TOTAL: u64 = 200_000;
    let (writer, name) = channel::create().expect("Failed to create channel");
    let tracer = Arc::new(Tracer::with_sink(writer, AlwaysAlive, 0u64));

    let viewer = thread::spawn(move || {
        let mut reader = channel::open(&name).expect("Failed to open channel");
        let mut out = vec![TraceEvent::default(); 4096];
        let mut seen = 0u64;
        while seen < TOTAL {
            let n = reader.read_batch(&mut out);
            for event in &out[..n] {
                assert_eq!(event.payload(), seen);
                seen += 1;
            }
            if n == 0 {
                thread::sleep(Duration::from_micros(100));
            }
        }
        seen
    });

    for i in 0..TOTAL {
        tracer.on_call(i);
    }
    assert_eq!(viewer.join().expect("viewer panicked"), TOTAL);
    assert_eq!(tracer.stats().recorded, TOTAL);
    assert_eq!(tracer.stats().dropped, 0);
}

#[test]
fn test_late_viewer_reads_finished_trace() {
    let (writer, name) = channel::create().expect("Failed to create channel");
    let tracer = Tracer::with_sink(writer, AlwaysAlive, 0u64);
    tracer.on_thread_transition(&0, ThreadState::Resumed);
    tracer.on_call(7);
    tracer.on_return(7);
    drop(tracer);

    let mut reader = channel::open(&name).expect("channel outlives the tracer");
    let mut out = vec![TraceEvent::default(); 16];
    let n = reader.read_batch(&mut out);
    let kinds: Vec<_> = out[..n].iter().map(|e| e.kind().expect("valid kind")).collect();
    assert_eq!(kinds, vec![EventKind::ThreadResume, EventKind::Call, EventKind::Return]);
}

#[test]
fn test_start_without_viewer_fails() {
    let err = Tracer::start(&TracerConfig::new(), 0u64).err().expect("start should fail");
    assert!(matches!(err, ProbeError::MissingViewer(_)));
}

#[test]
fn test_start_with_bad_viewer_fails() {
    let config = TracerConfig::new().viewer_path("/nonexistent/strobe");
    let err = Tracer::start(&config, 0u64).err().expect("start should fail");
    assert!(matches!(err, ProbeError::SpawnFailed { .. }));
}

#[cfg(unix)]
#[test]
fn test_exited_viewer_disables_tracing() {
    // `true` ignores the channel name and exits without reading
    let config = TracerConfig::new().viewer_path("/bin/true");
    let tracer = Tracer::start(&config, 0u64).expect("Failed to start tracer");

    let deadline = Instant::now() + Duration::from_secs(30);
    let mut i = 0u64;
    while tracer.is_recording() {
        assert!(Instant::now() < deadline, "tracing was never disabled");
        tracer.on_call(i);
        i += 1;
    }

    let stats = tracer.stats();
    assert_eq!(stats.recorded, CAPACITY as u64);
    assert_eq!(stats.dropped, 1);

    for _ in 0..1_000 {
        tracer.on_return(0);
    }
    assert_eq!(tracer.stats().dropped, stats.dropped + 1_000);
}
