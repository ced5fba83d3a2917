//! Synthetic host runtime driving the tracer
//!
//! Several OS threads take turns holding a global "runtime lock", the way an
//! interpreter with a global lock schedules its threads. While holding it a
//! thread runs a small recursive workload, emitting calls and returns, and
//! now and then triggers a GC pause.
//!
//! Run with:
//!   STROBE_VIEWER=target/release/strobe cargo run -p strobe-probe --example synthetic_host

use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use strobe_probe::{RuntimeHooks, ThreadState, Tracer, TracerConfig};

const WORKERS: u64 = 4;
const RUN_FOR: Duration = Duration::from_secs(20);

type HostTracer = Tracer<u64>;

fn fib(tracer: &HostTracer, n: u64) -> u64 {
    // Method ids 100.. are fib at each argument so the viewer colours them apart
    tracer.on_call(100 + n);
    let result = if n < 2 { n } else { fib(tracer, n - 1) + fib(tracer, n - 2) };
    tracer.on_return(100 + n);
    result
}

fn worker(tracer: &HostTracer, runtime_lock: &Mutex<()>, identity: u64) {
    tracer.on_thread_transition(&identity, ThreadState::Started);
    let started = Instant::now();
    let mut round = 0u64;

    while started.elapsed() < RUN_FOR {
        tracer.on_thread_transition(&identity, ThreadState::Ready);
        let Ok(guard) = runtime_lock.lock() else { break };
        tracer.on_thread_transition(&identity, ThreadState::Resumed);

        tracer.on_call(1);
        fib(tracer, 12 + identity % 4);
        if round % 50 == 0 {
            tracer.on_gc_start();
            thread::sleep(Duration::from_millis(2));
            tracer.on_gc_end();
        }
        tracer.on_return(1);

        tracer.on_thread_transition(&identity, ThreadState::Suspended);
        drop(guard);
        round += 1;
        thread::sleep(Duration::from_micros(200));
    }

    tracer.on_thread_transition(&identity, ThreadState::Exited);
}

fn main() -> Result<()> {
    env_logger::init();

    let tracer = Arc::new(
        Tracer::start(&TracerConfig::from_env(), 0).context("Failed to start tracer")?,
    );
    let runtime_lock = Arc::new(Mutex::new(()));

    let handles: Vec<_> = (1..=WORKERS)
        .map(|identity| {
            let tracer = Arc::clone(&tracer);
            let runtime_lock = Arc::clone(&runtime_lock);
            thread::spawn(move || worker(&tracer, &runtime_lock, identity))
        })
        .collect();

    for handle in handles {
        handle.join().map_err(|_| anyhow::anyhow!("worker thread panicked"))?;
    }

    println!("{:?}", tracer.stats());
    Ok(())
}
