//! # strobe - Main Entry Point
//!
//! Launched by the traced process as `strobe <CHANNEL>`. Supports two modes:
//! - **Window** (default): live 3D timeline
//! - **Headless** (`--headless`): drain the channel and log statistics

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::bounded;
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use strobe_common::channel;

use strobe::cli::Args;
use strobe::ingest::{self, display_statistics, Ingest, IDLE_BACKOFF};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

const STATS_INTERVAL: Duration = Duration::from_secs(10);

fn main() {
    env_logger::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // --help and --version also arrive here
            let code = if e.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    std::process::exit(match run(&args) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    });
}

fn run(args: &Args) -> Result<()> {
    let reader = channel::open(&args.channel)
        .with_context(|| format!("Failed to attach to channel {}", args.channel))?;
    info!("Attached to channel {}", args.channel);

    let ingest = Ingest::new(reader, args.retention());
    if args.headless {
        run_headless(ingest, args.duration_limit());
        Ok(())
    } else {
        run_window(ingest, args)
    }
}

fn run_headless(mut ingest: Ingest, limit: Option<Duration>) {
    info!("Running headless, statistics every {}s", STATS_INTERVAL.as_secs());
    let started = Instant::now();
    let mut last_stats = started;

    loop {
        if ingest.poll() == 0 {
            thread::sleep(IDLE_BACKOFF);
        }

        if last_stats.elapsed() >= STATS_INTERVAL {
            display_statistics(&ingest.stats());
            last_stats = Instant::now();
        }

        if limit.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }
    }

    let timeline = ingest.timeline();
    info!(
        "Done: {} threads, max depth {}, latest t={}",
        timeline.thread_count(),
        timeline.max_depth(),
        timeline.latest()
    );
    display_statistics(&ingest.stats());
}

fn run_window(ingest: Ingest, args: &Args) -> Result<()> {
    let (tx, rx) = bounded(1);
    let stop = Arc::new(AtomicBool::new(false));
    let handle = ingest::spawn(ingest, tx, Arc::clone(&stop)).context("Failed to spawn ingest thread")?;

    let result = strobe::app::run(rx, args.retention(), args.duration_limit());

    stop.store(true, Ordering::Relaxed);
    match handle.join() {
        Ok(stats) => display_statistics(&stats),
        Err(_) => log::error!("Ingest thread panicked"),
    }

    result.context("Viewer window failed")
}
