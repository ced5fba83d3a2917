//! # strobe - Live execution timeline viewer
//!
//! The consumer half of strobe. A traced host process (through
//! `strobe-probe`) writes CALL, RETURN, GC and thread-state records into a
//! shared-memory ring and launches this viewer with the channel name. The
//! viewer drains the ring, reconstructs per-thread call intervals and draws
//! them as a 3D timeline.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────┐   shared memory   ┌──────────────────────┐
//! │ host process             │  ring of 65536    │ strobe (this crate)  │
//! │  strobe_probe::Tracer ───┼──16-byte records─▶│  ingest thread       │
//! └──────────────────────────┘                   │   Timeline           │
//!                                                │     │ bounded(1)     │
//!                                                │     ▼                │
//!                                                │  window thread       │
//!                                                │   Renderer (wgpu)    │
//!                                                └──────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`timeline`]: event stream to intervals, GC spans and thread states
//! - [`ingest`]: ring polling, statistics and snapshot hand-off
//! - [`render`]: GPU instance layouts, camera and the wgpu renderer
//! - [`app`]: winit event loop
//! - [`cli`]: command-line arguments
//! - [`domain`]: newtypes and error types shared by the above

pub mod app;
pub mod cli;
pub mod domain;
pub mod ingest;
pub mod render;
pub mod timeline;
