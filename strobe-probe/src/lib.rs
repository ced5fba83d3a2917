//! # strobe-probe
//!
//! Producer side of the strobe tracer. A host runtime links this crate,
//! calls [`Tracer::start`] once, and forwards its hooks through
//! [`RuntimeHooks`]. Events are stamped against a lazily set [`Epoch`] and
//! pushed into a shared-memory ring that the `strobe` viewer drains.
//!
//! ```no_run
//! use strobe_probe::{RuntimeHooks, ThreadState, Tracer, TracerConfig};
//!
//! # fn main() -> Result<(), strobe_probe::ProbeError> {
//! let tracer = Tracer::start(&TracerConfig::from_env(), 1u64)?;
//! tracer.on_call(42);
//! tracer.on_thread_transition(&1, ThreadState::Suspended);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod epoch;
pub mod error;
pub mod hooks;
pub mod process;
pub mod registry;
pub mod tracer;

pub use config::{TracerConfig, VIEWER_ENV};
pub use epoch::Epoch;
pub use error::ProbeError;
pub use hooks::RuntimeHooks;
pub use process::{spawn_consumer, ConsumerLiveness, ConsumerProcess};
pub use registry::ThreadRegistry;
pub use strobe_common::{EventKind, ThreadState};
pub use tracer::{Tracer, TracerStats};
