//! # Shared Data Structures (Producer ↔ Viewer)
//!
//! Defines the wire format and the transport shared between the instrumented
//! process (producer) and the `strobe` viewer (consumer). Everything that
//! crosses the process boundary is `#[repr(C)]` so both sides agree on the
//! exact byte layout without a version field.
//!
//! ## Key Types
//!
//! - [`TraceEvent`] - One 16-byte trace record (kind + timestamp delta + payload)
//! - [`EventKind`] - The nine event kinds carried in the top 4 bits
//! - [`ThreadState`] - Thread scheduling transitions reported by the host runtime
//! - [`ring::RingBuffer`] - Lock-free SPSC ring of `TraceEvent`s
//! - [`channel`] - Places a `RingBuffer` in named shared memory (feature `shm`)

pub mod error;
pub mod event;
pub mod ring;

#[cfg(feature = "shm")]
pub mod channel;

pub use error::{ChannelError, UnknownKind};
pub use event::{EventKind, ThreadState, TraceEvent, DELTA_MASK, KIND_SHIFT};
pub use ring::{RingBuffer, RingReader, RingWriter, CAPACITY};
