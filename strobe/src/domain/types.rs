//! Domain types providing compile-time safety and self-documentation
//!
//! The trace stream carries bare `u64` payloads whose meaning depends on the
//! event kind. Wrapping them keeps a method id from being used as a thread
//! id once the event has been decoded.

use std::fmt;
use std::time::Duration;

/// Nanoseconds since the producer's epoch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp(pub u64);

impl Timestamp {
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Time from `earlier` to `self`, zero if `earlier` is later
    #[must_use]
    pub const fn saturating_since(self, earlier: Timestamp) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }

    /// `self` moved back by `window`, clamped at the epoch
    #[must_use]
    pub fn saturating_sub(self, window: Duration) -> Timestamp {
        let nanos = u64::try_from(window.as_nanos()).unwrap_or(u64::MAX);
        Timestamp(self.0.saturating_sub(nanos))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[allow(clippy::cast_precision_loss)]
        let secs = self.0 as f64 / 1e9;
        write!(f, "{secs:.6}s")
    }
}

/// Sequential thread id assigned by the producer (0 = initiating thread)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(pub u32);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thread#{}", self.0)
    }
}

/// Opaque method identifier chosen by the host runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(pub u64);

impl MethodId {
    /// Low 32 bits, as uploaded to the GPU for colouring
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn gpu_id(self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Method#{:#x}", self.0)
    }
}
