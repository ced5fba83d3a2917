//! Trace record wire format
//!
//! A record is two 64-bit words. The first packs the event kind into its top
//! 4 bits and the nanosecond delta since the producer's epoch into the low 60
//! bits; the second carries a method id, a thread id, or zero.

use bytemuck::{Pod, Zeroable};
use std::fmt;

use crate::error::UnknownKind;

// ============================================================================
// Bit Layout
// ============================================================================

/// Bit position of the 4-bit kind tag inside `timestamp_and_kind`
pub const KIND_SHIFT: u32 = 60;

/// Mask selecting the 60-bit timestamp delta
///
/// 2^60 ns is roughly 36.5 years. Deltas beyond that wrap silently; this is
/// a documented limitation rather than something corrected at runtime.
pub const DELTA_MASK: u64 = (1 << KIND_SHIFT) - 1;

// ============================================================================
// Event Kinds
// ============================================================================

/// Kind tag stored in the top 4 bits of a record
///
/// Tags 9..=15 are unassigned. Consumers must treat them as malformed input,
/// never as a reason to stop reading.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Method entered (payload: method id)
    Call = 0,
    /// Method returned (payload: method id)
    Return = 1,
    /// Garbage collection started (payload unused)
    GcStart = 2,
    /// Garbage collection finished (payload unused)
    GcEnd = 3,
    /// Thread created (payload: thread id)
    ThreadStart = 4,
    /// Thread became runnable (payload: thread id)
    ThreadReady = 5,
    /// Thread gave up the runtime lock (payload: thread id)
    ThreadSuspended = 6,
    /// Thread acquired the runtime lock and is now executing (payload: thread id)
    ThreadResume = 7,
    /// Thread finished (payload: thread id)
    ThreadExit = 8,
}

impl EventKind {
    /// All kinds in tag order
    pub const ALL: [EventKind; 9] = [
        EventKind::Call,
        EventKind::Return,
        EventKind::GcStart,
        EventKind::GcEnd,
        EventKind::ThreadStart,
        EventKind::ThreadReady,
        EventKind::ThreadSuspended,
        EventKind::ThreadResume,
        EventKind::ThreadExit,
    ];

    /// Numeric tag written on the wire
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Thread transition carried by this kind, if it is one of the `THREAD_*` kinds
    #[must_use]
    pub const fn thread_state(self) -> Option<ThreadState> {
        match self {
            EventKind::ThreadStart => Some(ThreadState::Started),
            EventKind::ThreadReady => Some(ThreadState::Ready),
            EventKind::ThreadSuspended => Some(ThreadState::Suspended),
            EventKind::ThreadResume => Some(ThreadState::Resumed),
            EventKind::ThreadExit => Some(ThreadState::Exited),
            EventKind::Call | EventKind::Return | EventKind::GcStart | EventKind::GcEnd => None,
        }
    }
}

impl TryFrom<u8> for EventKind {
    type Error = UnknownKind;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        EventKind::ALL.get(usize::from(tag)).copied().ok_or(UnknownKind(tag))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Call => "CALL",
            EventKind::Return => "RETURN",
            EventKind::GcStart => "GC_START",
            EventKind::GcEnd => "GC_END",
            EventKind::ThreadStart => "THREAD_START",
            EventKind::ThreadReady => "THREAD_READY",
            EventKind::ThreadSuspended => "THREAD_SUSPENDED",
            EventKind::ThreadResume => "THREAD_RESUME",
            EventKind::ThreadExit => "THREAD_EXIT",
        };
        f.write_str(name)
    }
}

/// Thread scheduling state as observed by the host runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadState {
    Started,
    Ready,
    Suspended,
    Resumed,
    Exited,
}

impl ThreadState {
    /// Event kind used to transmit this transition
    #[must_use]
    pub const fn event_kind(self) -> EventKind {
        match self {
            ThreadState::Started => EventKind::ThreadStart,
            ThreadState::Ready => EventKind::ThreadReady,
            ThreadState::Suspended => EventKind::ThreadSuspended,
            ThreadState::Resumed => EventKind::ThreadResume,
            ThreadState::Exited => EventKind::ThreadExit,
        }
    }
}

// ============================================================================
// Trace Record
// ============================================================================

/// One trace record as stored in the ring buffer
///
/// **Memory Layout**: `#[repr(C)]`, 16 bytes, no padding. Both processes
/// read and write this exact layout.
#[repr(C)]
#[derive(Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct TraceEvent {
    /// Kind tag (top 4 bits) and nanosecond delta since the epoch (low 60 bits)
    pub timestamp_and_kind: u64,

    /// Method id for CALL/RETURN, thread id for `THREAD_*`, zero for GC events
    pub payload: u64,
}

const _: () = assert!(std::mem::size_of::<TraceEvent>() == 16);

impl TraceEvent {
    /// Pack a record; `delta` is truncated to 60 bits
    #[must_use]
    pub const fn new(kind: EventKind, delta: u64, payload: u64) -> Self {
        Self {
            timestamp_and_kind: ((kind as u64) << KIND_SHIFT) | (delta & DELTA_MASK),
            payload,
        }
    }

    /// Raw 4-bit kind tag
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn tag(&self) -> u8 {
        (self.timestamp_and_kind >> KIND_SHIFT) as u8
    }

    /// Decoded kind
    ///
    /// # Errors
    /// Returns [`UnknownKind`] for the unassigned tags 9..=15.
    pub fn kind(&self) -> Result<EventKind, UnknownKind> {
        EventKind::try_from(self.tag())
    }

    /// Nanoseconds since the producer's epoch
    #[must_use]
    pub const fn timestamp(&self) -> u64 {
        self.timestamp_and_kind & DELTA_MASK
    }

    #[must_use]
    pub const fn payload(&self) -> u64 {
        self.payload
    }
}

impl fmt::Debug for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("TraceEvent");
        match self.kind() {
            Ok(kind) => s.field("kind", &kind),
            Err(UnknownKind(tag)) => s.field("tag", &tag),
        };
        s.field("timestamp", &self.timestamp()).field("payload", &self.payload).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_unpack() {
        let event = TraceEvent::new(EventKind::ThreadResume, 123_456_789, 7);
        assert_eq!(event.kind(), Ok(EventKind::ThreadResume));
        assert_eq!(event.timestamp(), 123_456_789);
        assert_eq!(event.payload(), 7);
    }

    #[test]
    fn test_tags_follow_declaration_order() {
        for (tag, kind) in EventKind::ALL.iter().enumerate() {
            assert_eq!(usize::from(kind.tag()), tag);
            let event = TraceEvent::new(*kind, 0, 0);
            assert_eq!(event.timestamp_and_kind >> KIND_SHIFT, tag as u64);
        }
    }

    #[test]
    fn test_call_tag_is_zero() {
        // A CALL at delta 0 is an all-zero word
        assert_eq!(TraceEvent::new(EventKind::Call, 0, 0).timestamp_and_kind, 0);
    }

    #[test]
    fn test_delta_overflow_does_not_touch_tag() {
        let event = TraceEvent::new(EventKind::Return, u64::MAX, 1);
        assert_eq!(event.kind(), Ok(EventKind::Return));
        assert_eq!(event.timestamp(), DELTA_MASK);
    }

    #[test]
    fn test_unknown_tag() {
        let event = TraceEvent { timestamp_and_kind: 0xA << KIND_SHIFT, payload: 0 };
        assert_eq!(event.kind(), Err(UnknownKind(0xA)));
        assert!(format!("{event:?}").contains("tag"));
    }

    #[test]
    fn test_thread_state_round_trip() {
        for state in [
            ThreadState::Started,
            ThreadState::Ready,
            ThreadState::Suspended,
            ThreadState::Resumed,
            ThreadState::Exited,
        ] {
            assert_eq!(state.event_kind().thread_state(), Some(state));
        }
        assert_eq!(EventKind::Call.thread_state(), None);
        assert_eq!(EventKind::GcEnd.thread_state(), None);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(EventKind::GcStart.to_string(), "GC_START");
        assert_eq!(EventKind::ThreadSuspended.to_string(), "THREAD_SUSPENDED");
    }
}
