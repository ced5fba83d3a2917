//! # Timeline reconstruction
//!
//! Turns the flat event stream into per-thread call intervals, global GC
//! spans and per-thread state logs.
//!
//! ## Attribution
//!
//! CALL and RETURN records carry a method id but no thread id. They belong to
//! the thread that currently holds the runtime, which is thread 0 until the
//! first THREAD_RESUME and afterwards the payload of the latest one.
//!
//! ## Malformed input
//!
//! A RETURN with an empty stack, a GC_END with no open GC and a GC_START
//! while one is open are ignored. Nothing in the stream can make the
//! reconstructor fail except an unassigned kind tag, which is reported to the
//! caller and otherwise skipped.
//!
//! ## Retention
//!
//! Everything that ended more than `retention` before the latest observed
//! timestamp is pruned. Open intervals are never pruned.

pub mod snapshot;

use log::debug;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use strobe_common::{EventKind, ThreadState, TraceEvent, UnknownKind};

use crate::domain::{MethodId, ThreadId, Timestamp};
pub use snapshot::{IdleSpan, LaneSnapshot, TimelineSnapshot};

/// How far behind the latest event data is kept
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(30);

/// One method invocation on one thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallInterval {
    pub thread_id: ThreadId,
    /// Stack depth at entry, 0 for the outermost frame
    pub depth: u32,
    pub method_id: MethodId,
    pub start: Timestamp,
    /// `None` while the call has not returned
    pub end: Option<Timestamp>,
}

impl CallInterval {
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }
}

/// One garbage collection pause (process-wide)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcInterval {
    pub start: Timestamp,
    pub end: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadStateEvent {
    pub thread_id: ThreadId,
    pub timestamp: Timestamp,
    pub state: ThreadState,
}

/// Effect of a single event on the timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Recorded,
    /// Malformed in context (unmatched RETURN or GC_END, nested GC_START,
    /// thread id out of range); the timeline is unchanged
    Ignored,
}

#[derive(Debug, Default)]
struct Lane {
    /// Open frames, outermost first
    stack: Vec<CallInterval>,
    /// Returned frames in return order
    closed: VecDeque<CallInterval>,
    states: VecDeque<ThreadStateEvent>,
    exited_at: Option<Timestamp>,
}

impl Lane {
    fn max_depth(&self) -> usize {
        let closed = self.closed.iter().map(|c| c.depth as usize + 1).max().unwrap_or(0);
        closed.max(self.stack.len())
    }
}

/// Reconstructed model of everything inside the retention window
#[derive(Debug)]
pub struct Timeline {
    lanes: BTreeMap<ThreadId, Lane>,
    gc_closed: VecDeque<GcInterval>,
    gc_open: Option<Timestamp>,
    current_thread: ThreadId,
    latest: Timestamp,
    retention: Duration,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl Timeline {
    #[must_use]
    pub fn new(retention: Duration) -> Self {
        Self {
            lanes: BTreeMap::new(),
            gc_closed: VecDeque::new(),
            gc_open: None,
            current_thread: ThreadId(0),
            latest: Timestamp(0),
            retention,
        }
    }

    /// Fold one event into the model
    ///
    /// # Errors
    /// Returns [`UnknownKind`] for records with an unassigned kind tag; the
    /// model is left untouched.
    pub fn apply(&mut self, event: &TraceEvent) -> Result<Applied, UnknownKind> {
        let kind = event.kind()?;
        let at = Timestamp(event.timestamp());
        let payload = event.payload();
        self.latest = self.latest.max(at);

        let applied = match kind {
            EventKind::Call => self.enter(at, MethodId(payload)),
            EventKind::Return => self.exit(at, MethodId(payload)),
            EventKind::GcStart => {
                if self.gc_open.is_some() {
                    Applied::Ignored
                } else {
                    self.gc_open = Some(at);
                    Applied::Recorded
                }
            }
            EventKind::GcEnd => match self.gc_open.take() {
                Some(start) => {
                    self.gc_closed.push_back(GcInterval { start, end: Some(at) });
                    Applied::Recorded
                }
                None => Applied::Ignored,
            },
            EventKind::ThreadStart
            | EventKind::ThreadReady
            | EventKind::ThreadSuspended
            | EventKind::ThreadResume
            | EventKind::ThreadExit => match (kind.thread_state(), u32::try_from(payload)) {
                (Some(state), Ok(id)) => self.transition(ThreadId(id), at, state),
                _ => Applied::Ignored,
            },
        };
        Ok(applied)
    }

    fn enter(&mut self, at: Timestamp, method_id: MethodId) -> Applied {
        let thread_id = self.current_thread;
        let lane = self.lanes.entry(thread_id).or_default();
        let depth = u32::try_from(lane.stack.len()).unwrap_or(u32::MAX);
        lane.stack.push(CallInterval { thread_id, depth, method_id, start: at, end: None });
        Applied::Recorded
    }

    fn exit(&mut self, at: Timestamp, method_id: MethodId) -> Applied {
        let Some(lane) = self.lanes.get_mut(&self.current_thread) else {
            return Applied::Ignored;
        };
        if lane.stack.is_empty() {
            return Applied::Ignored;
        }

        // A return for a deeper frame means the frames above it were unwound
        // without their own RETURN; otherwise only the top frame closes.
        let top = lane.stack.len() - 1;
        let from = lane.stack.iter().rposition(|frame| frame.method_id == method_id).unwrap_or(top);
        if from < top {
            debug!("RETURN of {method_id} unwinds {} frames on {}", top - from, self.current_thread);
        }

        for mut frame in lane.stack.drain(from..).rev() {
            frame.end = Some(at);
            lane.closed.push_back(frame);
        }
        Applied::Recorded
    }

    fn transition(&mut self, thread_id: ThreadId, at: Timestamp, state: ThreadState) -> Applied {
        let lane = self.lanes.entry(thread_id).or_default();
        lane.states.push_back(ThreadStateEvent { thread_id, timestamp: at, state });
        match state {
            ThreadState::Resumed => self.current_thread = thread_id,
            ThreadState::Exited => lane.exited_at = Some(at),
            ThreadState::Started => lane.exited_at = None,
            ThreadState::Ready | ThreadState::Suspended => {}
        }
        Applied::Recorded
    }

    /// Drop data that ended before the retention window
    ///
    /// Returns the number of intervals, GC spans and state events removed.
    pub fn prune(&mut self) -> usize {
        let horizon = self.latest.saturating_sub(self.retention);
        let ended_before = |end: Option<Timestamp>| end.is_some_and(|end| end < horizon);
        let mut removed = 0;

        self.lanes.retain(|thread_id, lane| {
            while lane.closed.front().is_some_and(|c| ended_before(c.end)) {
                lane.closed.pop_front();
                removed += 1;
            }
            // The newest state stays so the lane keeps a known state
            while lane.states.len() > 1 && lane.states.front().is_some_and(|s| s.timestamp < horizon) {
                lane.states.pop_front();
                removed += 1;
            }

            let expired = lane.stack.is_empty() && ended_before(lane.exited_at);
            if expired {
                debug!("Dropping lane for exited {thread_id}");
                removed += lane.closed.len() + lane.states.len();
            }
            !expired
        });

        while self.gc_closed.front().is_some_and(|gc| ended_before(gc.end)) {
            self.gc_closed.pop_front();
            removed += 1;
        }

        removed
    }

    /// Deepest retained call depth plus one (0 when there are no calls)
    #[must_use]
    pub fn max_depth(&self) -> u32 {
        let depth = self.lanes.values().map(Lane::max_depth).max().unwrap_or(0);
        u32::try_from(depth).unwrap_or(u32::MAX)
    }

    /// Latest timestamp seen so far; the live edge of the view
    #[must_use]
    pub fn latest(&self) -> Timestamp {
        self.latest
    }

    /// Thread that CALL and RETURN records are currently attributed to
    #[must_use]
    pub fn current_thread(&self) -> ThreadId {
        self.current_thread
    }

    #[must_use]
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Threads with retained data, in lane order
    pub fn threads(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.lanes.keys().copied()
    }

    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.lanes.len()
    }

    /// Retained intervals of `thread`: returned ones first, then open frames outermost first
    #[must_use]
    pub fn intervals(&self, thread: ThreadId) -> Vec<CallInterval> {
        self.lanes
            .get(&thread)
            .map(|lane| lane.closed.iter().chain(&lane.stack).copied().collect())
            .unwrap_or_default()
    }

    /// Open frames of `thread`, outermost first
    #[must_use]
    pub fn open_intervals(&self, thread: ThreadId) -> &[CallInterval] {
        self.lanes.get(&thread).map_or(&[], |lane| lane.stack.as_slice())
    }

    #[must_use]
    pub fn thread_states(&self, thread: ThreadId) -> Vec<ThreadStateEvent> {
        self.lanes.get(&thread).map(|lane| lane.states.iter().copied().collect()).unwrap_or_default()
    }

    /// Retained GC spans, the open one (if any) last
    #[must_use]
    pub fn gc_intervals(&self) -> Vec<GcInterval> {
        self.gc_closed
            .iter()
            .copied()
            .chain(self.gc_open.map(|start| GcInterval { start, end: None }))
            .collect()
    }

    /// Owned copy of the model for the render thread
    #[must_use]
    pub fn snapshot(&self) -> TimelineSnapshot {
        let lanes = self
            .lanes
            .iter()
            .map(|(&thread_id, lane)| LaneSnapshot {
                thread_id,
                intervals: lane.closed.iter().chain(&lane.stack).copied().collect(),
                states: lane.states.iter().copied().collect(),
            })
            .collect();

        TimelineSnapshot {
            base_time: self.latest,
            lanes,
            gc: self.gc_intervals(),
            max_depth: self.max_depth(),
        }
    }
}
