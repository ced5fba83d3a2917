//! Owned view of the timeline handed from the ingest thread to the renderer

use strobe_common::ThreadState;

use super::{CallInterval, GcInterval, ThreadStateEvent};
use crate::domain::{ThreadId, Timestamp};

/// Everything retained for one thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneSnapshot {
    pub thread_id: ThreadId,
    /// Returned calls first, then open frames outermost first
    pub intervals: Vec<CallInterval>,
    pub states: Vec<ThreadStateEvent>,
}

/// Stretch of time a thread spent off the runtime
///
/// Opened by READY or SUSPENDED, closed by the next RESUME, START or EXIT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleSpan {
    /// `Ready` or `Suspended`
    pub state: ThreadState,
    pub start: Timestamp,
    /// `None` while the thread is still waiting
    pub end: Option<Timestamp>,
}

impl LaneSnapshot {
    /// Most recent scheduling state, if any was reported
    #[must_use]
    pub fn current_state(&self) -> Option<ThreadState> {
        self.states.last().map(|s| s.state)
    }

    /// Waiting periods derived from the state log, oldest first
    ///
    /// A READY following a SUSPENDED ends the suspended span and starts a
    /// ready one at the same instant.
    #[must_use]
    pub fn idle_spans(&self) -> Vec<IdleSpan> {
        let mut spans = Vec::new();
        let mut open: Option<IdleSpan> = None;

        for event in &self.states {
            if let Some(mut span) = open.take() {
                span.end = Some(event.timestamp);
                spans.push(span);
            }
            if matches!(event.state, ThreadState::Ready | ThreadState::Suspended) {
                open = Some(IdleSpan { state: event.state, start: event.timestamp, end: None });
            }
        }
        spans.extend(open);
        spans
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimelineSnapshot {
    /// Latest observed timestamp; open intervals end here
    pub base_time: Timestamp,
    /// One lane per thread, ordered by thread id
    pub lanes: Vec<LaneSnapshot>,
    pub gc: Vec<GcInterval>,
    pub max_depth: u32,
}

impl TimelineSnapshot {
    #[must_use]
    pub fn thread_count(&self) -> u32 {
        u32::try_from(self.lanes.len()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn lane(&self, thread_id: ThreadId) -> Option<&LaneSnapshot> {
        self.lanes.iter().find(|lane| lane.thread_id == thread_id)
    }

    #[must_use]
    pub fn interval_count(&self) -> usize {
        self.lanes.iter().map(|lane| lane.intervals.len()).sum()
    }

    #[must_use]
    pub fn open_count(&self) -> usize {
        self.lanes.iter().flat_map(|lane| &lane.intervals).filter(|i| i.is_open()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::Timeline;
    use strobe_common::{EventKind, TraceEvent};

    #[test]
    fn test_snapshot_mirrors_timeline() {
        let mut timeline = Timeline::default();
        for event in [
            TraceEvent::new(EventKind::ThreadResume, 0, 2),
            TraceEvent::new(EventKind::Call, 1, 5),
            TraceEvent::new(EventKind::Call, 2, 6),
            TraceEvent::new(EventKind::Return, 3, 6),
            TraceEvent::new(EventKind::GcStart, 4, 0),
        ] {
            timeline.apply(&event).expect("known kind");
        }

        let snapshot = timeline.snapshot();
        assert_eq!(snapshot.base_time, Timestamp(4));
        assert_eq!(snapshot.thread_count(), 1);
        assert_eq!(snapshot.max_depth, 2);
        assert_eq!(snapshot.interval_count(), 2);
        assert_eq!(snapshot.open_count(), 1);
        assert_eq!(snapshot.gc.len(), 1);

        let lane = snapshot.lane(ThreadId(2)).expect("lane for thread 2");
        assert_eq!(lane.current_state(), Some(ThreadState::Resumed));
        assert!(snapshot.lane(ThreadId(0)).is_none());
    }

    fn lane_with(states: &[(u64, ThreadState)]) -> LaneSnapshot {
        LaneSnapshot {
            thread_id: ThreadId(1),
            intervals: Vec::new(),
            states: states
                .iter()
                .map(|&(t, state)| ThreadStateEvent { thread_id: ThreadId(1), timestamp: Timestamp(t), state })
                .collect(),
        }
    }

    #[test]
    fn test_idle_spans_follow_state_log() {
        let lane = lane_with(&[
            (0, ThreadState::Started),
            (5, ThreadState::Ready),
            (10, ThreadState::Resumed),
            (20, ThreadState::Suspended),
            (30, ThreadState::Ready),
            (35, ThreadState::Resumed),
            (50, ThreadState::Suspended),
        ]);

        assert_eq!(
            lane.idle_spans(),
            vec![
                IdleSpan { state: ThreadState::Ready, start: Timestamp(5), end: Some(Timestamp(10)) },
                IdleSpan { state: ThreadState::Suspended, start: Timestamp(20), end: Some(Timestamp(30)) },
                IdleSpan { state: ThreadState::Ready, start: Timestamp(30), end: Some(Timestamp(35)) },
                IdleSpan { state: ThreadState::Suspended, start: Timestamp(50), end: None },
            ]
        );
    }

    #[test]
    fn test_idle_span_closed_by_exit() {
        let lane = lane_with(&[(1, ThreadState::Suspended), (4, ThreadState::Exited)]);
        assert_eq!(
            lane.idle_spans(),
            vec![IdleSpan { state: ThreadState::Suspended, start: Timestamp(1), end: Some(Timestamp(4)) }]
        );
        assert!(lane_with(&[(1, ThreadState::Resumed)]).idle_spans().is_empty());
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = TimelineSnapshot::default();
        assert_eq!(snapshot.thread_count(), 0);
        assert_eq!(snapshot.open_count(), 0);
    }
}
