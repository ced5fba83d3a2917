//! Process-local time origin for trace records
//!
//! The epoch is set by whichever event is recorded first, so that event's
//! delta is exactly 0. It is never reset.

use std::sync::atomic::{AtomicU64, Ordering};
use strobe_common::{EventKind, TraceEvent};

const UNSET: u64 = u64::MAX;

/// Lazily established time origin
#[derive(Debug)]
pub struct Epoch {
    base: AtomicU64,
}

impl Default for Epoch {
    fn default() -> Self {
        Self::new()
    }
}

impl Epoch {
    #[must_use]
    pub const fn new() -> Self {
        Self { base: AtomicU64::new(UNSET) }
    }

    /// Monotonic nanoseconds of the first event, once one was recorded
    #[must_use]
    pub fn base(&self) -> Option<u64> {
        match self.base.load(Ordering::Relaxed) {
            UNSET => None,
            base => Some(base),
        }
    }

    /// Delta of `now` against the epoch, establishing the epoch at `now` if unset
    ///
    /// Racing first events agree on a single epoch through the CAS; the loser
    /// measures against the winner's value, saturating at 0.
    pub fn delta_at(&self, now: u64) -> u64 {
        let base = self.base.load(Ordering::Relaxed);
        if base != UNSET {
            return now.saturating_sub(base);
        }
        match self.base.compare_exchange(UNSET, now, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => 0,
            Err(base) => now.saturating_sub(base),
        }
    }

    /// Delta of the current monotonic time
    pub fn now_delta(&self) -> u64 {
        self.delta_at(monotonic_ns())
    }

    /// Stamp a record with the current delta
    pub fn event(&self, kind: EventKind, payload: u64) -> TraceEvent {
        TraceEvent::new(kind, self.now_delta(), payload)
    }
}

/// Monotonic clock in nanoseconds
#[cfg(unix)]
#[allow(unsafe_code, clippy::cast_sign_loss)]
#[must_use]
pub fn monotonic_ns() -> u64 {
    let mut ts = libc::timespec { tv_sec: 0, tv_nsec: 0 };
    // SAFETY: `ts` is a valid, writable timespec and CLOCK_MONOTONIC is always
    // supported, so the call cannot fail or write out of bounds.
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }
    (ts.tv_sec as u64) * 1_000_000_000 + ts.tv_nsec as u64
}

/// Monotonic clock in nanoseconds, relative to the first call in this process
#[cfg(not(unix))]
#[must_use]
pub fn monotonic_ns() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    let anchor = *ANCHOR.get_or_init(Instant::now);
    u64::try_from(anchor.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_first_event_has_zero_delta() {
        let epoch = Epoch::new();
        assert_eq!(epoch.base(), None);
        let first = epoch.event(EventKind::ThreadStart, 0);
        assert_eq!(first.timestamp(), 0);
        assert!(epoch.base().is_some());
    }

    #[test]
    fn test_deltas_are_monotonic() {
        let epoch = Epoch::new();
        let mut last = 0;
        for _ in 0..1_000 {
            let delta = epoch.now_delta();
            assert!(delta >= last);
            last = delta;
        }
    }

    #[test]
    fn test_delta_covers_elapsed_time() {
        const PAUSE: Duration = Duration::from_millis(20);
        let epoch = Epoch::new();
        let first = epoch.event(EventKind::Call, 1);
        thread::sleep(PAUSE);
        let second = epoch.event(EventKind::Return, 1);

        assert_eq!(first.timestamp(), 0);
        assert!(u128::from(second.timestamp()) >= PAUSE.as_nanos());
    }

    #[test]
    fn test_delta_before_epoch_saturates() {
        let epoch = Epoch::new();
        assert_eq!(epoch.delta_at(5_000), 0);
        assert_eq!(epoch.delta_at(4_000), 0);
        assert_eq!(epoch.delta_at(7_500), 2_500);
        assert_eq!(epoch.base(), Some(5_000));
    }

    #[test]
    fn test_racing_first_events_agree_on_one_epoch() {
        let epoch = Arc::new(Epoch::new());
        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let epoch = Arc::clone(&epoch);
                thread::spawn(move || epoch.delta_at(1_000 + i))
            })
            .collect();
        let deltas: Vec<u64> = handles.into_iter().map(|h| h.join().expect("thread panicked")).collect();

        let base = epoch.base().expect("epoch established");
        assert!((1_000..1_008).contains(&base));
        for (i, delta) in deltas.into_iter().enumerate() {
            assert_eq!(delta, (1_000 + i as u64).saturating_sub(base));
        }
    }
}
