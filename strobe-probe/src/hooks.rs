//! Callbacks a host runtime invokes on the tracer
//!
//! A host integration implements nothing itself; it calls these methods from
//! its method-entry, method-exit, GC and thread-scheduling hooks.

use std::hash::Hash;
use strobe_common::{EventKind, ThreadState};

use crate::process::ConsumerLiveness;
use crate::tracer::Tracer;

pub trait RuntimeHooks {
    /// Opaque host handle identifying a thread
    type ThreadIdentity;

    fn on_call(&self, method_id: u64);
    fn on_return(&self, method_id: u64);
    fn on_gc_start(&self);
    fn on_gc_end(&self);
    fn on_thread_transition(&self, identity: &Self::ThreadIdentity, state: ThreadState);
}

impl<K: Eq + Hash + Clone, L: ConsumerLiveness> RuntimeHooks for Tracer<K, L> {
    type ThreadIdentity = K;

    fn on_call(&self, method_id: u64) {
        self.record(EventKind::Call, method_id);
    }

    fn on_return(&self, method_id: u64) {
        self.record(EventKind::Return, method_id);
    }

    fn on_gc_start(&self) {
        self.record(EventKind::GcStart, 0);
    }

    fn on_gc_end(&self) {
        self.record(EventKind::GcEnd, 0);
    }

    fn on_thread_transition(&self, identity: &K, state: ThreadState) {
        let thread_id = self.get_thread_id(identity);
        self.record(state.event_kind(), u64::from(thread_id));
        if state == ThreadState::Exited {
            self.release_thread(identity);
        }
    }
}
