//! Maps host thread identities to small sequential ids
//!
//! The thread that set the pipeline up is id 0; every other thread gets the
//! next id on first observation. Ids are never reused, even after release.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug)]
pub struct ThreadRegistry<K> {
    ids: Mutex<HashMap<K, u32>>,
    next_id: AtomicU32,
}

impl<K: Eq + Hash + Clone> ThreadRegistry<K> {
    /// Registry with `initiating` pre-registered as thread 0
    pub fn new(initiating: K) -> Self {
        let mut ids = HashMap::new();
        ids.insert(initiating, 0);
        Self { ids: Mutex::new(ids), next_id: AtomicU32::new(1) }
    }

    /// Id for `identity`, assigning the next free one on first sight
    pub fn get_thread_id(&self, identity: &K) -> u32 {
        let mut ids = self.ids.lock();
        if let Some(&id) = ids.get(identity) {
            return id;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        ids.insert(identity.clone(), id);
        id
    }

    /// Forget `identity` after its thread exited; returns the id it had
    pub fn release(&self, identity: &K) -> Option<u32> {
        self.ids.lock().remove(identity)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
