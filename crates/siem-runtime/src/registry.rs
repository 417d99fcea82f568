//! §4.E Backlog Registry: the concurrent collection of live backlogs.
//!
//! The reader lock guards the *membership* of the collection, not any
//! individual backlog's contents — each `Backlog` carries its own mutex,
//! acquired only after the target has been located under the registry's
//! read guard. This is the "defensible reimplementation" `SPEC_FULL.md` §4
//! settles on in place of the reference design's bare reader-lock mutation,
//! which does not type-check as safe Rust without interior mutability.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use siem_kernel::BacklogState;
use siem_types::BacklogSnapshot;

/// A live backlog: an immutable identity (for registry-level filtering
/// without taking its lock) plus mutable state behind its own mutex.
pub struct Backlog {
    directive_id: u64,
    state: Mutex<BacklogState>,
}

impl Backlog {
    pub fn new(state: BacklogState) -> Self {
        Self {
            directive_id: state.directive.id,
            state: Mutex::new(state),
        }
    }

    pub fn directive_id(&self) -> u64 {
        self.directive_id
    }

    pub fn lock(&self) -> MutexGuard<'_, BacklogState> {
        self.state.lock().expect("backlog mutex poisoned")
    }

    /// The §6 backlog-snapshot projection of this backlog's current state.
    pub fn snapshot(&self) -> BacklogSnapshot {
        let state = self.lock();
        BacklogSnapshot {
            backlog_id: state.id.clone(),
            status_time: state.status_time,
            risk: state.risk,
            current_stage: state.current_stage,
            highest_stage: state.highest_stage,
            directive: state.directive.clone(),
            src_ips: state.src_ips.clone(),
            dst_ips: state.dst_ips.clone(),
        }
    }
}

/// Owns the set of live backlogs. Insert/remove are exclusive; everything
/// else only needs a read guard over the membership list.
#[derive(Default)]
pub struct Registry {
    backlogs: RwLock<Vec<Arc<Backlog>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A read-consistent snapshot of the current membership. Cheap: it
    /// clones `Arc`s, not backlog state.
    pub fn snapshot(&self) -> Vec<Arc<Backlog>> {
        self.backlogs.read().expect("registry lock poisoned").clone()
    }

    /// Backlogs belonging to `directive_id`, for the dispatcher's scan.
    pub fn by_directive(&self, directive_id: u64) -> Vec<Arc<Backlog>> {
        self.backlogs
            .read()
            .expect("registry lock poisoned")
            .iter()
            .filter(|b| b.directive_id() == directive_id)
            .cloned()
            .collect()
    }

    pub fn insert(&self, backlog: Arc<Backlog>) {
        self.backlogs.write().expect("registry lock poisoned").push(backlog);
    }

    /// Removes the backlog with `id`, if present. Idempotent: removing an
    /// absent id is a no-op, per §8.
    pub fn remove(&self, id: &str) {
        let mut guard = self.backlogs.write().expect("registry lock poisoned");
        if let Some(pos) = guard.iter().position(|b| b.lock().id == id) {
            guard.swap_remove(pos);
        }
    }

    pub fn len(&self) -> usize {
        self.backlogs.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
