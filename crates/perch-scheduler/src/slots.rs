// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-account single-run slots.
//!
//! The slot map is the only cross-task shared mutable state in the
//! scheduler. Claiming is check-and-set through the map's entry API, so
//! of two concurrent claimants exactly one wins.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Tracks which accounts have a sync in flight.
#[derive(Default)]
pub struct SyncSlots {
    active: DashMap<String, ()>,
}

impl SyncSlots {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Try to claim the slot for an account. Returns a guard that frees
    /// the slot on drop, or None if a run is already in flight.
    pub fn try_claim(self: &Arc<Self>, account_id: &str) -> Option<SlotGuard> {
        match self.active.entry(account_id.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(entry) => {
                entry.insert(());
                Some(SlotGuard {
                    slots: Arc::clone(self),
                    account_id: account_id.to_string(),
                })
            }
        }
    }

    pub fn is_active(&self, account_id: &str) -> bool {
        self.active.contains_key(account_id)
    }
}

/// RAII guard for a claimed slot. Dropping it releases the slot, which
/// covers every exit path of a run including panics in the run task.
pub struct SlotGuard {
    slots: Arc<SyncSlots>,
    account_id: String,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.slots.active.remove(&self.account_id);
    }
}
