// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Self-expiring exclusion leases.
//!
//! Named `Lease` rather than `Mutex` on purpose (open-question decision,
//! recorded in `DESIGN.md`): `osal_mutex_t` never blocks a caller and tracks
//! no owner, it's a countdown that `take` resets and `update` decrements back
//! to zero, after which the next `take` succeeds regardless of who held it
//! last. Calling it a mutex invites readers to assume blocking semantics
//! this type does not provide.

use crate::slab::{Slab, SlabHandle};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LeaseHandle(SlabHandle);

#[derive(Copy, Clone, Debug)]
struct LeaseRecord {
    /// Remaining milliseconds before this lease self-releases. Zero means
    /// free.
    remaining_ms: u32,
}

pub struct LeaseRegistry<const CAP: usize> {
    leases: Slab<LeaseRecord, CAP>,
}

impl<const CAP: usize> LeaseRegistry<CAP> {
    pub const fn new() -> Self {
        LeaseRegistry {
            leases: Slab::new(),
        }
    }

    /// Registers a new, initially free lease.
    pub fn create(&mut self) -> Option<LeaseHandle> {
        self.leases
            .insert(LeaseRecord { remaining_ms: 0 })
            .map(LeaseHandle)
    }

    pub fn delete(&mut self, handle: LeaseHandle) {
        self.leases.remove(handle.0);
    }

    /// Attempts to acquire `handle` for `hold_ms` milliseconds. Returns
    /// `true` ("I now hold it") if the lease was free; `false` if it was
    /// already held by someone else, in which case its remaining time is
    /// left untouched.
    ///
    /// No owner is tracked (open-question decision, see `DESIGN.md`): two
    /// tasks racing `take` on the same lease both see a consistent `bool`,
    /// but neither can ask "who holds it."
    pub fn take(&mut self, handle: LeaseHandle, hold_ms: u32) -> bool {
        let Some(record) = self.leases.get_mut(handle.0) else {
            return false;
        };
        if record.remaining_ms == 0 {
            record.remaining_ms = hold_ms;
            true
        } else {
            false
        }
    }

    /// Releases `handle` immediately, regardless of remaining time.
    pub fn release(&mut self, handle: LeaseHandle) {
        if let Some(record) = self.leases.get_mut(handle.0) {
            record.remaining_ms = 0;
        }
    }

    /// Whether `handle` is currently held.
    pub fn check(&self, handle: LeaseHandle) -> bool {
        self.leases
            .get(handle.0)
            .is_some_and(|r| r.remaining_ms != 0)
    }

    /// Remaining wait-ms for `handle` (`osal_mutex_check`'s numeric return),
    /// 0 if free or the handle is stale.
    pub fn remaining_ms(&self, handle: LeaseHandle) -> u32 {
        self.leases.get(handle.0).map_or(0, |r| r.remaining_ms)
    }

    /// Decrements every outstanding lease by `elapsed_ms`, releasing any
    /// that reach zero.
    pub fn update(&mut self, elapsed_ms: u32) {
        for (_, record) in self.leases.iter_mut() {
            record.remaining_ms = record.remaining_ms.saturating_sub(elapsed_ms);
        }
    }
}
