// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interrupt-handler registration shim.
//!
//! A fixed table of function pointers, indexed by interrupt id, simplified
//! from the teacher's cross-address-space IRQ notification machinery since
//! there is only one address space here: registering a handler is direct
//! function-pointer dispatch, not a notification mask delivered across a
//! syscall boundary.

use osal_abi::Status;

pub type IsrHandler = fn();

pub struct IsrTable<const CAP: usize> {
    handlers: [Option<IsrHandler>; CAP],
    enabled: [bool; CAP],
}

impl<const CAP: usize> IsrTable<CAP> {
    pub const fn new() -> Self {
        IsrTable {
            handlers: [None; CAP],
            enabled: [false; CAP],
        }
    }

    pub fn register(&mut self, id: u8, handler: IsrHandler) -> Status {
        let Some(slot) = self.handlers.get_mut(id as usize) else {
            return Status::InvalidInterruptId;
        };
        *slot = Some(handler);
        Status::Success
    }

    pub fn enable(&mut self, id: u8) -> Status {
        let Some(slot) = self.enabled.get_mut(id as usize) else {
            return Status::InvalidInterruptId;
        };
        *slot = true;
        Status::Success
    }

    pub fn disable(&mut self, id: u8) -> Status {
        let Some(slot) = self.enabled.get_mut(id as usize) else {
            return Status::InvalidInterruptId;
        };
        *slot = false;
        Status::Success
    }

    /// Invokes the handler registered for `id` if one is registered and
    /// enabled. Intended to be called from the application's real interrupt
    /// vector after it has identified which id fired.
    pub fn dispatch(&self, id: u8) {
        if self.enabled.get(id as usize).copied().unwrap_or(false) {
            if let Some(handler) = self.handlers.get(id as usize).copied().flatten() {
                handler();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};

    static CALLS: AtomicU32 = AtomicU32::new(0);

    fn handler() {
        CALLS.fetch_add(1, Ordering::Relaxed);
    }

    #[test]
    fn disabled_handler_is_not_invoked() {
        let mut table: IsrTable<4> = IsrTable::new();
        table.register(0, handler);
        CALLS.store(0, Ordering::Relaxed);
        table.dispatch(0);
        assert_eq!(CALLS.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn enabled_handler_is_invoked() {
        let mut table: IsrTable<4> = IsrTable::new();
        table.register(0, handler);
        table.enable(0);
        CALLS.store(0, Ordering::Relaxed);
        table.dispatch(0);
        assert_eq!(CALLS.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn out_of_range_id_is_rejected() {
        let mut table: IsrTable<2> = IsrTable::new();
        assert_eq!(table.register(9, handler), Status::InvalidInterruptId);
        assert_eq!(table.enable(9), Status::InvalidInterruptId);
    }
}
