// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static task table: event bitfields and per-task message queue heads.
//!
//! Task 0 is the highest priority task and is scanned first on every
//! dispatch pass; there is no dynamic task creation, so the table's shape
//! (`N` entries, each with a fixed `event_fn`) is fixed for the program's
//! entire lifetime.

use osal_abi::{Status, TaskIndex, SYS_EVENT_MSG};

use crate::msg::MsgHandle;

/// A task's event handler: called with the task's index and the event bits
/// that were set since its last invocation, returns the event bits it did
/// not finish handling (folded back in for the next pass).
pub type EventFn = fn(TaskIndex, u16) -> u16;

#[derive(Copy, Clone)]
pub struct TaskDescriptor {
    pub init_fn: Option<fn()>,
    pub event_fn: EventFn,
}

pub struct TaskTable<const N: usize> {
    descriptors: [TaskDescriptor; N],
    event_bits: [u16; N],
    msg_heads: [Option<MsgHandle>; N],
}

impl<const N: usize> TaskTable<N> {
    pub const fn new(descriptors: [TaskDescriptor; N]) -> Self {
        TaskTable {
            descriptors,
            event_bits: [0; N],
            msg_heads: [None; N],
        }
    }

    fn valid(index: TaskIndex) -> bool {
        index.index() < N
    }

    /// Runs every task's `init_fn`, task 0 first, matching the order
    /// `event_fn` is later scanned in.
    pub fn run_init(&self) {
        for descriptor in &self.descriptors {
            if let Some(init_fn) = descriptor.init_fn {
                init_fn();
            }
        }
    }

    /// ORs `bits` into `task`'s pending event word.
    pub fn set_event(&mut self, task: TaskIndex, bits: u16) -> Status {
        if !Self::valid(task) {
            return Status::InvalidTask;
        }
        self.event_bits[task.index()] |= bits;
        Status::Success
    }

    /// Clears `bits` from `task`'s pending event word.
    pub fn clear_event(&mut self, task: TaskIndex, bits: u16) -> Status {
        if !Self::valid(task) {
            return Status::InvalidTask;
        }
        self.event_bits[task.index()] &= !bits;
        Status::Success
    }

    pub fn event_bits(&self, task: TaskIndex) -> u16 {
        self.event_bits.get(task.index()).copied().unwrap_or(0)
    }

    /// Takes and zeroes `task`'s pending event word, for dispatch to claim
    /// exclusive ownership of the bits it is about to deliver.
    pub fn take_event_bits(&mut self, task: TaskIndex) -> u16 {
        let Some(bits) = self.event_bits.get_mut(task.index()) else {
            return 0;
        };
        core::mem::take(bits)
    }

    /// Number of tasks in the table.
    pub const fn len(&self) -> usize {
        N
    }

    pub fn event_fn(&self, task: TaskIndex) -> Option<EventFn> {
        self.descriptors.get(task.index()).map(|d| d.event_fn)
    }

    pub fn msg_head(&mut self, task: TaskIndex) -> &mut Option<MsgHandle> {
        &mut self.msg_heads[task.index()]
    }

    /// Whether any task currently has pending event bits -- used to decide
    /// whether the dispatch loop may idle when `power-saving` is enabled.
    pub fn any_pending(&self) -> bool {
        self.event_bits.iter().any(|&b| b != 0)
    }
}

/// Convenience for delivering a message: sets `SYS_EVENT_MSG` on the
/// destination in addition to whatever application event bits it already
/// has pending.
pub fn notify_message_delivered<const N: usize>(tasks: &mut TaskTable<N>, dest: TaskIndex) {
    tasks.set_event(dest, SYS_EVENT_MSG);
}
