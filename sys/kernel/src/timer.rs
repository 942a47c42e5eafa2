// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Software timer wheel: one-shot and reload timers keyed by (task, event).
//!
//! Transcribed from `original_source/.../OSAL_Timers.c`'s
//! `osalAddTimer`/`osalTimerUpdate`, not derived from prose alone, since the
//! exact interaction between an existing record and a second
//! `start_timer`/`start_reload_timer` call on the same (task, event) pair
//! only falls out of the C source: starting a one-shot timer on top of an
//! existing record updates only its remaining time, leaving any reload
//! period untouched; starting a reload timer always overwrites the reload
//! period, even when a record already existed.

use osal_abi::{Status, TaskIndex};

use crate::slab::{Slab, SlabHandle};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimerHandle(SlabHandle);

#[derive(Copy, Clone, Debug)]
struct TimerRecord {
    task: TaskIndex,
    /// Zero means tombstoned: still occupying a slot until the next
    /// `update` sweep removes it, but no longer considered active.
    event_flag: u16,
    timeout_ms: u32,
    /// Zero means one-shot.
    reload_ms: u32,
}

/// Fixed-capacity set of active timers.
pub struct TimerWheel<const CAP: usize> {
    timers: Slab<TimerRecord, CAP>,
}

impl<const CAP: usize> TimerWheel<CAP> {
    pub const fn new() -> Self {
        TimerWheel {
            timers: Slab::new(),
        }
    }

    fn find(&mut self, task: TaskIndex, event_flag: u16) -> Option<TimerHandle> {
        self.timers
            .iter()
            .find(|(_, r)| r.task == task && r.event_flag == event_flag)
            .map(|(h, _)| TimerHandle(h))
    }

    /// Starts (or restarts) a one-shot timer for `(task, event_flag)`. If a
    /// record already exists, only its remaining time is updated; any
    /// reload period it carries is left alone.
    pub fn start_timer(
        &mut self,
        task: TaskIndex,
        event_flag: u16,
        timeout_ms: u32,
    ) -> Option<TimerHandle> {
        if let Some(handle) = self.find(task, event_flag) {
            let record = self.timers.get_mut(handle.0)?;
            record.timeout_ms = timeout_ms;
            return Some(handle);
        }
        let handle = self.timers.insert(TimerRecord {
            task,
            event_flag,
            timeout_ms,
            reload_ms: 0,
        })?;
        Some(TimerHandle(handle))
    }

    /// Starts (or restarts) a reload timer. Unlike `start_timer`, the reload
    /// period is always (re)written, even onto a pre-existing record.
    pub fn start_reload_timer(
        &mut self,
        task: TaskIndex,
        event_flag: u16,
        timeout_ms: u32,
    ) -> Option<TimerHandle> {
        let handle = self.start_timer(task, event_flag, timeout_ms)?;
        let record = self.timers.get_mut(handle.0)?;
        record.reload_ms = timeout_ms;
        Some(handle)
    }

    /// Tombstones the timer for `(task, event_flag)`, if any; it is
    /// physically removed on the next `update` sweep. Returns
    /// `Status::InvalidEventId` if no matching timer exists (`osalStopTimerEx`'s
    /// failure mode for an unknown (task, event) pair), leaving state
    /// untouched.
    pub fn stop_timer(&mut self, task: TaskIndex, event_flag: u16) -> Status {
        let Some(handle) = self.find(task, event_flag) else {
            return Status::InvalidEventId;
        };
        self.timers.get_mut(handle.0).unwrap().event_flag = 0;
        Status::Success
    }

    /// Remaining milliseconds for `(task, event_flag)`, or `None` if no
    /// active timer matches.
    pub fn get_timeout(&mut self, task: TaskIndex, event_flag: u16) -> Option<u32> {
        let handle = self.find(task, event_flag)?;
        self.timers.get(handle.0).map(|r| r.timeout_ms)
    }

    pub fn num_active(&self) -> usize {
        self.timers.len()
    }

    /// Minimum remaining time across all active timers, or `None` if none
    /// are active.
    pub fn next_timeout(&self) -> Option<u32> {
        self.timers.iter().map(|(_, r)| r.timeout_ms).min()
    }

    /// Advances every timer by `elapsed_ms`, invoking `on_fire(task,
    /// event_flag)` once per expiry (natural one-shot expiry, or each
    /// reload period rollover), matching `osalTimerUpdate`'s combined
    /// fire-then-requeue-or-remove sweep.
    pub fn update(&mut self, elapsed_ms: u32, mut on_fire: impl FnMut(TaskIndex, u16)) {
        let mut to_remove = [None; CAP];
        let mut remove_count = 0;

        for (handle, record) in self.timers.iter_mut() {
            record.timeout_ms = record.timeout_ms.saturating_sub(elapsed_ms);

            if record.timeout_ms == 0 && record.reload_ms != 0 && record.event_flag != 0 {
                on_fire(record.task, record.event_flag);
                record.timeout_ms = record.reload_ms;
                continue;
            }

            if record.timeout_ms == 0 && record.event_flag != 0 {
                on_fire(record.task, record.event_flag);
            }
            if record.timeout_ms == 0 || record.event_flag == 0 {
                to_remove[remove_count] = Some(handle);
                remove_count += 1;
            }
        }

        for handle in to_remove.into_iter().flatten() {
            self.timers.remove(handle);
        }
    }
}
