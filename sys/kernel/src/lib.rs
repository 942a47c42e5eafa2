// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cooperative, single-core OSAL kernel for microcontroller-class targets.
//!
//! This is the application-independent hard core: critical-section
//! discipline, a fixed-arena allocator, a variable-length message pool, a
//! static task table dispatched by event bitfields, a software timer wheel,
//! a wall clock, a self-expiring lease registry, a buffer manager, and an
//! interrupt-handler registration shim. All of it is reachable without
//! `unsafe` from outside this crate except the raw allocator itself, and all
//! of it runs and is tested on the host: the only things left to the
//! embedding application are the real critical-section and tick-source
//! implementations (`osal_hal::CriticalSection`, `osal_hal::TickSource`).
//!
//! # Design principles
//!
//! 1. Static configuration. Every table (`N` tasks, timer/lease/ISR
//!    capacity, heap size) is sized by a `const` generic parameter fixed at
//!    build time; there is no dynamic task or timer-slot creation.
//! 2. A strong preference for safe code. Only the allocator and the handles
//!    it hands out to the message pool and buffer manager use `unsafe`,
//!    confined to `heap.rs`/`msg.rs`/`buf.rs`.
//! 3. A preference for simple, literal algorithms over fast, clever ones --
//!    the timer wheel and buffer manager transcribe the reference
//!    implementation's behavior deliberately rather than optimize it.

#![cfg_attr(not(test), no_std)]

pub mod buf;
pub mod clock;
pub mod err;
pub mod guard;
pub mod heap;
pub mod isr;
pub mod lease;
pub mod msg;
pub mod slab;
pub mod task;
pub mod util;

pub use osal_abi::{EventHeader, MsgHeader, Status, TaskIndex, UtcTime, UtcTimeStruct};
pub use osal_hal::{CriticalSection, TickSource};

use buf::BufHandle;
use clock::Clock;
use err::InitError;
use heap::Heap;
use isr::{IsrHandler, IsrTable};
use lease::{LeaseHandle, LeaseRegistry};
use msg::MsgHandle;
use task::{EventFn, TaskDescriptor, TaskTable};
use timer::TimerWheel;

pub mod timer;

/// Trace entries recorded into [`TRACE`] at the same sites a deployed build
/// would inspect with `humility ringbuf` instead of a debugger breakpoint.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Trace {
    None,
    TaskDispatched(u8, u16),
    TimerFired(u8, u16),
}

ringbuf::ringbuf!(TRACE, Trace, 32, Trace::None);

/// Microseconds per [`osal_hal::TickSource::precision_count`] tick, under
/// the polled (non-`systick-irq`) tick-source path.
const TICK_PERIOD_US: u32 = 320;

/// Ties every kernel subsystem together behind one critical-section
/// discipline.
///
/// `N` is the number of tasks, `HEAP_BYTES` the message/buffer arena size,
/// `TIMERS`/`LEASES`/`ISRS` the respective table capacities.
pub struct Kernel<
    const N: usize,
    const HEAP_BYTES: usize,
    const TIMERS: usize,
    const LEASES: usize,
    const ISRS: usize,
    C: CriticalSection,
    T: TickSource,
> {
    heap: Heap<HEAP_BYTES>,
    tasks: TaskTable<N>,
    timers: TimerWheel<TIMERS>,
    leases: LeaseRegistry<LEASES>,
    isrs: IsrTable<ISRS>,
    clock: Clock,
    cs: C,
    tick: T,
    current_task: Option<TaskIndex>,
    last_tick_count: u32,
    tick_accum_us: u32,
}

impl<
        const N: usize,
        const HEAP_BYTES: usize,
        const TIMERS: usize,
        const LEASES: usize,
        const ISRS: usize,
        C: CriticalSection,
        T: TickSource,
    > Kernel<N, HEAP_BYTES, TIMERS, LEASES, ISRS, C, T>
{
    pub fn new(
        descriptors: [TaskDescriptor; N],
        cs: C,
        tick: T,
    ) -> Result<Self, InitError> {
        if N == 0 {
            return Err(InitError::NoTasks);
        }
        if HEAP_BYTES < heap::min_bytes() {
            return Err(InitError::HeapTooSmall);
        }
        let heap = Heap::new();
        heap.init();
        Ok(Kernel {
            heap,
            tasks: TaskTable::new(descriptors),
            timers: TimerWheel::new(),
            leases: LeaseRegistry::new(),
            isrs: IsrTable::new(),
            clock: Clock::new(),
            cs,
            tick,
            current_task: None,
            last_tick_count: 0,
            tick_accum_us: 0,
        })
    }

    // -- dispatch ---------------------------------------------------------

    /// The task currently executing, if called from inside an `event_fn`.
    pub fn self_task(&self) -> Option<TaskIndex> {
        self.current_task
    }

    /// Advances clock/timers/leases by `elapsed_ms` and delivers any event
    /// bits timers set as a result. Applications built with `systick-irq`
    /// call this (via [`Self::on_tick`]) once per millisecond instead of
    /// letting [`Self::run_system`] derive elapsed time from the polled
    /// tick source.
    fn advance_by(&mut self, elapsed_ms: u32) {
        if elapsed_ms == 0 {
            return;
        }
        let cs = &self.cs;
        let clock = &mut self.clock;
        let timers = &mut self.timers;
        let tasks = &mut self.tasks;
        let leases = &mut self.leases;
        osal_hal::with_critical_section(cs, move || {
            clock.time_update(elapsed_ms);
            timers.update(elapsed_ms, |task, event| {
                ringbuf::ringbuf_entry!(TRACE, Trace::TimerFired(task.0, event));
                tasks.set_event(task, event);
            });
            leases.update(elapsed_ms);
        });
    }

    /// Runs one pass through the task table (`osal_run_system`'s single-pass
    /// semantics): scans tasks in priority order, and for the first one with
    /// pending events, snapshots and clears its event word, invokes its
    /// `event_fn`, and ORs back whatever bits it didn't finish handling.
    pub fn run_system(&mut self) {
        #[cfg(not(feature = "systick-irq"))]
        {
            let now = self.tick.precision_count();
            let elapsed_ticks = now.wrapping_sub(self.last_tick_count);
            self.last_tick_count = now;
            self.tick_accum_us += elapsed_ticks.wrapping_mul(TICK_PERIOD_US);
            let elapsed_ms = self.tick_accum_us / 1000;
            self.tick_accum_us %= 1000;
            self.advance_by(elapsed_ms);
        }

        for i in 0..N {
            let task = TaskIndex::new(i as u8);
            let tasks = &mut self.tasks;
            let bits = osal_hal::with_critical_section(&self.cs, || tasks.take_event_bits(task));
            if bits == 0 {
                continue;
            }
            ringbuf::ringbuf_entry!(TRACE, Trace::TaskDispatched(task.0, bits));
            self.current_task = Some(task);
            let leftover = match self.tasks.event_fn(task) {
                Some(event_fn) => event_fn(task, bits),
                None => 0,
            };
            self.current_task = None;
            if leftover != 0 {
                let tasks = &mut self.tasks;
                osal_hal::with_critical_section(&self.cs, || {
                    tasks.set_event(task, leftover);
                });
            }
            // Only the highest-priority ready task is dispatched per pass;
            // `start_system`'s loop re-scans from task 0 next time around,
            // so a task that just re-armed itself (or anything of higher
            // priority than it) is reconsidered before any lower-priority
            // task this pass skipped over.
            break;
        }
    }

    /// Runs every task's `init_fn`, then loops [`Self::run_system`] forever.
    /// Never returns; exists only as the application's main-loop entry
    /// point.
    pub fn start_system(&mut self) -> ! {
        self.tasks.run_init();
        loop {
            self.run_system();
            #[cfg(feature = "power-saving")]
            if !self.tasks.any_pending() {
                self.tick.idle_until_tick(self.timer_next_timeout());
            }
        }
    }

    /// Advances the clock/timers/leases by exactly one millisecond. Call
    /// once per tick interrupt under the `systick-irq` feature; unused
    /// otherwise (the polled path derives elapsed time in
    /// [`Self::run_system`] instead).
    #[cfg(feature = "systick-irq")]
    pub fn on_tick(&mut self) {
        self.advance_by(1);
    }

    /// Advances the clock, timer wheel, and lease registry together by
    /// `elapsed_ms` (the clock's own `adjust_timer` operation), for callers that need to
    /// fold in a larger, irregular span of elapsed time in one step instead
    /// of one millisecond at a time -- e.g. after waking from
    /// `TickSource::idle_until_tick` having slept through more than one tick.
    /// The tick source's own interrupt is left to the caller to
    /// disable/re-enable around this call; the critical section inside
    /// [`Self::advance_by`] only protects the shared lists it mutates.
    pub fn adjust_timer(&mut self, elapsed_ms: u32) {
        self.advance_by(elapsed_ms);
    }

    // -- messages -----------------------------------------------------

    pub fn msg_allocate(&self, len: u16) -> Option<MsgHandle> {
        osal_hal::with_critical_section(&self.cs, || msg::allocate(&self.heap, len))
    }

    pub fn msg_deallocate(&self, handle: MsgHandle) {
        osal_hal::with_critical_section(&self.cs, || msg::deallocate(&self.heap, handle));
    }

    pub fn msg_payload(&self, handle: MsgHandle) -> &mut [u8] {
        let (ptr, len) = msg::payload(&self.heap, handle);
        unsafe { core::slice::from_raw_parts_mut(ptr, len) }
    }

    /// FIFO delivery to `dest`'s inbox, setting `SYS_EVENT_MSG`.
    pub fn msg_send(&mut self, handle: MsgHandle, dest: TaskIndex) -> Status {
        if dest.index() >= N {
            return Status::InvalidTask;
        }
        let heap = &self.heap;
        let tasks = &mut self.tasks;
        osal_hal::with_critical_section(&self.cs, || {
            msg::set_destination(heap, handle, dest);
            msg::enqueue(heap, tasks.msg_head(dest), handle);
            task::notify_message_delivered(tasks, dest);
        });
        Status::Success
    }

    /// LIFO delivery to `dest`'s inbox, setting `SYS_EVENT_MSG`.
    pub fn msg_push_front(&mut self, handle: MsgHandle, dest: TaskIndex) -> Status {
        if dest.index() >= N {
            return Status::InvalidTask;
        }
        let heap = &self.heap;
        let tasks = &mut self.tasks;
        osal_hal::with_critical_section(&self.cs, || {
            msg::set_destination(heap, handle, dest);
            msg::push_front(heap, tasks.msg_head(dest), handle);
            task::notify_message_delivered(tasks, dest);
        });
        Status::Success
    }

    pub fn msg_receive(&mut self, task: TaskIndex) -> Option<MsgHandle> {
        let heap = &self.heap;
        let tasks = &mut self.tasks;
        osal_hal::with_critical_section(&self.cs, || msg::dequeue(heap, tasks.msg_head(task)))
    }

    pub fn msg_find(&mut self, task: TaskIndex, event: u8) -> Option<MsgHandle> {
        let heap = &self.heap;
        let tasks = &mut self.tasks;
        osal_hal::with_critical_section(&self.cs, || {
            msg::find(heap, *tasks.msg_head(task), event)
        })
    }

    // -- task event bits --------------------------------------------------

    /// ORs `bits` into `task`'s pending event word. Safe to call from an ISR
    /// per the kernel's restricted ISR-context surface.
    pub fn set_event(&mut self, task: TaskIndex, bits: u16) -> Status {
        let tasks = &mut self.tasks;
        osal_hal::with_critical_section(&self.cs, || tasks.set_event(task, bits))
    }

    /// Clears `bits` from `task`'s pending event word. Task context only.
    pub fn clear_event(&mut self, task: TaskIndex, bits: u16) -> Status {
        let tasks = &mut self.tasks;
        osal_hal::with_critical_section(&self.cs, || tasks.clear_event(task, bits))
    }

    pub fn event_bits(&self, task: TaskIndex) -> u16 {
        self.tasks.event_bits(task)
    }

    pub fn msg_count(&mut self, task: TaskIndex, event: u8) -> usize {
        let heap = &self.heap;
        let tasks = &mut self.tasks;
        osal_hal::with_critical_section(&self.cs, || {
            msg::count_matching(heap, *tasks.msg_head(task), event)
        })
    }

    // -- buffers --------------------------------------------------------

    pub fn buf_alloc(&self, size: u16) -> Option<BufHandle> {
        osal_hal::with_critical_section(&self.cs, || buf::alloc(&self.heap, size))
    }

    pub fn buf_free(&self, handle: BufHandle) {
        osal_hal::with_critical_section(&self.cs, || buf::free(&self.heap, handle));
    }

    pub fn buf_payload(&self, handle: BufHandle) -> &mut [u8] {
        let (ptr, len) = buf::payload(&self.heap, handle);
        unsafe { core::slice::from_raw_parts_mut(ptr, len) }
    }

    /// Positive `delta` grows the header, negative shrinks it back.
    pub fn buf_adjust_header(&self, handle: BufHandle, delta: i32) -> &mut [u8] {
        let (ptr, len) =
            osal_hal::with_critical_section(&self.cs, || buf::adjust_header(&self.heap, handle, delta));
        unsafe { core::slice::from_raw_parts_mut(ptr, len) }
    }

    /// Positive `delta` trims the tail, negative restores previously trimmed
    /// space.
    pub fn buf_adjust_tail(&self, handle: BufHandle, delta: i32) -> &mut [u8] {
        let (ptr, len) =
            osal_hal::with_critical_section(&self.cs, || buf::adjust_tail(&self.heap, handle, delta));
        unsafe { core::slice::from_raw_parts_mut(ptr, len) }
    }

    // -- timers -----------------------------------------------------------

    pub fn start_timer(&mut self, task: TaskIndex, event: u16, timeout_ms: u32) -> Status {
        let timers = &mut self.timers;
        match osal_hal::with_critical_section(&self.cs, || {
            timers.start_timer(task, event, timeout_ms)
        }) {
            Some(_) => Status::Success,
            None => Status::NoTimerAvail,
        }
    }

    pub fn start_reload_timer(&mut self, task: TaskIndex, event: u16, timeout_ms: u32) -> Status {
        let timers = &mut self.timers;
        match osal_hal::with_critical_section(&self.cs, || {
            timers.start_reload_timer(task, event, timeout_ms)
        }) {
            Some(_) => Status::Success,
            None => Status::NoTimerAvail,
        }
    }

    /// `Status::InvalidEventId` if no timer is active for `(task, event)`;
    /// `Status::Success` once it has been tombstoned.
    pub fn stop_timer(&mut self, task: TaskIndex, event: u16) -> Status {
        let timers = &mut self.timers;
        osal_hal::with_critical_section(&self.cs, || timers.stop_timer(task, event))
    }

    pub fn timer_get_timeout(&mut self, task: TaskIndex, event: u16) -> Option<u32> {
        let timers = &mut self.timers;
        osal_hal::with_critical_section(&self.cs, || timers.get_timeout(task, event))
    }

    pub fn timer_num_active(&self) -> usize {
        self.timers.num_active()
    }

    pub fn timer_next_timeout(&self) -> Option<u32> {
        self.timers.next_timeout()
    }

    // -- clock ------------------------------------------------------------

    pub fn set_clock(&mut self, time: UtcTime) {
        let clock = &mut self.clock;
        osal_hal::with_critical_section(&self.cs, || clock.set_clock(time));
    }

    pub fn get_clock(&self) -> UtcTime {
        self.clock.get_clock()
    }

    /// Total milliseconds elapsed since boot (`system_ms`), unaffected by
    /// `set_clock`.
    pub fn system_millis(&self) -> u64 {
        self.clock.system_millis()
    }

    pub fn convert_utc_to_struct(&self, time: UtcTime) -> UtcTimeStruct {
        clock::convert_utc_to_struct(time)
    }

    pub fn convert_struct_to_utc(&self, time: &UtcTimeStruct) -> UtcTime {
        clock::convert_struct_to_utc(time)
    }

    // -- leases -------------------------------------------------------------

    pub fn lease_create(&mut self) -> Option<LeaseHandle> {
        let leases = &mut self.leases;
        osal_hal::with_critical_section(&self.cs, || leases.create())
    }

    pub fn lease_delete(&mut self, handle: LeaseHandle) {
        let leases = &mut self.leases;
        osal_hal::with_critical_section(&self.cs, || leases.delete(handle));
    }

    pub fn lease_take(&mut self, handle: LeaseHandle, hold_ms: u32) -> bool {
        let leases = &mut self.leases;
        osal_hal::with_critical_section(&self.cs, || leases.take(handle, hold_ms))
    }

    pub fn lease_release(&mut self, handle: LeaseHandle) {
        let leases = &mut self.leases;
        osal_hal::with_critical_section(&self.cs, || leases.release(handle));
    }

    pub fn lease_check(&self, handle: LeaseHandle) -> bool {
        self.leases.check(handle)
    }

    /// Remaining wait-ms for `handle` (`osal_mutex_check`'s numeric return),
    /// 0 if free.
    pub fn lease_remaining_ms(&self, handle: LeaseHandle) -> u32 {
        self.leases.remaining_ms(handle)
    }

    // -- ISRs ---------------------------------------------------------------

    pub fn register_isr(&mut self, id: u8, handler: IsrHandler) -> Status {
        let isrs = &mut self.isrs;
        osal_hal::with_critical_section(&self.cs, || isrs.register(id, handler))
    }

    pub fn enable_isr(&mut self, id: u8) -> Status {
        let isrs = &mut self.isrs;
        osal_hal::with_critical_section(&self.cs, || isrs.enable(id))
    }

    pub fn disable_isr(&mut self, id: u8) -> Status {
        let isrs = &mut self.isrs;
        osal_hal::with_critical_section(&self.cs, || isrs.disable(id))
    }

    /// Invoked by the application's real interrupt vector once it has
    /// identified which interrupt fired.
    pub fn dispatch_isr(&self, id: u8) {
        self.isrs.dispatch(id);
    }
}

pub use task::EventFn as TaskEventFn;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::HostCriticalSection;

    #[derive(Default)]
    struct NoTick;
    impl TickSource for NoTick {
        fn precision_count(&self) -> u32 {
            0
        }
    }

    fn noop(_task: TaskIndex, bits: u16) -> u16 {
        bits
    }

    #[test]
    fn new_rejects_an_empty_task_table() {
        let result = Kernel::<0, 64, 1, 1, 1, _, _>::new([], HostCriticalSection::new(), NoTick);
        assert_eq!(result.err(), Some(InitError::NoTasks));
    }

    #[test]
    fn adjust_timer_advances_clock_and_timers_in_one_step() {
        let mut kernel = Kernel::<1, 64, 1, 1, 1, _, _>::new(
            [TaskDescriptor {
                init_fn: None,
                event_fn: noop,
            }],
            HostCriticalSection::new(),
            NoTick,
        )
        .unwrap();
        kernel.start_timer(TaskIndex::new(0), 0x0001, 100);
        kernel.adjust_timer(40);
        assert_eq!(kernel.timer_get_timeout(TaskIndex::new(0), 0x0001), Some(60));
    }

    #[test]
    fn new_rejects_a_heap_too_small_for_one_block() {
        let result = Kernel::<1, 1, 1, 1, 1, _, _>::new(
            [TaskDescriptor {
                init_fn: None,
                event_fn: noop,
            }],
            HostCriticalSection::new(),
            NoTick,
        );
        assert_eq!(result.err(), Some(InitError::HeapTooSmall));
    }
}
