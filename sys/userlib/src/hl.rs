// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! High-level task interface.
//!
//! This is intended to provide a more ergonomic interface than the raw
//! `Kernel` methods. Every function here takes the kernel instance
//! explicitly: task code reaches it through whatever `static` the
//! application's dispatch loop owns, since `osal_kernel::task::EventFn` is a
//! plain function pointer with no kernel handle of its own.

use osal_abi::{MsgHeader, Status, TaskIndex, SYS_EVENT_MSG};
use osal_hal::{CriticalSection, TickSource};
use osal_kernel::msg::MsgHandle;
use osal_kernel::Kernel;

type K<const N: usize, const HEAP_BYTES: usize, const TIMERS: usize, const LEASES: usize, const ISRS: usize, C, T> =
    Kernel<N, HEAP_BYTES, TIMERS, LEASES, ISRS, C, T>;

/// Starts (or restarts) a one-shot wakeup: `event` will be set on `task`
/// after `timeout_ms` elapses. Built directly from `Kernel::start_timer`.
pub fn sleep_for<
    const N: usize,
    const HEAP_BYTES: usize,
    const TIMERS: usize,
    const LEASES: usize,
    const ISRS: usize,
    C: CriticalSection,
    T: TickSource,
>(
    kernel: &mut K<N, HEAP_BYTES, TIMERS, LEASES, ISRS, C, T>,
    task: TaskIndex,
    event: u16,
    timeout_ms: u32,
) -> Status {
    kernel.start_timer(task, event, timeout_ms)
}

/// Starts (or restarts) a periodic wakeup: `event` fires on `task` every
/// `period_ms`, not just once.
pub fn sleep_reload<
    const N: usize,
    const HEAP_BYTES: usize,
    const TIMERS: usize,
    const LEASES: usize,
    const ISRS: usize,
    C: CriticalSection,
    T: TickSource,
>(
    kernel: &mut K<N, HEAP_BYTES, TIMERS, LEASES, ISRS, C, T>,
    task: TaskIndex,
    event: u16,
    period_ms: u32,
) -> Status {
    kernel.start_reload_timer(task, event, period_ms)
}

/// Allocates a message, copies `payload` into it, and enqueues it on `dest`'s
/// inbox (FIFO), setting [`SYS_EVENT_MSG`] so `dest`'s next dispatch pass
/// sees it. Returns [`Status::MsgBufferNotAvail`] if the pool is exhausted,
/// without touching `dest`'s queue.
pub fn send_bytes<
    const N: usize,
    const HEAP_BYTES: usize,
    const TIMERS: usize,
    const LEASES: usize,
    const ISRS: usize,
    C: CriticalSection,
    T: TickSource,
>(
    kernel: &mut K<N, HEAP_BYTES, TIMERS, LEASES, ISRS, C, T>,
    dest: TaskIndex,
    payload: &[u8],
) -> Status {
    let Some(handle) = kernel.msg_allocate(payload.len() as u16) else {
        return Status::MsgBufferNotAvail;
    };
    kernel.msg_payload(handle).copy_from_slice(payload);
    kernel.msg_send(handle, dest)
}

/// Like [`send_bytes`], but jumps the queue (LIFO) instead of appending to
/// it -- the caller-facing analog of `Kernel::msg_push_front`, for urgent
/// messages that need to preempt whatever's already queued.
pub fn send_bytes_front<
    const N: usize,
    const HEAP_BYTES: usize,
    const TIMERS: usize,
    const LEASES: usize,
    const ISRS: usize,
    C: CriticalSection,
    T: TickSource,
>(
    kernel: &mut K<N, HEAP_BYTES, TIMERS, LEASES, ISRS, C, T>,
    dest: TaskIndex,
    payload: &[u8],
) -> Status {
    let Some(handle) = kernel.msg_allocate(payload.len() as u16) else {
        return Status::MsgBufferNotAvail;
    };
    kernel.msg_payload(handle).copy_from_slice(payload);
    kernel.msg_push_front(handle, dest)
}

/// Pops the next message addressed to `task`, copies it into `out`, frees
/// the underlying allocation, and returns the number of bytes copied. `out`
/// shorter than the message truncates it; `out` longer than the message
/// leaves the tail untouched.
pub fn receive_bytes<
    const N: usize,
    const HEAP_BYTES: usize,
    const TIMERS: usize,
    const LEASES: usize,
    const ISRS: usize,
    C: CriticalSection,
    T: TickSource,
>(
    kernel: &mut K<N, HEAP_BYTES, TIMERS, LEASES, ISRS, C, T>,
    task: TaskIndex,
    out: &mut [u8],
) -> Option<usize> {
    let handle = kernel.msg_receive(task)?;
    let payload = kernel.msg_payload(handle);
    let n = payload.len().min(out.len());
    out[..n].copy_from_slice(&payload[..n]);
    kernel.msg_deallocate(handle);
    Some(n)
}

/// Splits a task's pending event bits into the message-arrival bit and
/// everything else, the way an `event_fn` typically wants to handle them:
/// `on_message` is invoked once per queued message (draining the whole
/// inbox), `app_bits` is whatever's left over after [`SYS_EVENT_MSG`] is
/// stripped out. Returns the bits the caller should fold back into its
/// `event_fn`'s return value if `on_message` didn't finish draining the
/// queue (it never leaves messages behind here, so this is always 0, but
/// the signature matches `EventFn`'s leftover-bits convention for callers
/// that build further dispatch logic on top).
pub fn dispatch_messages<
    const N: usize,
    const HEAP_BYTES: usize,
    const TIMERS: usize,
    const LEASES: usize,
    const ISRS: usize,
    C: CriticalSection,
    T: TickSource,
>(
    kernel: &mut K<N, HEAP_BYTES, TIMERS, LEASES, ISRS, C, T>,
    task: TaskIndex,
    bits: u16,
    mut on_message: impl FnMut(&mut K<N, HEAP_BYTES, TIMERS, LEASES, ISRS, C, T>, MsgHandle),
) -> u16 {
    if bits & SYS_EVENT_MSG != 0 {
        while let Some(handle) = kernel.msg_receive(task) {
            on_message(kernel, handle);
        }
    }
    bits & !SYS_EVENT_MSG
}

/// Size of a message header plus `payload_len` bytes -- the allocation size
/// callers sizing their own message pool should budget per message.
pub const fn message_allocation_size(payload_len: usize) -> usize {
    core::mem::size_of::<MsgHeader>() + payload_len
}
