// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cross-module scenario tests exercising the dispatch loop, timer wheel,
//! message pool, lease registry, and buffer manager together through a
//! single `Kernel` instance, the way the teacher's own `test-suite` crate
//! drives a whole image instead of one module.

use std::sync::atomic::{AtomicU16, Ordering};

use osal_abi::{Status, TaskIndex, SYS_EVENT_MSG};
use osal_kernel::task::TaskDescriptor;
use osal_tests_suite::{advance_ms, new_kernel};

const T0: TaskIndex = TaskIndex::new(0);
const T1: TaskIndex = TaskIndex::new(1);

fn noop(_task: TaskIndex, bits: u16) -> u16 {
    bits
}

static LAST_DISPATCH: AtomicU16 = AtomicU16::new(0);

fn record_dispatch(_task: TaskIndex, bits: u16) -> u16 {
    LAST_DISPATCH.store(bits, Ordering::SeqCst);
    0
}

/// A one-shot timer sets its event only once the full delay has elapsed,
/// and dispatch clears it again on the next pass.
#[test]
fn one_shot_timer_fires_event_on_dispatch() {
    let mut kernel = new_kernel([TaskDescriptor {
        init_fn: None,
        event_fn: record_dispatch,
    }]);

    assert_eq!(kernel.start_timer(T0, 0x0002, 5), Status::Success);

    advance_ms(&mut kernel, 4);
    assert_eq!(kernel.event_bits(T0), 0, "timer must not fire early");

    advance_ms(&mut kernel, 1);
    assert_eq!(kernel.event_bits(T0), 0x0002);

    LAST_DISPATCH.store(0, Ordering::SeqCst);
    kernel.run_system();
    assert_eq!(LAST_DISPATCH.load(Ordering::SeqCst), 0x0002);
    assert_eq!(kernel.event_bits(T0), 0, "dispatch clears delivered bits");
}

/// A reload timer fires once per period and keeps running instead of
/// being reaped, with its remaining time reflecting the current cycle.
#[test]
fn reload_timer_repeats_and_survives() {
    let mut kernel = new_kernel([TaskDescriptor {
        init_fn: None,
        event_fn: noop,
    }]);

    kernel.start_reload_timer(T0, 0x0004, 10);

    advance_ms(&mut kernel, 9);
    assert_eq!(kernel.event_bits(T0), 0);
    advance_ms(&mut kernel, 1); // t=10: first expiry
    assert_eq!(kernel.event_bits(T0), 0x0004);
    assert_eq!(kernel.timer_get_timeout(T0, 0x0004), Some(10));
    kernel.run_system();
    assert_eq!(kernel.event_bits(T0), 0);

    advance_ms(&mut kernel, 10); // t=20: second expiry
    assert_eq!(kernel.event_bits(T0), 0x0004);
    kernel.run_system();

    advance_ms(&mut kernel, 5); // t=25: partway through the third cycle
    assert_eq!(kernel.timer_get_timeout(T0, 0x0004), Some(5));
    assert_eq!(kernel.timer_num_active(), 1);
}

/// A message allocated and sent from one task is observed, in order, on
/// the destination's queue, with SYS_EVENT_MSG set in between.
#[test]
fn message_round_trip() {
    let mut kernel = new_kernel([
        TaskDescriptor {
            init_fn: None,
            event_fn: noop,
        },
        TaskDescriptor {
            init_fn: None,
            event_fn: record_dispatch,
        },
    ]);

    let msg = kernel.msg_allocate(8).expect("pool has room");
    kernel
        .msg_payload(msg)
        .copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(kernel.msg_send(msg, T1), Status::Success);
    assert_eq!(kernel.event_bits(T1) & SYS_EVENT_MSG, SYS_EVENT_MSG);

    LAST_DISPATCH.store(0, Ordering::SeqCst);
    kernel.run_system();
    assert_eq!(LAST_DISPATCH.load(Ordering::SeqCst) & SYS_EVENT_MSG, SYS_EVENT_MSG);
    assert_eq!(kernel.event_bits(T1), 0);

    let received = kernel.msg_receive(T1).expect("message is queued");
    assert_eq!(kernel.msg_payload(received), &[1, 2, 3, 4, 5, 6, 7, 8]);
    kernel.msg_deallocate(received);
    assert!(kernel.msg_receive(T1).is_none());
}

/// Send order is preserved FIFO, but `push_front` jumps the queue ahead of
/// everything already pending.
#[test]
fn message_queue_fifo_except_push_front() {
    let mut kernel = new_kernel([TaskDescriptor {
        init_fn: None,
        event_fn: noop,
    }]);

    let a = kernel.msg_allocate(1).unwrap();
    kernel.msg_payload(a)[0] = b'a';
    let b = kernel.msg_allocate(1).unwrap();
    kernel.msg_payload(b)[0] = b'b';
    let c = kernel.msg_allocate(1).unwrap();
    kernel.msg_payload(c)[0] = b'c';

    kernel.msg_send(a, T0);
    kernel.msg_send(b, T0);
    kernel.msg_push_front(c, T0);

    let order: Vec<u8> = std::iter::from_fn(|| {
        kernel.msg_receive(T0).map(|h| {
            let byte = kernel.msg_payload(h)[0];
            kernel.msg_deallocate(h);
            byte
        })
    })
    .collect();

    assert_eq!(order, vec![b'c', b'a', b'b']);
}

/// A lease self-releases once its hold time elapses, with no
/// notification to the original acquirer; a later `take` then succeeds.
#[test]
fn lease_self_expires_and_is_reacquirable() {
    let mut kernel = new_kernel([TaskDescriptor {
        init_fn: None,
        event_fn: noop,
    }]);

    let lease = kernel.lease_create().expect("registry has room");
    assert!(kernel.lease_take(lease, 100));
    assert_eq!(kernel.lease_remaining_ms(lease), 100);

    advance_ms(&mut kernel, 60);
    assert_eq!(kernel.lease_remaining_ms(lease), 40);
    assert!(kernel.lease_check(lease));
    assert!(!kernel.lease_take(lease, 10), "still held, second take fails");

    advance_ms(&mut kernel, 50);
    assert_eq!(kernel.lease_remaining_ms(lease), 0);
    assert!(!kernel.lease_check(lease));

    assert!(kernel.lease_take(lease, 200), "expired lease is reacquirable");
}

/// Header adjustment walks within the originally allocated window and
/// fails closed outside it, grounded in `OSAL_Bufmgr.c`'s bounds check
/// (`new_payload_ptr >= START_PTR(bd_ptr)`), which never admits growing a
/// *fresh* allocation's header past its own payload start.
#[test]
fn buffer_header_and_tail_adjustment() {
    let kernel = new_kernel([TaskDescriptor {
        init_fn: None,
        event_fn: noop,
    }]);

    let buf = kernel.buf_alloc(16).expect("heap has room");
    assert_eq!(kernel.buf_payload(buf).len(), 16);

    // No headroom exists yet on a fresh allocation, so growing it is a
    // no-op -- only a prior shrink creates room to give back.
    assert_eq!(kernel.buf_adjust_header(buf, 4).len(), 16);

    assert_eq!(kernel.buf_adjust_header(buf, -4).len(), 12);
    assert_eq!(kernel.buf_adjust_header(buf, 4).len(), 16);

    assert_eq!(kernel.buf_adjust_tail(buf, 4).len(), 12);
    assert_eq!(kernel.buf_adjust_tail(buf, -4).len(), 16);

    // Out-of-range adjustments are rejected, leaving the view untouched.
    assert_eq!(kernel.buf_adjust_header(buf, 100).len(), 16);

    kernel.buf_free(buf);
}

/// Tick advances move the clock by exactly the elapsed time and age every
/// timer down by the same amount, regardless of how finely the elapsed time
/// is sliced across `on_tick` calls.
#[test]
fn invariant_clock_and_timers_age_by_elapsed_ms() {
    let mut kernel = new_kernel([TaskDescriptor {
        init_fn: None,
        event_fn: noop,
    }]);

    kernel.start_timer(T0, 0x0001, 1000);
    let before = kernel.get_clock();
    advance_ms(&mut kernel, 400);
    let after = kernel.get_clock();

    assert_eq!(u64::from(after) - u64::from(before), 0, "400ms hasn't rolled a whole second yet");
    assert_eq!(kernel.timer_get_timeout(T0, 0x0001), Some(600));
}

/// Setting then clearing the same bits is a no-op on a task's event word,
/// regardless of what other bits are set in between.
#[test]
fn invariant_set_then_clear_event_round_trips() {
    let mut kernel = new_kernel([TaskDescriptor {
        init_fn: None,
        event_fn: noop,
    }]);

    kernel.set_event(T0, 0x0010);
    let before = kernel.event_bits(T0);
    kernel.set_event(T0, 0x0002);
    kernel.clear_event(T0, 0x0002);
    assert_eq!(kernel.event_bits(T0), before);
}
