// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared fixtures for the cross-module scenario tests under `tests/`.
//!
//! Each test builds its own `Kernel` instance (tasks don't carry state
//! between tests; tasks are created only during init, never dynamically),
//! but every test needs the same two things the real embedding
//! application would otherwise provide: a `CriticalSection` and a
//! `TickSource`. This crate supplies host stand-ins for both, the way the
//! teacher's own on-target `test-suite` stands in for hardware it doesn't
//! have in its simulated test harness.

use osal_hal::TickSource;
use osal_kernel::guard::HostCriticalSection;
use osal_kernel::Kernel;

/// A `TickSource` that never actually ticks on its own; every test built on
/// the `systick-irq` feature drives time explicitly via `Kernel::on_tick`
/// instead of letting `run_system` derive it from a free-running counter.
#[derive(Default)]
pub struct ManualTick;

impl TickSource for ManualTick {
    fn precision_count(&self) -> u32 {
        0
    }
}

/// Convenience alias for the kernel shape every scenario test below uses:
/// a small fixed task table, modest heap/timer/lease/ISR capacities, driven
/// by the host critical section and manual tick stand-ins.
pub type TestKernel<const N: usize> =
    Kernel<N, 4096, 8, 8, 8, HostCriticalSection, ManualTick>;

/// Builds a fresh kernel with `descriptors` and advances it by `ms`
/// milliseconds one millisecond at a time, matching the real
/// `systick-irq` tick interrupt calling `Kernel::on_tick` once per
/// millisecond.
pub fn advance_ms<const N: usize>(kernel: &mut TestKernel<N>, ms: u32) {
    for _ in 0..ms {
        kernel.on_tick();
    }
}

pub fn new_kernel<const N: usize>(
    descriptors: [osal_kernel::task::TaskDescriptor; N],
) -> TestKernel<N> {
    Kernel::new(descriptors, HostCriticalSection::new(), ManualTick)
        .expect("fixed-size test kernel configuration is always valid")
}
