// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Board-support collaborator contract.
//!
//! Everything in this crate is consumed by `osal-kernel`, never implemented
//! by it: board-support HAL, GPIO drivers, clock sources and the rest of the
//! real hardware surface are out of scope for the kernel core and are
//! expressed here only as the trait boundary the kernel calls through. This
//! plays the same role as `kern::arch` does in a cross-compiled kernel image,
//! except expressed as traits the embedding application implements, since
//! this kernel has no architecture-specific code of its own to conditionally
//! select between.

#![cfg_attr(not(test), no_std)]

pub use osal_abi::*;

/// A scoped critical section: disables interrupts globally on `enter`,
/// restores the previous state on `exit`. Every mutation of the kernel's
/// shared lists (message queues, timer list, lease list, buffer descriptor
/// list, task event bitfields) happens between a matched `enter`/`exit` pair.
///
/// Implementations must support nesting: `exit` must restore the state that
/// was current immediately before the matching `enter`, not a fixed
/// "interrupts on" state, so that a nested section doesn't prematurely
/// re-enable interrupts disabled by an outer one.
pub trait CriticalSection {
    /// Opaque previous interrupt state, returned by `enter` and consumed by
    /// the matching `exit`.
    type State;

    fn enter(&self) -> Self::State;
    fn exit(&self, state: Self::State);
}

/// Runs `f` with interrupts disabled, restoring the previous state
/// afterward regardless of how `f` returns.
pub fn with_critical_section<C, R>(cs: &C, f: impl FnOnce() -> R) -> R
where
    C: CriticalSection,
{
    let state = cs.enter();
    let result = f();
    cs.exit(state);
    result
}

/// Source of wall-clock ticks, selected at build time by the `systick-irq`
/// feature.
///
/// Under `systick-irq`, the embedding application calls
/// [`Kernel::on_tick`](../osal_kernel/struct.Kernel.html#method.on_tick) once
/// per millisecond from the tick interrupt and this trait is unused. Without
/// it, the dispatch loop polls [`precision_count`](TickSource::precision_count)
/// each pass and derives elapsed 320-microsecond ticks from its rollover,
/// exactly as the free-running MAC precision counter path does in the system
/// this kernel reimplements.
pub trait TickSource {
    /// Monotonic, free-running count of 320-microsecond ticks. Wraps at
    /// `u32::MAX`; callers must compute elapsed ticks with wrapping
    /// subtraction.
    fn precision_count(&self) -> u32;

    /// Enables the periodic tick interrupt (`systick-irq` builds only).
    fn systick_int_enable(&self) {}

    /// Disables the periodic tick interrupt (`systick-irq` builds only).
    fn systick_int_disable(&self) {}

    /// Enters a low-power idle state until the next tick or interrupt, or
    /// until `deadline_ms` elapses, whichever comes first. Only called when
    /// the `power-saving` feature is enabled and the dispatch loop found no
    /// task with pending events; `deadline_ms` is the kernel's own
    /// `next_timeout()` at the moment of the call (`None` if no timer is
    /// active), letting the implementation program a wakeup alarm instead of
    /// waking on every tick only to find nothing ready.
    fn idle_until_tick(&self, deadline_ms: Option<u32>) {
        let _ = deadline_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct RecordingCs<'a> {
        depth: &'a Cell<u32>,
        max_depth: &'a Cell<u32>,
    }

    impl<'a> CriticalSection for RecordingCs<'a> {
        type State = u32;

        fn enter(&self) -> u32 {
            let prev = self.depth.get();
            self.depth.set(prev + 1);
            self.max_depth.set(self.max_depth.get().max(prev + 1));
            prev
        }

        fn exit(&self, prev: u32) {
            self.depth.set(prev);
        }
    }

    #[test]
    fn nested_sections_restore_prior_depth() {
        let depth = Cell::new(0);
        let max_depth = Cell::new(0);
        let cs = RecordingCs {
            depth: &depth,
            max_depth: &max_depth,
        };

        with_critical_section(&cs, || {
            assert_eq!(depth.get(), 1);
            with_critical_section(&cs, || {
                assert_eq!(depth.get(), 2);
            });
            assert_eq!(depth.get(), 1);
        });

        assert_eq!(depth.get(), 0);
        assert_eq!(max_depth.get(), 2);
    }
}
