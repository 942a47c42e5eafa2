// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Buffer manager: sized payload allocations with header/tail adjustment.
//!
//! Grounded in `original_source/.../OSAL_Bufmgr.c`: each allocation carries a
//! descriptor placed immediately before the payload recording the
//! *originally* allocated window, plus the caller's current view into it.
//! `adjust_header`/`adjust_tail` move the edges of that view without ever
//! moving or resizing the underlying heap allocation, and fail closed (the
//! pointer is returned unchanged) if the requested adjustment would walk
//! outside the original window -- exactly the bounds the original's
//! `START_PTR`/`END_PTR` comparison enforces, expressed here as a handle the
//! caller can't forge rather than an address range the caller could.

use core::mem::size_of;

use crate::heap::{Heap, HeapBlock};

#[repr(C)]
struct BufDescriptor {
    /// Total capacity of the underlying allocation, fixed at alloc time.
    capacity: u32,
    /// Start of the caller's current view, relative to the payload base.
    view_start: u32,
    /// Length of the caller's current view.
    view_len: u32,
}

const HDR: usize = size_of::<BufDescriptor>();

/// Handle to a single buffer-manager allocation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BufHandle(HeapBlock);

fn descriptor_ptr<const BYTES: usize>(heap: &Heap<BYTES>, block: HeapBlock) -> *mut BufDescriptor {
    heap.payload_ptr(block).cast()
}

/// Allocates a buffer with `size` bytes initially visible.
pub fn alloc<const BYTES: usize>(heap: &Heap<BYTES>, size: u16) -> Option<BufHandle> {
    let size = size as usize;
    let block = heap.alloc(HDR + size)?;
    unsafe {
        descriptor_ptr(heap, block).write(BufDescriptor {
            capacity: size as u32,
            view_start: 0,
            view_len: size as u32,
        });
    }
    Some(BufHandle(block))
}

pub fn free<const BYTES: usize>(heap: &Heap<BYTES>, handle: BufHandle) {
    heap.free(handle.0);
}

fn view_ptr<const BYTES: usize>(heap: &Heap<BYTES>, handle: BufHandle) -> (*mut u8, usize) {
    let descriptor = unsafe { &*descriptor_ptr(heap, handle.0) };
    let base = unsafe { heap.payload_ptr(handle.0).add(HDR) };
    (
        unsafe { base.add(descriptor.view_start as usize) },
        descriptor.view_len as usize,
    )
}

/// Current visible payload pointer and length.
pub fn payload<const BYTES: usize>(heap: &Heap<BYTES>, handle: BufHandle) -> (*mut u8, usize) {
    view_ptr(heap, handle)
}

/// Shifts the visible window's start by `-delta`: a positive `delta` moves
/// the start backward, growing the view to expose room for a header the
/// caller wants to prepend; a negative `delta` gives header room back,
/// shrinking the view from the front. Mirrors the original's signed `size`
/// parameter (`int16`), which this kernel's `u16`-only predecessor of this
/// function couldn't express. Fails (leaving the window unchanged) if the
/// new start would fall outside `[0, capacity]` -- there is no headroom
/// reserved beyond the descriptor itself, so growing a freshly allocated
/// buffer's header is always a no-op, matching the original bit for bit.
pub fn adjust_header<const BYTES: usize>(
    heap: &Heap<BYTES>,
    handle: BufHandle,
    delta: i32,
) -> (*mut u8, usize) {
    let descriptor = unsafe { &mut *descriptor_ptr(heap, handle.0) };
    let new_start = descriptor.view_start as i64 - delta as i64;
    let new_len = descriptor.view_len as i64 + delta as i64;
    if new_start >= 0 && new_len >= 0 && new_start + new_len <= descriptor.capacity as i64 {
        descriptor.view_start = new_start as u32;
        descriptor.view_len = new_len as u32;
    }
    view_ptr(heap, handle)
}

/// Shifts the visible window's end by `-delta`: a positive `delta` shrinks
/// the view from the back, a negative one gives previously trimmed tail
/// space back. Fails (leaving the window unchanged) if the new length would
/// fall outside `[0, capacity - view_start]`.
pub fn adjust_tail<const BYTES: usize>(
    heap: &Heap<BYTES>,
    handle: BufHandle,
    delta: i32,
) -> (*mut u8, usize) {
    let descriptor = unsafe { &mut *descriptor_ptr(heap, handle.0) };
    let new_len = descriptor.view_len as i64 - delta as i64;
    if new_len >= 0 && descriptor.view_start as i64 + new_len <= descriptor.capacity as i64 {
        descriptor.view_len = new_len as u32;
    }
    view_ptr(heap, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_buffer_exposes_full_size() {
        let heap: Heap<256> = Heap::new();
        heap.init();
        let b = alloc(&heap, 32).unwrap();
        let (_, len) = payload(&heap, b);
        assert_eq!(len, 32);
    }

    #[test]
    fn adjust_tail_shrinks_then_saturates() {
        let heap: Heap<256> = Heap::new();
        heap.init();
        let b = alloc(&heap, 32).unwrap();
        let (_, len) = adjust_tail(&heap, b, 8);
        assert_eq!(len, 24);
        // Shrinking past zero is a no-op, not a panic or wraparound.
        let (_, len) = adjust_tail(&heap, b, 255);
        assert_eq!(len, 24);
    }

    #[test]
    fn adjust_header_on_fresh_buffer_is_a_no_op() {
        // A freshly allocated buffer's view already starts at offset zero,
        // matching the original's START_PTR exactly, so there is no room to
        // move the start backward without leaving the allocation -- this
        // mirrors the original's behavior bit for bit.
        let heap: Heap<256> = Heap::new();
        heap.init();
        let b = alloc(&heap, 32).unwrap();
        let (_, len) = adjust_header(&heap, b, 4);
        assert_eq!(len, 32);
    }

    #[test]
    fn adjust_header_stays_a_no_op_regardless_of_prior_tail_adjustment() {
        // adjust_tail only ever moves the view's end, never its start, so
        // view_start remains zero (the original allocation's boundary) no
        // matter how the tail has been trimmed -- adjust_header has nothing
        // to reclaim.
        let heap: Heap<256> = Heap::new();
        heap.init();
        let b = alloc(&heap, 32).unwrap();
        adjust_tail(&heap, b, 16);
        let (_, len) = adjust_header(&heap, b, 4);
        assert_eq!(len, 16);
    }

    #[test]
    fn adjust_tail_then_negative_delta_round_trips() {
        // Trim the tail, then give the same space back with a negative
        // delta: the view returns to exactly where it started.
        let heap: Heap<256> = Heap::new();
        heap.init();
        let b = alloc(&heap, 32).unwrap();
        adjust_tail(&heap, b, 10);
        let (_, len) = adjust_tail(&heap, b, -10);
        assert_eq!(len, 32);
    }

    #[test]
    fn negative_header_delta_reclaims_space_then_positive_restores_it() {
        // Make room up front with a negative delta (shrinking the view from
        // the front without moving the underlying allocation), then restore
        // it with the matching positive delta.
        let heap: Heap<256> = Heap::new();
        heap.init();
        let b = alloc(&heap, 32).unwrap();
        let (_, len) = adjust_header(&heap, b, -8);
        assert_eq!(len, 24);
        let (_, len) = adjust_header(&heap, b, 8);
        assert_eq!(len, 32);
    }
}
