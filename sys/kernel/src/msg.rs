// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Variable-length message pool and per-task queues.
//!
//! Each message is one allocation from the kernel [`Heap`](crate::heap::Heap)
//! holding an [`osal_abi::MsgHeader`] immediately followed by the caller's
//! payload bytes, mirroring the layout
//! `original_source/.../OSAL.h`'s `osal_msg_hdr_t` describes. The header's
//! `next` field threads the message onto whichever queue currently owns it;
//! queues are represented purely as `Option<MsgHandle>` heads, so the same
//! `enqueue`/`dequeue`/`extract` primitives serve both a task's inbox and any
//! caller-supplied queue.

use core::mem::size_of;

use osal_abi::{MsgHeader, Status, TaskIndex};

use crate::heap::{Heap, HeapBlock};

/// Handle to a single allocated message. Wraps the same raw byte-offset
/// representation as [`HeapBlock`]; kept as a distinct type so a
/// `MsgHandle` can never be passed where a [`crate::buf::BufHandle`] is
/// expected even though both are ultimately heap offsets.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MsgHandle(HeapBlock);

const HDR: usize = size_of::<MsgHeader>();

impl MsgHandle {
    fn block(self) -> HeapBlock {
        self.0
    }
}

fn header_ptr<const BYTES: usize>(heap: &Heap<BYTES>, block: HeapBlock) -> *mut MsgHeader {
    heap.payload_ptr(block).cast()
}

/// Allocates a message large enough to hold `len` payload bytes. Returns
/// `None` (`MSG_BUFFER_NOT_AVAIL` at the call site) if the heap has no
/// sufficiently large free block.
pub fn allocate<const BYTES: usize>(heap: &Heap<BYTES>, len: u16) -> Option<MsgHandle> {
    let block = heap.alloc(HDR + len as usize)?;
    unsafe {
        header_ptr(heap, block).write(MsgHeader::new(len));
    }
    Some(MsgHandle(block))
}

/// Frees a message allocated by `allocate` that is not (or is no longer)
/// enqueued on any queue.
pub fn deallocate<const BYTES: usize>(heap: &Heap<BYTES>, handle: MsgHandle) {
    heap.free(handle.block());
}

/// Pointer to the first byte of `handle`'s payload, and its length in bytes.
pub fn payload<const BYTES: usize>(heap: &Heap<BYTES>, handle: MsgHandle) -> (*mut u8, usize) {
    let header = unsafe { &*header_ptr(heap, handle.block()) };
    let payload = unsafe { heap.payload_ptr(handle.block()).add(HDR) };
    (payload, header.len as usize)
}

fn next_of<const BYTES: usize>(heap: &Heap<BYTES>, handle: MsgHandle) -> Option<MsgHandle> {
    let raw = unsafe { (*header_ptr(heap, handle.block())).next };
    if raw == MsgHeader::NO_NEXT_MSG {
        None
    } else {
        Some(MsgHandle(HeapBlock::from_offset(raw)))
    }
}

fn set_next<const BYTES: usize>(heap: &Heap<BYTES>, handle: MsgHandle, next: Option<MsgHandle>) {
    let raw = next.map_or(MsgHeader::NO_NEXT_MSG, |h| h.block().offset());
    unsafe {
        (*header_ptr(heap, handle.block())).next = raw;
    }
}

/// Appends `handle` to the tail of the queue rooted at `*head`. Used for
/// FIFO delivery (`send`, `enqueue`).
pub fn enqueue<const BYTES: usize>(
    heap: &Heap<BYTES>,
    head: &mut Option<MsgHandle>,
    handle: MsgHandle,
) {
    set_next(heap, handle, None);
    match head {
        None => *head = Some(handle),
        Some(first) => {
            let mut cursor = *first;
            while let Some(next) = next_of(heap, cursor) {
                cursor = next;
            }
            set_next(heap, cursor, Some(handle));
        }
    }
}

/// Like [`enqueue`], but refuses to grow the queue past `max` entries,
/// returning the unqueued handle back to the caller so it can be freed or
/// retried (the caller-supplied-queue analog of a bounded mailbox).
pub fn enqueue_max<const BYTES: usize>(
    heap: &Heap<BYTES>,
    head: &mut Option<MsgHandle>,
    handle: MsgHandle,
    max: usize,
) -> Result<(), MsgHandle> {
    if count(heap, *head) >= max {
        return Err(handle);
    }
    enqueue(heap, head, handle);
    Ok(())
}

/// Prepends `handle` to the queue rooted at `*head` (LIFO delivery,
/// `push_front` / `push`).
pub fn push_front<const BYTES: usize>(
    heap: &Heap<BYTES>,
    head: &mut Option<MsgHandle>,
    handle: MsgHandle,
) {
    set_next(heap, handle, *head);
    *head = Some(handle);
}

/// Pops and returns the head of the queue rooted at `*head`, or `None` if
/// empty.
pub fn dequeue<const BYTES: usize>(
    heap: &Heap<BYTES>,
    head: &mut Option<MsgHandle>,
) -> Option<MsgHandle> {
    let first = (*head)?;
    *head = next_of(heap, first);
    Some(first)
}

/// Removes `target` from the queue rooted at `*head`, wherever it sits,
/// relinking around it. Returns whether `target` was found.
pub fn extract<const BYTES: usize>(
    heap: &Heap<BYTES>,
    head: &mut Option<MsgHandle>,
    target: MsgHandle,
) -> bool {
    let Some(first) = *head else { return false };
    if first == target {
        *head = next_of(heap, first);
        return true;
    }
    let mut cursor = first;
    while let Some(next) = next_of(heap, cursor) {
        if next == target {
            set_next(heap, cursor, next_of(heap, next));
            return true;
        }
        cursor = next;
    }
    false
}

/// Walks the queue rooted at `head`, returning the first message whose
/// first payload byte equals `event`. By convention, not by type-system
/// enforcement: `find`/`count` only work for messages whose caller prepended
/// a one-byte event tag of their own.
pub fn find<const BYTES: usize>(
    heap: &Heap<BYTES>,
    head: Option<MsgHandle>,
    event: u8,
) -> Option<MsgHandle> {
    let mut cursor = head;
    while let Some(handle) = cursor {
        let (ptr, len) = payload(heap, handle);
        if len > 0 && unsafe { *ptr } == event {
            return Some(handle);
        }
        cursor = next_of(heap, handle);
    }
    None
}

/// Counts every message in the queue rooted at `head`.
pub fn count<const BYTES: usize>(heap: &Heap<BYTES>, head: Option<MsgHandle>) -> usize {
    let mut n = 0;
    let mut cursor = head;
    while let Some(handle) = cursor {
        n += 1;
        cursor = next_of(heap, handle);
    }
    n
}

/// Counts messages in the queue rooted at `head` whose first payload byte
/// equals `event`.
pub fn count_matching<const BYTES: usize>(
    heap: &Heap<BYTES>,
    head: Option<MsgHandle>,
    event: u8,
) -> usize {
    let mut n = 0;
    let mut cursor = head;
    while let Some(handle) = cursor {
        let (ptr, len) = payload(heap, handle);
        if len > 0 && unsafe { *ptr } == event {
            n += 1;
        }
        cursor = next_of(heap, handle);
    }
    n
}

/// Sets the destination of a freshly allocated message. Does not enqueue it;
/// callers use [`enqueue`]/[`push_front`] against the destination task's
/// inbox after this.
pub fn set_destination<const BYTES: usize>(
    heap: &Heap<BYTES>,
    handle: MsgHandle,
    dest: TaskIndex,
) {
    unsafe {
        (*header_ptr(heap, handle.block())).dest_id = dest.0;
    }
}

pub fn destination<const BYTES: usize>(heap: &Heap<BYTES>, handle: MsgHandle) -> TaskIndex {
    TaskIndex(unsafe { (*header_ptr(heap, handle.block())).dest_id })
}

/// Status returned by operations that can run out of message pool space.
pub fn status_for_allocation(handle: Option<MsgHandle>) -> Status {
    match handle {
        Some(_) => Status::Success,
        None => Status::MsgBufferNotAvail,
    }
}
