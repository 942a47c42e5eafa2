// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Construction-time error type.
//!
//! Separate from [`osal_abi::Status`] the same way the teacher keeps
//! `UserError` (a protocol-level response code) apart from `FaultInfo` (a
//! Rust-idiomatic internal error): `Status` is what a running task sees when
//! a syscall-equivalent fails at runtime, `InitError` is what a
//! misconfigured build fails with before the system ever starts scheduling
//! tasks.

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InitError {
    /// The heap arena is too small to hold even one minimally sized block.
    HeapTooSmall,
    /// The task table has zero entries; the dispatch loop requires at least
    /// one task to run.
    NoTasks,
}
