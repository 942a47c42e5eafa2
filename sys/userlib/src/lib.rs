// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Task-facing support library.
//!
//! Task code never touches `osal-kernel`'s types directly for the common
//! cases; it calls the thin combinators in [`hl`] instead, which build on
//! top of a `&mut osal_kernel::Kernel<...>` the application holds (typically
//! in a `static` owned by the dispatch loop's entry point). This mirrors the
//! split the kernel's ABI crate already draws between wire types
//! (`osal-abi`, re-exported here) and the ergonomic surface built on top of
//! them.

#![cfg_attr(not(test), no_std)]

pub mod hl;

pub use osal_abi::*;
