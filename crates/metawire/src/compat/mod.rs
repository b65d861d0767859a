// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Compatibility engine: reconciles peer class definitions with local
//! types and moves field values across the wire in both structural and
//! slot (per-ancestor hook) modes.

pub mod consolidate;
pub mod layout_cache;
pub(crate) mod slots;
pub mod stream;
pub(crate) mod structural;

pub use consolidate::{ConsolidatedField, ConsolidatedLayout};
pub use stream::{GetField, PutField, SlotReadStream, SlotWriteStream};

#[cfg(test)]
mod tests;
