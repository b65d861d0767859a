// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Descriptor model: declared types, dynamic values, field descriptors and
//! the canonical field grouping.

pub mod descriptor;
pub mod grouper;
pub mod type_ref;
pub mod value;

pub use descriptor::Descriptor;
pub use grouper::DescriptorGrouper;
pub use type_ref::{PrimitiveKind, TypeRef};
pub use value::{ObjRef, Record, Value};
