// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Canonical partitioning and ordering of field descriptors.
//!
//! Both peers must emit the fields of a class definition in the same
//! sequence, so ordering is a pure function of the descriptor set and the
//! three wire-affecting flags. Primitives of equal size batch together;
//! descending size keeps wide scalars front-aligned.

use crate::model::descriptor::Descriptor;
use crate::model::type_ref::{PrimitiveKind, TypeRef};
use std::cmp::Reverse;

/// Descriptors partitioned into the four canonical groups.
#[derive(Debug)]
pub struct DescriptorGrouper {
    pub primitives: Vec<Descriptor>,
    pub boxed_primitives: Vec<Descriptor>,
    pub sealed_objects: Vec<Descriptor>,
    pub other_objects: Vec<Descriptor>,
}

impl DescriptorGrouper {
    /// Partition and order a descriptor set.
    ///
    /// Compressed `i32`/`i64` fields take effective size 1 so they sort to
    /// the tail of the primitive group. When `track_refs_for_basics` is
    /// set, boxed primitives flow through the reference resolver and are
    /// grouped with the other object fields.
    pub fn group(
        descriptors: Vec<Descriptor>,
        track_refs_for_basics: bool,
        compress_ints: bool,
        compress_longs: bool,
    ) -> Self {
        let mut primitives = Vec::new();
        let mut boxed_primitives = Vec::new();
        let mut sealed_objects = Vec::new();
        let mut other_objects = Vec::new();

        for descriptor in descriptors {
            match &descriptor.declared_type {
                TypeRef::Primitive(_) => primitives.push(descriptor),
                TypeRef::Boxed(_) if !track_refs_for_basics => {
                    boxed_primitives.push(descriptor)
                }
                TypeRef::Object { sealed: true, .. } => sealed_objects.push(descriptor),
                _ => other_objects.push(descriptor),
            }
        }

        let scalar_key = |descriptor: &Descriptor| {
            let kind = match &descriptor.declared_type {
                TypeRef::Primitive(kind) | TypeRef::Boxed(kind) => *kind,
                _ => PrimitiveKind::Bool,
            };
            let size = match kind {
                PrimitiveKind::I32 if compress_ints => 1,
                PrimitiveKind::I64 if compress_longs => 1,
                other => other.size(),
            };
            (Reverse(size), descriptor.name.clone())
        };
        primitives.sort_by_key(scalar_key);
        boxed_primitives.sort_by_key(scalar_key);

        let object_key =
            |descriptor: &Descriptor| (descriptor.declared_type.sort_name(), descriptor.name.clone());
        sealed_objects.sort_by_key(object_key);
        other_objects.sort_by_key(object_key);

        Self {
            primitives,
            boxed_primitives,
            sealed_objects,
            other_objects,
        }
    }

    /// Flatten the groups into the canonical wire sequence.
    pub fn into_ordered(self) -> Vec<Descriptor> {
        let mut ordered = self.primitives;
        ordered.extend(self.boxed_primitives);
        ordered.extend(self.sealed_objects);
        ordered.extend(self.other_objects);
        ordered
    }
}
