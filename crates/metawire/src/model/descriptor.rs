// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-field descriptors derived from a live type.

use crate::model::type_ref::TypeRef;
use crate::registry::RecordType;
use std::sync::Arc;

/// Description of a single serializable field.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub name: String,
    pub declared_type: TypeRef,
    /// Class in the ancestor chain that declares the field.
    pub owning_class: String,
    pub nullable: bool,
    /// Index into the instance field vector; `None` for a field that only
    /// exists on the peer side.
    pub accessor: Option<usize>,
}

impl Descriptor {
    /// Descriptors for the full serializable layout of a type (inherited
    /// fields included, excluded fields dropped), with accessors bound to
    /// the instance layout.
    pub fn for_type(ty: &Arc<RecordType>) -> Vec<Descriptor> {
        ty.merged_fields()
            .iter()
            .enumerate()
            .filter(|(_, field)| !field.excluded)
            .map(|(index, field)| Descriptor {
                name: field.name.clone(),
                declared_type: field.type_ref.clone(),
                owning_class: field.owner.clone(),
                nullable: field.nullable,
                accessor: Some(index),
            })
            .collect()
    }

    /// Descriptors for the fields one chain class declares itself, with
    /// accessors bound to `instance_ty`'s layout. This is the slot view:
    /// each ancestor serializes only its own declarations.
    pub fn for_own_fields(ty: &Arc<RecordType>, instance_ty: &Arc<RecordType>) -> Vec<Descriptor> {
        ty.own_fields()
            .iter()
            .filter(|field| !field.excluded)
            .map(|field| Descriptor {
                name: field.name.clone(),
                declared_type: field.type_ref.clone(),
                owning_class: ty.name().to_owned(),
                nullable: field.nullable,
                accessor: instance_ty.merged_index(&field.name),
            })
            .collect()
    }
}
