// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Consolidation: aligning a peer class definition with local fields.
//!
//! The output has the peer definition's exact length and order. An entry
//! carries a local accessor when the peer field matches a local field by
//! name and assignable type; otherwise the reader discards the value and
//! the writer emits the declared type's zero value.

use crate::classdef::ClassDef;
use crate::model::type_ref::TypeRef;
use crate::model::value::Value;
use crate::registry::RecordType;
use std::sync::Arc;

/// A local field a peer field may bind to.
#[derive(Debug, Clone)]
pub struct LocalBinding {
    pub name: String,
    pub type_ref: TypeRef,
    pub index: usize,
}

/// One entry of a consolidated read/write plan.
#[derive(Debug, Clone)]
pub struct ConsolidatedField {
    pub name: String,
    /// Type the peer declared; wire bytes follow this.
    pub peer_type: TypeRef,
    pub nullable: bool,
    /// Local field index, absent when the field only exists on the peer.
    pub accessor: Option<usize>,
    pub local_type: Option<TypeRef>,
}

/// Read/write plan for one (peer definition, local type) pair.
#[derive(Debug)]
pub struct ConsolidatedLayout {
    pub fields: Vec<ConsolidatedField>,
}

/// Bindings over a type's full serializable instance layout.
pub fn record_bindings(ty: &Arc<RecordType>) -> Vec<LocalBinding> {
    ty.merged_fields()
        .iter()
        .enumerate()
        .filter(|(_, field)| !field.excluded)
        .map(|(index, field)| LocalBinding {
            name: field.name.clone(),
            type_ref: field.type_ref.clone(),
            index,
        })
        .collect()
}

/// Produce the consolidated plan for a peer definition against a set of
/// local bindings.
pub fn consolidate(def: &ClassDef, bindings: &[LocalBinding]) -> ConsolidatedLayout {
    let fields = def
        .fields()
        .iter()
        .map(|peer| {
            let local = bindings
                .iter()
                .find(|b| b.name == peer.name && assignable(&peer.type_ref, &b.type_ref));
            if local.is_none() {
                log::debug!(
                    "peer field {}.{} has no local counterpart; values will be skipped",
                    def.class_name(),
                    peer.name
                );
            }
            ConsolidatedField {
                name: peer.name.clone(),
                peer_type: peer.type_ref.clone(),
                nullable: peer.nullable,
                accessor: local.map(|b| b.index),
                local_type: local.map(|b| b.type_ref.clone()),
            }
        })
        .collect();
    ConsolidatedLayout { fields }
}

/// Type compatibility under the widening rules: exact match, a numeric
/// primitive and its boxed form, a declared opaque type and any object
/// type, and arrays with recursively matching elements.
pub fn assignable(peer: &TypeRef, local: &TypeRef) -> bool {
    match (peer, local) {
        (TypeRef::Primitive(a), TypeRef::Primitive(b)) => a == b,
        (TypeRef::Boxed(a), TypeRef::Boxed(b)) => a == b,
        (TypeRef::Primitive(a), TypeRef::Boxed(b)) | (TypeRef::Boxed(a), TypeRef::Primitive(b)) => {
            a == b
        }
        (TypeRef::Str, TypeRef::Str) => true,
        (TypeRef::Opaque, TypeRef::Object { .. } | TypeRef::Array(_) | TypeRef::Opaque) => true,
        (TypeRef::Object { .. } | TypeRef::Array(_), TypeRef::Opaque) => true,
        (TypeRef::Array(a), TypeRef::Array(b)) => assignable(a, b),
        // The sealed flag may drift between versions without breaking
        // assignability.
        (
            TypeRef::Object { class_name: a, .. },
            TypeRef::Object { class_name: b, .. },
        ) => a == b,
        _ => false,
    }
}

/// Apply the widening cast when assigning a peer value to a local field:
/// a null boxed value lands in an unboxed field as its scalar zero.
pub(crate) fn widen(value: Value, local_type: Option<&TypeRef>) -> Value {
    match (&value, local_type) {
        (Value::Null, Some(TypeRef::Primitive(kind))) => Value::zero_scalar(*kind),
        _ => value,
    }
}
