// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reference resolver: integer ids for objects seen during one call.
//!
//! The writer assigns dense ids by pointer identity; the reader keeps an
//! arena of materialized instances in the same order. Instances register
//! before their fields deserialize so back-references into a cycle
//! resolve to the instance under construction. State lives for a single
//! serialization call.

use crate::error::{SerdeError, SerdeResult};
use crate::model::value::{ObjRef, Record};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Wire tags for a reference slot.
pub const REF_NULL: u8 = 0;
pub const REF_BACKREF: u8 = 1;
pub const REF_NEW: u8 = 2;

/// Write-side identity map.
#[derive(Debug, Default)]
pub struct RefWriter {
    ids: HashMap<*const Mutex<Record>, u32>,
}

impl RefWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id previously assigned to this object, if any.
    pub fn existing_id(&self, obj: &ObjRef) -> Option<u32> {
        self.ids.get(&Arc::as_ptr(obj)).copied()
    }

    /// Assign the next dense id to a first-seen object.
    pub fn register(&mut self, obj: &ObjRef) -> u32 {
        let id = self.ids.len() as u32;
        self.ids.insert(Arc::as_ptr(obj), id);
        id
    }
}

/// Read-side arena of materialized instances.
#[derive(Debug, Default)]
pub struct RefReader {
    objects: Vec<ObjRef>,
}

impl RefReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly allocated instance. Must happen before its fields
    /// are read so cyclic back-references can resolve.
    pub fn register(&mut self, obj: &ObjRef) -> u32 {
        self.objects.push(obj.clone());
        (self.objects.len() - 1) as u32
    }

    pub fn get(&self, id: u32) -> SerdeResult<ObjRef> {
        self.objects
            .get(id as usize)
            .cloned()
            .ok_or_else(|| SerdeError::ProtocolViolation {
                reason: format!(
                    "back-reference {} out of range ({} objects materialized)",
                    id,
                    self.objects.len()
                ),
            })
    }
}
