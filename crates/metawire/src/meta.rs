// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-peer session cache of shared class definitions.
//!
//! A `MetaContext` covers one direction of one peer pairing and persists
//! across messages. Each serialized object is preceded by a class handle:
//! `0` announces a definition that follows inline, any other value is
//! `handle + 1` into the definitions already exchanged. Handles are dense,
//! monotonic, and never reused within a context.

use crate::buffer::WireBuffer;
use crate::classdef::ClassDef;
use crate::error::{SerdeError, SerdeResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Session state for meta sharing.
#[derive(Debug, Default)]
pub struct MetaContext {
    /// Definitions already sent, keyed by definition id: one handle per
    /// distinct definition, even when several cover the same class name.
    class_to_handle: HashMap<u64, u32>,
    /// Definitions received from the peer, in arrival order.
    read_defs: Vec<Arc<ClassDef>>,
    /// Definitions registered during the in-flight message, drained at
    /// the emission point.
    pending_defs: Vec<Arc<ClassDef>>,
}

impl MetaContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of definitions this side has shared so far.
    pub fn shared_count(&self) -> usize {
        self.class_to_handle.len()
    }

    /// Definitions received from the peer so far.
    pub fn read_defs(&self) -> &[Arc<ClassDef>] {
        &self.read_defs
    }

    /// Emit the class handle for `def`, sharing the definition inline on
    /// first occurrence. With `share` disabled the definition is written
    /// inline every time and no handle is remembered.
    pub fn write_class(
        &mut self,
        buf: &mut WireBuffer,
        def: &Arc<ClassDef>,
        share: bool,
    ) -> SerdeResult<()> {
        if share {
            if let Some(&handle) = self.class_to_handle.get(&def.id()) {
                buf.write_var_u32(handle + 1);
                return Ok(());
            }
        }
        buf.write_var_u32(0);
        self.pending_defs.push(def.clone());
        for pending in self.pending_defs.drain(..) {
            pending.encode(buf);
            if share {
                let handle = self.class_to_handle.len() as u32;
                log::debug!(
                    "sharing class definition {} (id {:016x}) as handle {}",
                    pending.class_name(),
                    pending.id(),
                    handle
                );
                self.class_to_handle.insert(pending.id(), handle);
            }
        }
        Ok(())
    }

    /// Read a class handle, materializing an inline definition when the
    /// peer announces a new one.
    pub fn read_class(&mut self, buf: &mut WireBuffer) -> SerdeResult<Arc<ClassDef>> {
        let handle = buf.read_var_u32()?;
        if handle == 0 {
            let def = Arc::new(ClassDef::decode(buf)?);
            log::debug!(
                "received class definition {} (id {:016x}) as handle {}",
                def.class_name(),
                def.id(),
                self.read_defs.len()
            );
            self.read_defs.push(def.clone());
            return Ok(def);
        }
        let index = (handle - 1) as usize;
        self.read_defs
            .get(index)
            .cloned()
            .ok_or_else(|| SerdeError::ProtocolViolation {
                reason: format!(
                    "class handle {} out of range ({} definitions received)",
                    index,
                    self.read_defs.len()
                ),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SerdeConfig;
    use crate::model::type_ref::{PrimitiveKind, TypeRef};
    use crate::registry::RecordType;

    fn point_def() -> Arc<ClassDef> {
        let ty = RecordType::builder("Point")
            .field("x", TypeRef::Primitive(PrimitiveKind::I32))
            .field("y", TypeRef::Primitive(PrimitiveKind::I32))
            .build();
        Arc::new(ClassDef::from_type(&ty, &SerdeConfig::default()))
    }

    #[test]
    fn test_definition_shared_once_then_by_handle() {
        let def = point_def();
        let mut writer = MetaContext::new();
        let mut buf = WireBuffer::new();

        writer
            .write_class(&mut buf, &def, true)
            .expect("write class should succeed");
        let first_len = buf.as_slice().len();
        writer
            .write_class(&mut buf, &def, true)
            .expect("write class should succeed");
        // Second occurrence is a bare one-byte handle.
        assert_eq!(buf.as_slice().len(), first_len + 1);
        assert_eq!(writer.shared_count(), 1);

        let mut reader = MetaContext::new();
        let a = reader.read_class(&mut buf).expect("read class should succeed");
        let b = reader.read_class(&mut buf).expect("read class should succeed");
        assert_eq!(a.id(), def.id());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(reader.read_defs().len(), 1);
    }

    #[test]
    fn test_share_disabled_repeats_inline_definition() {
        let def = point_def();
        let mut writer = MetaContext::new();
        let mut buf = WireBuffer::new();

        writer
            .write_class(&mut buf, &def, false)
            .expect("write class should succeed");
        let first_len = buf.as_slice().len();
        writer
            .write_class(&mut buf, &def, false)
            .expect("write class should succeed");
        assert_eq!(buf.as_slice().len(), first_len * 2);
        assert_eq!(writer.shared_count(), 0);

        let mut reader = MetaContext::new();
        let a = reader.read_class(&mut buf).expect("read class should succeed");
        let b = reader.read_class(&mut buf).expect("read class should succeed");
        assert_eq!(a.id(), b.id());
        assert_eq!(reader.read_defs().len(), 2);
    }

    #[test]
    fn test_out_of_range_handle_is_fatal() {
        let mut buf = WireBuffer::new();
        buf.write_var_u32(5);
        let mut reader = MetaContext::new();
        let err = reader.read_class(&mut buf).unwrap_err();
        assert!(matches!(err, SerdeError::ProtocolViolation { .. }));
    }

    #[test]
    fn test_context_persists_across_messages() {
        let def = point_def();
        let mut writer = MetaContext::new();
        let mut reader = MetaContext::new();

        let mut first = WireBuffer::new();
        writer
            .write_class(&mut first, &def, true)
            .expect("write class should succeed");
        reader
            .read_class(&mut first)
            .expect("read class should succeed");

        // New message, same contexts: only the handle travels.
        let mut second = WireBuffer::new();
        writer
            .write_class(&mut second, &def, true)
            .expect("write class should succeed");
        assert_eq!(second.as_slice(), [1]);
        let again = reader
            .read_class(&mut second)
            .expect("read class should succeed");
        assert_eq!(again.id(), def.id());
    }
}
