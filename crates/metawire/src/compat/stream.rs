// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Stream surface handed to custom per-ancestor hooks.
//!
//! `SlotWriteStream`/`SlotReadStream` expose exactly the operations the
//! legacy hierarchical stream protocol needs: structural default
//! read/write of the slot's declared fields, sparse by-name field records
//! (`PutField`/`GetField`), typed scalar helpers, reference-tracked and
//! unshared object slots, and post-construction validation registration.
//! Legacy operations outside that set fail with `unsupported-encoding`
//! rather than silently doing nothing, so migrations surface early.
//!
//! PutField/GetField value arrays are pooled per slot; the pool is
//! refilled even when a hook errors out (stream drop returns them).

use crate::classdef::ClassDef;
use crate::compat::consolidate::widen;
use crate::compat::slots::SlotInfo;
use crate::compat::structural::{Reader, Writer};
use crate::error::{SerdeError, SerdeResult};
use crate::model::value::{ObjRef, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Callback fired after the whole object graph has been read.
pub type ValidationCallback = Box<dyn Fn(&ObjRef) -> SerdeResult<()>>;

/// Pending validations, keyed by priority. Iterated in descending
/// priority; same-priority callbacks keep registration order.
pub(crate) type ValidationQueue = BTreeMap<i32, Vec<ValidationCallback>>;

fn not_active(reason: &str) -> SerdeError {
    SerdeError::NotActive {
        reason: reason.into(),
    }
}

fn unsupported(operation: &str, class: &str) -> SerdeError {
    SerdeError::UnsupportedEncoding {
        operation: operation.into(),
        class: class.into(),
    }
}

/// Sparse name-to-value record staged for emission.
pub struct PutField<'a> {
    slot: &'a SlotInfo,
    pub(crate) vals: Vec<Option<Value>>,
}

impl PutField<'_> {
    /// Stage a value for a declared field of this slot's class.
    pub fn put(&mut self, name: &str, value: impl Into<Value>) -> SerdeResult<()> {
        let index = self
            .slot
            .field_index(name)
            .ok_or_else(|| SerdeError::UnknownField {
                class: self.slot.class_name().to_owned(),
                field: name.to_owned(),
            })?;
        self.vals[index] = Some(value.into());
        Ok(())
    }
}

/// Field record populated from the wire in put-field order.
pub struct GetField<'a> {
    slot: &'a SlotInfo,
    pub(crate) vals: Vec<Option<Value>>,
}

impl GetField<'_> {
    /// Value for `name`, or `fallback` when the peer supplied none.
    pub fn get(&self, name: &str, fallback: impl Into<Value>) -> SerdeResult<Value> {
        let index = self.index_of(name)?;
        Ok(self.vals[index].clone().unwrap_or_else(|| fallback.into()))
    }

    /// Whether the peer supplied no value for `name`.
    pub fn defaulted(&self, name: &str) -> SerdeResult<bool> {
        let index = self.index_of(name)?;
        Ok(self.vals[index].is_none())
    }

    fn index_of(&self, name: &str) -> SerdeResult<usize> {
        self.slot
            .field_index(name)
            .ok_or_else(|| SerdeError::UnknownField {
                class: self.slot.class_name().to_owned(),
                field: name.to_owned(),
            })
    }
}

/// Scratch surface handed to a `write_self` hook.
pub struct SlotWriteStream<'a, 'w> {
    w: &'a mut Writer<'w>,
    slot: &'a SlotInfo,
    target: &'a ObjRef,
    cur_put: Option<PutField<'a>>,
    fields_written: bool,
}

impl<'a, 'w> SlotWriteStream<'a, 'w> {
    pub(crate) fn new(w: &'a mut Writer<'w>, slot: &'a SlotInfo, target: &'a ObjRef) -> Self {
        Self {
            w,
            slot,
            target,
            cur_put: None,
            fields_written: false,
        }
    }

    /// Write the slot's declared fields structurally. At most once per
    /// hook invocation.
    pub fn default_write(&mut self) -> SerdeResult<()> {
        if self.fields_written {
            return Err(not_active("slot fields already written"));
        }
        for field in self.slot.fields() {
            let value = self.target.lock().field_at(field.record_index).clone();
            self.w
                .write_field_value(&field.type_ref, field.nullable, &value)?;
        }
        self.fields_written = true;
        Ok(())
    }

    /// The active sparse field record, created on first use.
    pub fn put_fields(&mut self) -> &mut PutField<'a> {
        let slot = self.slot;
        self.cur_put.get_or_insert_with(|| PutField {
            slot,
            vals: slot.take_vals(),
        })
    }

    /// Emit the staged field record in put-field order, substituting the
    /// declared zero for unset entries, then recycle it.
    pub fn write_fields(&mut self) -> SerdeResult<()> {
        if self.fields_written {
            return Err(not_active("slot fields already written"));
        }
        if self.cur_put.is_none() {
            return Err(not_active("no active PutField record"));
        }
        for (index, field) in self.slot.fields().iter().enumerate() {
            let value = match &self.cur_put {
                Some(put) => put.vals[index]
                    .clone()
                    .unwrap_or_else(|| Value::zero_of(&field.type_ref)),
                None => Value::zero_of(&field.type_ref),
            };
            self.w
                .write_field_value(&field.type_ref, field.nullable, &value)?;
        }
        if let Some(put) = self.cur_put.take() {
            self.slot.return_vals(put.vals);
        }
        self.fields_written = true;
        Ok(())
    }

    /// Reference-tracked object slot.
    pub fn write_object(&mut self, value: &Value) -> SerdeResult<()> {
        self.w.write_ref(value)
    }

    /// Value-typed object slot; later occurrences cannot back-reference.
    pub fn write_unshared(&mut self, value: &Value) -> SerdeResult<()> {
        self.w.write_non_ref(value)
    }

    pub fn write_bool(&mut self, value: bool) {
        self.w.buf.write_bool(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.w.buf.write_i8(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.w.buf.write_i16(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.w.buf.write_i32(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.w.buf.write_i64(value);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.w.buf.write_f32(value);
    }

    pub fn write_f64(&mut self, value: f64) {
        self.w.buf.write_f64(value);
    }

    pub fn write_char(&mut self, value: char) {
        self.w.buf.write_char(value);
    }

    pub fn write_str(&mut self, value: &str) {
        self.w.buf.write_str(value);
    }

    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.w.buf.write_raw(bytes);
    }

    // Legacy stream operations this engine refuses to emulate.

    pub fn annotate_class(&mut self) -> SerdeResult<()> {
        Err(unsupported("annotate_class", self.slot.class_name()))
    }

    pub fn write_class_descriptor(&mut self) -> SerdeResult<()> {
        Err(unsupported("write_class_descriptor", self.slot.class_name()))
    }

    pub fn enable_replace_object(&mut self, _enable: bool) -> SerdeResult<()> {
        Err(unsupported("enable_replace_object", self.slot.class_name()))
    }

    pub fn reset(&mut self) -> SerdeResult<()> {
        Err(unsupported("reset", self.slot.class_name()))
    }

    pub fn write_stream_header(&mut self) -> SerdeResult<()> {
        Err(unsupported("write_stream_header", self.slot.class_name()))
    }

    pub fn use_protocol_version(&mut self, _version: i32) -> SerdeResult<()> {
        Err(unsupported("use_protocol_version", self.slot.class_name()))
    }
}

impl Drop for SlotWriteStream<'_, '_> {
    fn drop(&mut self) {
        if let Some(put) = self.cur_put.take() {
            self.slot.return_vals(put.vals);
        }
    }
}

/// Scratch surface handed to a `read_self` hook.
pub struct SlotReadStream<'a, 'r> {
    r: &'a mut Reader<'r>,
    slot: &'a SlotInfo,
    wire_def: &'a Arc<ClassDef>,
    target: &'a ObjRef,
    callbacks: &'a mut ValidationQueue,
    get: Option<GetField<'a>>,
    fields_read: bool,
}

impl<'a, 'r> SlotReadStream<'a, 'r> {
    pub(crate) fn new(
        r: &'a mut Reader<'r>,
        slot: &'a SlotInfo,
        wire_def: &'a Arc<ClassDef>,
        target: &'a ObjRef,
        callbacks: &'a mut ValidationQueue,
    ) -> Self {
        Self {
            r,
            slot,
            wire_def,
            target,
            callbacks,
            get: None,
            fields_read: false,
        }
    }

    /// Read the slot's fields structurally and assign them to the
    /// instance. At most once per hook invocation.
    pub fn default_read(&mut self) -> SerdeResult<()> {
        if self.fields_read {
            return Err(not_active("slot fields already read"));
        }
        let layout = self.r.engine.slot_record_layout(self.wire_def, self.slot);
        for field in &layout.fields {
            let value = self.r.read_field_value(&field.peer_type, field.nullable)?;
            if let Some(index) = field.accessor {
                let value = widen(value, field.local_type.as_ref());
                self.target.lock().set_field_at(index, value);
            }
        }
        self.fields_read = true;
        Ok(())
    }

    /// Populate a field record from the wire in put-field order. Entries
    /// the peer's layout does not carry stay absent.
    pub fn read_fields(&mut self) -> SerdeResult<&GetField<'a>> {
        if self.fields_read {
            return Err(not_active("slot fields already read"));
        }
        let layout = self.r.engine.slot_put_layout(self.wire_def, self.slot);
        let mut vals = self.slot.take_vals();
        for field in &layout.fields {
            match self.r.read_field_value(&field.peer_type, field.nullable) {
                Ok(value) => {
                    if let Some(index) = field.accessor {
                        vals[index] = Some(widen(value, field.local_type.as_ref()));
                    }
                }
                Err(err) => {
                    self.slot.return_vals(vals);
                    return Err(err);
                }
            }
        }
        self.fields_read = true;
        Ok(&*self.get.insert(GetField {
            slot: self.slot,
            vals,
        }))
    }

    /// Queue a callback to fire once the entire graph is materialized.
    /// Callbacks fire in descending priority, registration order within
    /// equal priority.
    pub fn register_validation(
        &mut self,
        callback: Option<ValidationCallback>,
        priority: i32,
    ) -> SerdeResult<()> {
        let callback = callback.ok_or_else(|| SerdeError::InvalidObject {
            reason: "null validation callback".into(),
        })?;
        self.callbacks.entry(priority).or_default().push(callback);
        Ok(())
    }

    /// Reference-tracked object slot.
    pub fn read_object(&mut self) -> SerdeResult<Value> {
        self.r.read_ref()
    }

    /// Value-typed object slot.
    pub fn read_unshared(&mut self) -> SerdeResult<Value> {
        self.r.read_non_ref()
    }

    pub fn read_bool(&mut self) -> SerdeResult<bool> {
        self.r.buf.read_bool()
    }

    pub fn read_i8(&mut self) -> SerdeResult<i8> {
        self.r.buf.read_i8()
    }

    pub fn read_i16(&mut self) -> SerdeResult<i16> {
        self.r.buf.read_i16()
    }

    pub fn read_i32(&mut self) -> SerdeResult<i32> {
        self.r.buf.read_i32()
    }

    pub fn read_i64(&mut self) -> SerdeResult<i64> {
        self.r.buf.read_i64()
    }

    pub fn read_f32(&mut self) -> SerdeResult<f32> {
        self.r.buf.read_f32()
    }

    pub fn read_f64(&mut self) -> SerdeResult<f64> {
        self.r.buf.read_f64()
    }

    pub fn read_char(&mut self) -> SerdeResult<char> {
        self.r.buf.read_char()
    }

    pub fn read_str(&mut self) -> SerdeResult<String> {
        self.r.buf.read_str()
    }

    pub fn read_raw(&mut self, len: usize) -> SerdeResult<Vec<u8>> {
        self.r.buf.read_raw(len)
    }

    pub fn skip(&mut self, n: usize) -> SerdeResult<()> {
        self.r.buf.advance(n)
    }

    pub fn available(&self) -> usize {
        self.r.buf.remaining()
    }

    // Legacy stream operations this engine refuses to emulate.

    pub fn read_line(&mut self) -> SerdeResult<String> {
        Err(unsupported("read_line", self.slot.class_name()))
    }

    pub fn reset(&mut self) -> SerdeResult<()> {
        Err(unsupported("reset", self.slot.class_name()))
    }

    pub fn use_protocol_version(&mut self, _version: i32) -> SerdeResult<()> {
        Err(unsupported("use_protocol_version", self.slot.class_name()))
    }
}

impl Drop for SlotReadStream<'_, '_> {
    fn drop(&mut self) {
        if let Some(get) = self.get.take() {
            self.slot.return_vals(get.vals);
        }
    }
}
