// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Structural-mode read/write paths.
//!
//! A `Writer`/`Reader` owns the per-call reference state and threads the
//! buffer and meta context through the object graph. Field bytes always
//! follow the declared type of the class definition governing the
//! record, so both peers walk the same sequence.

use crate::buffer::WireBuffer;
use crate::classdef::ClassDef;
use crate::compat::consolidate::{widen, ConsolidatedField};
use crate::engine::Engine;
use crate::error::{SerdeError, SerdeResult};
use crate::meta::MetaContext;
use crate::model::type_ref::{PrimitiveKind, TypeRef};
use crate::model::value::{ObjRef, Record, Value};
use crate::resolver::{RefReader, RefWriter, REF_BACKREF, REF_NEW, REF_NULL};
use std::sync::Arc;

fn value_mismatch(expected: &str, found: &Value) -> SerdeError {
    SerdeError::SchemaMismatch {
        reason: format!("expected a {} value, found {:?}", expected, found),
    }
}

/// Write half of one serialization call.
pub(crate) struct Writer<'a> {
    pub engine: &'a Engine,
    pub buf: &'a mut WireBuffer,
    pub meta: &'a mut MetaContext,
    pub refs: RefWriter,
}

impl<'a> Writer<'a> {
    pub fn new(engine: &'a Engine, buf: &'a mut WireBuffer, meta: &'a mut MetaContext) -> Self {
        Self {
            engine,
            buf,
            meta,
            refs: RefWriter::new(),
        }
    }

    /// Emit the root object, optionally against a pre-configured peer
    /// definition instead of the type's own.
    pub fn write_root(&mut self, obj: &ObjRef, as_def: Option<&Arc<ClassDef>>) -> SerdeResult<()> {
        self.buf.write_u8(REF_NEW);
        self.refs.register(obj);
        let ty = obj.lock().class().clone();
        match as_def {
            Some(def) => self.write_record_as(obj, &ty, def),
            None => self.write_record(obj),
        }
    }

    /// Reference-tracked object slot: null, back-reference, or a new
    /// record introduced by its own class handle.
    pub fn write_ref(&mut self, value: &Value) -> SerdeResult<()> {
        match value {
            Value::Null => {
                self.buf.write_u8(REF_NULL);
                Ok(())
            }
            Value::Object(obj) => {
                if let Some(id) = self.refs.existing_id(obj) {
                    self.buf.write_u8(REF_BACKREF);
                    self.buf.write_var_u32(id);
                    return Ok(());
                }
                self.buf.write_u8(REF_NEW);
                self.refs.register(obj);
                self.write_record(obj)
            }
            other => Err(value_mismatch("record", other)),
        }
    }

    /// Value-typed embedding: the object is written inline without an id,
    /// so later occurrences cannot point back at it.
    pub fn write_non_ref(&mut self, value: &Value) -> SerdeResult<()> {
        match value {
            Value::Null => {
                self.buf.write_u8(REF_NULL);
                Ok(())
            }
            Value::Object(obj) => {
                self.buf.write_u8(REF_NEW);
                self.write_record(obj)
            }
            other => Err(value_mismatch("record", other)),
        }
    }

    fn write_record(&mut self, obj: &ObjRef) -> SerdeResult<()> {
        let ty = obj.lock().class().clone();
        let def = self.engine.class_def_for(&ty);
        self.write_record_as(obj, &ty, &def)
    }

    fn write_record_as(
        &mut self,
        obj: &ObjRef,
        ty: &Arc<crate::registry::RecordType>,
        def: &Arc<ClassDef>,
    ) -> SerdeResult<()> {
        if !ty.serializable() {
            return Err(SerdeError::InvalidObject {
                reason: format!("type {} is not serializable", ty.name()),
            });
        }
        let share = self.engine.config().meta_share_enabled;
        self.meta.write_class(self.buf, def, share)?;
        if self.engine.config().check_class_version {
            self.buf.write_u64(def.id());
        }
        if ty.chain_has_custom_io() {
            let serializer = self.engine.slot_serializer(ty)?;
            serializer.write(self, obj)
        } else {
            let layout = self.engine.record_layout(def, ty);
            self.write_layout(&layout.fields, obj)
        }
    }

    /// Emit field values in consolidated order; entries without an
    /// accessor get the declared type's zero value.
    pub(crate) fn write_layout(
        &mut self,
        fields: &[ConsolidatedField],
        obj: &ObjRef,
    ) -> SerdeResult<()> {
        for field in fields {
            let value = match field.accessor {
                Some(index) => obj.lock().field_at(index).clone(),
                None => Value::zero_of(&field.peer_type),
            };
            self.write_field_value(&field.peer_type, field.nullable, &value)?;
        }
        Ok(())
    }

    pub(crate) fn write_field_value(
        &mut self,
        type_ref: &TypeRef,
        nullable: bool,
        value: &Value,
    ) -> SerdeResult<()> {
        match type_ref {
            TypeRef::Primitive(kind) => self.write_scalar(*kind, value),
            TypeRef::Boxed(kind) => {
                if value.is_null() {
                    self.buf.write_u8(0);
                    Ok(())
                } else {
                    self.buf.write_u8(1);
                    self.write_scalar(*kind, value)
                }
            }
            TypeRef::Str => {
                if nullable {
                    if value.is_null() {
                        self.buf.write_u8(0);
                        return Ok(());
                    }
                    self.buf.write_u8(1);
                }
                match value {
                    Value::Str(s) => self.buf.write_str(s),
                    Value::Null => self.buf.write_str(""),
                    other => return Err(value_mismatch("string", other)),
                }
                Ok(())
            }
            TypeRef::Object { .. } | TypeRef::Opaque => self.write_ref(value),
            TypeRef::Array(element) => {
                if nullable {
                    if value.is_null() {
                        self.buf.write_u8(0);
                        return Ok(());
                    }
                    self.buf.write_u8(1);
                }
                let items = match value {
                    Value::Array(items) => items.as_slice(),
                    Value::Null => &[],
                    other => return Err(value_mismatch("array", other)),
                };
                self.buf.write_var_u32(items.len() as u32);
                for item in items {
                    self.write_field_value(element, true, item)?;
                }
                Ok(())
            }
        }
    }

    fn write_scalar(&mut self, kind: PrimitiveKind, value: &Value) -> SerdeResult<()> {
        let zero;
        let value = match value {
            Value::Null => {
                zero = Value::zero_scalar(kind);
                &zero
            }
            other => other,
        };
        match (kind, value) {
            (PrimitiveKind::Bool, Value::Bool(v)) => self.buf.write_bool(*v),
            (PrimitiveKind::I8, Value::I8(v)) => self.buf.write_i8(*v),
            (PrimitiveKind::I16, Value::I16(v)) => self.buf.write_i16(*v),
            (PrimitiveKind::I32, Value::I32(v)) => {
                if self.engine.config().compress_ints {
                    self.buf.write_var_i32(*v);
                } else {
                    self.buf.write_i32(*v);
                }
            }
            (PrimitiveKind::I64, Value::I64(v)) => {
                if self.engine.config().compress_longs {
                    self.buf.write_var_i64(*v);
                } else {
                    self.buf.write_i64(*v);
                }
            }
            (PrimitiveKind::F32, Value::F32(v)) => self.buf.write_f32(*v),
            (PrimitiveKind::F64, Value::F64(v)) => self.buf.write_f64(*v),
            (PrimitiveKind::Char, Value::Char(v)) => self.buf.write_char(*v),
            (kind, other) => return Err(value_mismatch(&kind.to_string(), other)),
        }
        Ok(())
    }
}

/// Read half of one deserialization call.
pub(crate) struct Reader<'a> {
    pub engine: &'a Engine,
    pub buf: &'a mut WireBuffer,
    pub meta: &'a mut MetaContext,
    pub refs: RefReader,
}

impl<'a> Reader<'a> {
    pub fn new(engine: &'a Engine, buf: &'a mut WireBuffer, meta: &'a mut MetaContext) -> Self {
        Self {
            engine,
            buf,
            meta,
            refs: RefReader::new(),
        }
    }

    pub fn read_root(&mut self) -> SerdeResult<ObjRef> {
        match self.read_ref()? {
            Value::Object(obj) => Ok(obj),
            other => Err(SerdeError::ProtocolViolation {
                reason: format!("root slot holds {:?}, expected a record", other),
            }),
        }
    }

    pub fn read_ref(&mut self) -> SerdeResult<Value> {
        match self.buf.read_u8()? {
            REF_NULL => Ok(Value::Null),
            REF_BACKREF => {
                let id = self.buf.read_var_u32()?;
                Ok(Value::Object(self.refs.get(id)?))
            }
            REF_NEW => Ok(Value::Object(self.read_record(true)?)),
            other => Err(SerdeError::ProtocolViolation {
                reason: format!("unknown reference tag {}", other),
            }),
        }
    }

    pub fn read_non_ref(&mut self) -> SerdeResult<Value> {
        match self.buf.read_u8()? {
            REF_NULL => Ok(Value::Null),
            REF_NEW => Ok(Value::Object(self.read_record(false)?)),
            other => Err(SerdeError::ProtocolViolation {
                reason: format!("unexpected reference tag {} in unshared slot", other),
            }),
        }
    }

    fn read_record(&mut self, register: bool) -> SerdeResult<ObjRef> {
        let def = self.meta.read_class(self.buf)?;
        let ty = self.engine.resolve_type(&def)?;
        if self.engine.config().check_class_version {
            let wire_id = self.buf.read_u64()?;
            let local = self.engine.class_def_for(&ty);
            if wire_id != local.id() {
                return Err(SerdeError::SchemaMismatch {
                    reason: format!(
                        "class version drift for {}: wire {:016x}, local {:016x}",
                        ty.name(),
                        wire_id,
                        local.id()
                    ),
                });
            }
        }
        if self.engine.strict_mode() {
            let local = self.engine.class_def_for(&ty);
            if local.id() != def.id() {
                return Err(SerdeError::SchemaMismatch {
                    reason: format!(
                        "strict mode rejects structural drift for {}: wire {:016x}, local {:016x}",
                        ty.name(),
                        def.id(),
                        local.id()
                    ),
                });
            }
        }
        if ty.chain_has_custom_io() {
            let serializer = self.engine.slot_serializer(&ty)?;
            return serializer.read(self, register);
        }
        let layout = self.engine.record_layout(&def, &ty);
        let obj = Record::new_default(&ty)?;
        if register {
            self.refs.register(&obj);
        }
        for field in &layout.fields {
            let value = self.read_field_value(&field.peer_type, field.nullable)?;
            if let Some(index) = field.accessor {
                let value = widen(value, field.local_type.as_ref());
                obj.lock().set_field_at(index, value);
            }
        }
        Ok(obj)
    }

    pub(crate) fn read_field_value(
        &mut self,
        type_ref: &TypeRef,
        nullable: bool,
    ) -> SerdeResult<Value> {
        match type_ref {
            TypeRef::Primitive(kind) => self.read_scalar(*kind),
            TypeRef::Boxed(kind) => {
                if self.buf.read_u8()? == 0 {
                    Ok(Value::Null)
                } else {
                    self.read_scalar(*kind)
                }
            }
            TypeRef::Str => {
                if nullable && self.buf.read_u8()? == 0 {
                    return Ok(Value::Null);
                }
                Ok(Value::Str(self.buf.read_str()?))
            }
            TypeRef::Object { .. } | TypeRef::Opaque => self.read_ref(),
            TypeRef::Array(element) => {
                if nullable && self.buf.read_u8()? == 0 {
                    return Ok(Value::Null);
                }
                let len = self.buf.read_var_u32()? as usize;
                let mut items = Vec::with_capacity(len.min(4096));
                for _ in 0..len {
                    items.push(self.read_field_value(element, true)?);
                }
                Ok(Value::Array(items))
            }
        }
    }

    fn read_scalar(&mut self, kind: PrimitiveKind) -> SerdeResult<Value> {
        Ok(match kind {
            PrimitiveKind::Bool => Value::Bool(self.buf.read_bool()?),
            PrimitiveKind::I8 => Value::I8(self.buf.read_i8()?),
            PrimitiveKind::I16 => Value::I16(self.buf.read_i16()?),
            PrimitiveKind::I32 => {
                if self.engine.config().compress_ints {
                    Value::I32(self.buf.read_var_i32()?)
                } else {
                    Value::I32(self.buf.read_i32()?)
                }
            }
            PrimitiveKind::I64 => {
                if self.engine.config().compress_longs {
                    Value::I64(self.buf.read_var_i64()?)
                } else {
                    Value::I64(self.buf.read_i64()?)
                }
            }
            PrimitiveKind::F32 => Value::F32(self.buf.read_f32()?),
            PrimitiveKind::F64 => Value::F64(self.buf.read_f64()?),
            PrimitiveKind::Char => Value::Char(self.buf.read_char()?),
        })
    }
}
