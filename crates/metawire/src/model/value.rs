// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dynamic record values.
//!
//! Object graph nodes are `Arc<Mutex<Record>>`; reference identity is
//! pointer identity, which is what the reference resolver keys on. Only
//! `Object` values participate in reference tracking; strings and arrays
//! are value-embedded. Locks are held per field access, never across a
//! nested serialization step.

use crate::error::{SerdeError, SerdeResult};
use crate::model::type_ref::{PrimitiveKind, TypeRef};
use crate::registry::RecordType;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Shared handle to a record in an object graph.
pub type ObjRef = Arc<Mutex<Record>>;

/// A single field value.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Char(char),
    Str(String),
    Object(ObjRef),
    Array(Vec<Value>),
}

impl Value {
    /// Language default for a declared type: scalar zero, or null for
    /// anything nullable.
    pub fn zero_of(type_ref: &TypeRef) -> Value {
        match type_ref {
            TypeRef::Primitive(kind) => Value::zero_scalar(*kind),
            _ => Value::Null,
        }
    }

    pub fn zero_scalar(kind: PrimitiveKind) -> Value {
        match kind {
            PrimitiveKind::Bool => Value::Bool(false),
            PrimitiveKind::I8 => Value::I8(0),
            PrimitiveKind::I16 => Value::I16(0),
            PrimitiveKind::I32 => Value::I32(0),
            PrimitiveKind::I64 => Value::I64(0),
            PrimitiveKind::F32 => Value::F32(0.0),
            PrimitiveKind::F64 => Value::F64(0.0),
            PrimitiveKind::Char => Value::Char('\0'),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(&self) -> Option<&ObjRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

// Object values compare by pointer identity; everything else structurally.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::I8(v) => write!(f, "{}i8", v),
            Value::I16(v) => write!(f, "{}i16", v),
            Value::I32(v) => write!(f, "{}i32", v),
            Value::I64(v) => write!(f, "{}i64", v),
            Value::F32(v) => write!(f, "{}f32", v),
            Value::F64(v) => write!(f, "{}f64", v),
            Value::Char(v) => write!(f, "{:?}", v),
            Value::Str(v) => write!(f, "{:?}", v),
            // Never lock or recurse: object graphs may be cyclic and the
            // record may already be held by the caller.
            Value::Object(obj) => write!(f, "<record@{:p}>", Arc::as_ptr(obj)),
            Value::Array(items) => write!(f, "array[{}]", items.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::I8(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::I16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Value::Char(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<ObjRef> for Value {
    fn from(v: ObjRef) -> Self {
        Value::Object(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

/// Instance of a registered record type.
pub struct Record {
    class: Arc<RecordType>,
    fields: Vec<Value>,
}

impl Record {
    /// Allocate a zero-filled instance.
    ///
    /// Fails with `construction-failed` when the type forbids allocation.
    pub fn new_default(class: &Arc<RecordType>) -> SerdeResult<ObjRef> {
        if !class.constructible() {
            return Err(SerdeError::ConstructionFailed {
                class: class.name().to_owned(),
            });
        }
        let fields = class
            .merged_fields()
            .iter()
            .map(|field| Value::zero_of(&field.type_ref))
            .collect();
        Ok(Arc::new(Mutex::new(Record {
            class: class.clone(),
            fields,
        })))
    }

    pub fn class(&self) -> &Arc<RecordType> {
        &self.class
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.class
            .merged_index(name)
            .map(|index| &self.fields[index])
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> SerdeResult<()> {
        let index = self
            .class
            .merged_index(name)
            .ok_or_else(|| SerdeError::UnknownField {
                class: self.class.name().to_owned(),
                field: name.to_owned(),
            })?;
        self.fields[index] = value.into();
        Ok(())
    }

    pub(crate) fn field_at(&self, index: usize) -> &Value {
        &self.fields[index]
    }

    pub(crate) fn set_field_at(&mut self, index: usize, value: Value) {
        self.fields[index] = value;
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("class", &self.class.name())
            .field("fields", &self.fields)
            .finish()
    }
}
