// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Declared field types and their wire tags.

use crate::buffer::WireBuffer;
use crate::error::{SerdeError, SerdeResult};
use std::fmt;

/// Scalar kinds supported as unboxed field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Char,
}

impl PrimitiveKind {
    /// Encoded size in bytes (ignoring varint compression).
    pub fn size(&self) -> usize {
        match self {
            Self::Bool | Self::I8 => 1,
            Self::I16 => 2,
            Self::I32 | Self::F32 | Self::Char => 4,
            Self::I64 | Self::F64 => 8,
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Self::Bool => 0,
            Self::I8 => 1,
            Self::I16 => 2,
            Self::I32 => 3,
            Self::I64 => 4,
            Self::F32 => 5,
            Self::F64 => 6,
            Self::Char => 7,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Self::Bool,
            1 => Self::I8,
            2 => Self::I16,
            3 => Self::I32,
            4 => Self::I64,
            5 => Self::F32,
            6 => Self::F64,
            7 => Self::Char,
            _ => return None,
        })
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Char => "char",
        };
        f.write_str(name)
    }
}

const TAG_BOXED: u8 = 8;
const TAG_STRING: u8 = 9;
const TAG_OBJECT: u8 = 10;
const TAG_ARRAY: u8 = 11;
const TAG_OPAQUE: u8 = 12;

const OBJECT_FLAG_SEALED: u8 = 0x01;

/// Declared type of a serializable field.
///
/// The `sealed` flag of an object type travels on the wire so both peers
/// derive identical field grouping from a class definition alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Primitive(PrimitiveKind),
    /// Nullable box around a scalar.
    Boxed(PrimitiveKind),
    Str,
    Object {
        class_name: String,
        /// Non-polymorphic class: no subtypes can appear in this slot.
        sealed: bool,
    },
    Array(Box<TypeRef>),
    /// Object type whose parameters could not be recovered; matches any
    /// object type during consolidation.
    Opaque,
}

impl TypeRef {
    pub fn object(class_name: impl Into<String>) -> Self {
        TypeRef::Object {
            class_name: class_name.into(),
            sealed: false,
        }
    }

    pub fn sealed_object(class_name: impl Into<String>) -> Self {
        TypeRef::Object {
            class_name: class_name.into(),
            sealed: true,
        }
    }

    pub fn array(element: TypeRef) -> Self {
        TypeRef::Array(Box::new(element))
    }

    /// Whether a field of this type defaults to nullable.
    pub fn default_nullable(&self) -> bool {
        !matches!(self, TypeRef::Primitive(_))
    }

    /// Stable name used to order object-like fields by type.
    pub fn sort_name(&self) -> String {
        match self {
            TypeRef::Primitive(k) => k.to_string(),
            TypeRef::Boxed(k) => format!("boxed<{}>", k),
            TypeRef::Str => "string".into(),
            TypeRef::Object { class_name, .. } => class_name.clone(),
            TypeRef::Array(elem) => format!("array<{}>", elem.sort_name()),
            TypeRef::Opaque => "opaque".into(),
        }
    }

    pub fn encode(&self, buf: &mut WireBuffer) {
        match self {
            TypeRef::Primitive(k) => buf.write_u8(k.tag()),
            TypeRef::Boxed(k) => {
                buf.write_u8(TAG_BOXED);
                buf.write_u8(k.tag());
            }
            TypeRef::Str => buf.write_u8(TAG_STRING),
            TypeRef::Object { class_name, sealed } => {
                buf.write_u8(TAG_OBJECT);
                buf.write_u8(if *sealed { OBJECT_FLAG_SEALED } else { 0 });
                buf.write_str(class_name);
            }
            TypeRef::Array(elem) => {
                buf.write_u8(TAG_ARRAY);
                elem.encode(buf);
            }
            TypeRef::Opaque => buf.write_u8(TAG_OPAQUE),
        }
    }

    pub fn decode(buf: &mut WireBuffer) -> SerdeResult<Self> {
        let tag = buf.read_u8()?;
        if let Some(kind) = PrimitiveKind::from_tag(tag) {
            return Ok(TypeRef::Primitive(kind));
        }
        match tag {
            TAG_BOXED => {
                let inner = buf.read_u8()?;
                let kind =
                    PrimitiveKind::from_tag(inner).ok_or_else(|| SerdeError::ProtocolViolation {
                        reason: format!("unknown boxed primitive tag {}", inner),
                    })?;
                Ok(TypeRef::Boxed(kind))
            }
            TAG_STRING => Ok(TypeRef::Str),
            TAG_OBJECT => {
                let flags = buf.read_u8()?;
                let class_name = buf.read_str()?;
                Ok(TypeRef::Object {
                    class_name,
                    sealed: flags & OBJECT_FLAG_SEALED != 0,
                })
            }
            TAG_ARRAY => Ok(TypeRef::Array(Box::new(TypeRef::decode(buf)?))),
            TAG_OPAQUE => Ok(TypeRef::Opaque),
            other => Err(SerdeError::ProtocolViolation {
                reason: format!("unknown type tag {}", other),
            }),
        }
    }
}
