// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Portable structural fingerprint of a record class.
//!
//! A `ClassDef` carries the class name and its serializable fields in
//! canonical grouped order, plus a 64-bit id derived from the canonical
//! byte form (MD5 digest truncated to 8 bytes). Equal canonical bytes
//! always produce equal ids; the id itself never travels on the wire.

use crate::buffer::WireBuffer;
use crate::config::SerdeConfig;
use crate::error::{SerdeError, SerdeResult};
use crate::model::descriptor::Descriptor;
use crate::model::grouper::DescriptorGrouper;
use crate::model::type_ref::TypeRef;
use crate::registry::RecordType;
use md5::{Digest, Md5};
use std::sync::Arc;

/// One field record inside a class definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDefField {
    pub name: String,
    pub type_ref: TypeRef,
    pub nullable: bool,
}

const FIELD_FLAG_NULLABLE: u8 = 0x01;

/// Immutable structural description of a class, as exchanged between
/// peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDef {
    id: u64,
    class_name: String,
    fields: Vec<ClassDefField>,
}

impl ClassDef {
    /// Definition of a type's full serializable layout (inherited fields
    /// included).
    pub fn from_type(ty: &Arc<RecordType>, config: &SerdeConfig) -> ClassDef {
        Self::from_descriptors(ty.name(), Descriptor::for_type(ty), config)
    }

    /// Definition covering only the fields one chain class declares
    /// itself. Slot payloads are described this way.
    pub fn from_own_fields(ty: &Arc<RecordType>, config: &SerdeConfig) -> ClassDef {
        Self::from_descriptors(ty.name(), Descriptor::for_own_fields(ty, ty), config)
    }

    fn from_descriptors(
        class_name: &str,
        descriptors: Vec<Descriptor>,
        config: &SerdeConfig,
    ) -> ClassDef {
        let ordered = DescriptorGrouper::group(
            descriptors,
            config.track_refs_for_basic_types,
            config.compress_ints,
            config.compress_longs,
        )
        .into_ordered();
        let fields: Vec<ClassDefField> = ordered
            .into_iter()
            .map(|descriptor| ClassDefField {
                name: descriptor.name,
                type_ref: descriptor.declared_type,
                nullable: descriptor.nullable,
            })
            .collect();
        let id = compute_id(class_name, &fields);
        ClassDef {
            id,
            class_name: class_name.to_owned(),
            fields,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn fields(&self) -> &[ClassDefField] {
        &self.fields
    }

    /// Wire form; identical to the canonical bytes the id is derived from.
    pub fn encode(&self, buf: &mut WireBuffer) {
        encode_into(buf, &self.class_name, &self.fields);
    }

    pub fn decode(buf: &mut WireBuffer) -> SerdeResult<ClassDef> {
        Self::decode_inner(buf).map_err(|err| match err {
            // A short class definition is a peer framing bug, not a
            // caller-supplied short buffer.
            SerdeError::Eof { .. } => SerdeError::ProtocolViolation {
                reason: "truncated class definition".into(),
            },
            other => other,
        })
    }

    fn decode_inner(buf: &mut WireBuffer) -> SerdeResult<ClassDef> {
        let class_name = buf.read_str()?;
        let count = buf.read_var_u32()? as usize;
        let mut fields = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let name = buf.read_str()?;
            let flags = buf.read_u8()?;
            let type_ref = TypeRef::decode(buf)?;
            fields.push(ClassDefField {
                name,
                type_ref,
                nullable: flags & FIELD_FLAG_NULLABLE != 0,
            });
        }
        let id = compute_id(&class_name, &fields);
        Ok(ClassDef {
            id,
            class_name,
            fields,
        })
    }
}

fn encode_into(buf: &mut WireBuffer, class_name: &str, fields: &[ClassDefField]) {
    buf.write_str(class_name);
    buf.write_var_u32(fields.len() as u32);
    for field in fields {
        buf.write_str(&field.name);
        buf.write_u8(if field.nullable { FIELD_FLAG_NULLABLE } else { 0 });
        field.type_ref.encode(buf);
    }
}

fn compute_id(class_name: &str, fields: &[ClassDefField]) -> u64 {
    let mut canonical = WireBuffer::new();
    encode_into(&mut canonical, class_name, fields);
    let mut hasher = Md5::new();
    hasher.update(canonical.as_slice());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}
