// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Slot-mode serializer for types with per-ancestor hooks.
//!
//! One slot per serializable class in the ancestor chain, precomputed in
//! superclass-first order. A slot writes either through its class's
//! `write_self` hook or through the structural path over the fields that
//! class declares itself. Reading advances a slot cursor against the
//! wire's slot sequence, firing `read_no_data` for local slots the peer
//! did not send.

use crate::classdef::ClassDef;
use crate::compat::consolidate::widen;
use crate::compat::stream::{SlotReadStream, SlotWriteStream, ValidationQueue};
use crate::compat::structural::{Reader, Writer};
use crate::config::SerdeConfig;
use crate::error::{SerdeError, SerdeResult};
use crate::model::descriptor::Descriptor;
use crate::model::grouper::DescriptorGrouper;
use crate::model::type_ref::TypeRef;
use crate::model::value::{ObjRef, Record, Value};
use crate::registry::{serializable_chain, RecordType};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// One declared field of a slot, in put-field order.
#[derive(Debug, Clone)]
pub(crate) struct SlotField {
    pub name: String,
    pub type_ref: TypeRef,
    pub nullable: bool,
    /// Index into the most-derived instance layout.
    pub record_index: usize,
}

/// Precomputed state for one ancestor class.
pub(crate) struct SlotInfo {
    pub cls: Arc<RecordType>,
    /// Definition of the fields this class declares itself; this is what
    /// the slot's class handle shares.
    pub class_def: Arc<ClassDef>,
    fields: Vec<SlotField>,
    field_idx: HashMap<String, usize>,
    /// LIFO pool of value arrays for PutField/GetField records.
    vals_pool: Mutex<Vec<Vec<Option<Value>>>>,
}

impl SlotInfo {
    fn build(
        cls: &Arc<RecordType>,
        instance_ty: &Arc<RecordType>,
        config: &SerdeConfig,
    ) -> SerdeResult<SlotInfo> {
        let ordered = DescriptorGrouper::group(
            Descriptor::for_own_fields(cls, instance_ty),
            config.track_refs_for_basic_types,
            config.compress_ints,
            config.compress_longs,
        )
        .into_ordered();
        let mut fields = Vec::with_capacity(ordered.len());
        for descriptor in ordered {
            let record_index =
                descriptor
                    .accessor
                    .ok_or_else(|| SerdeError::SchemaMismatch {
                        reason: format!(
                            "slot field {}.{} is absent from the {} instance layout",
                            cls.name(),
                            descriptor.name,
                            instance_ty.name()
                        ),
                    })?;
            fields.push(SlotField {
                name: descriptor.name,
                type_ref: descriptor.declared_type,
                nullable: descriptor.nullable,
                record_index,
            });
        }
        let field_idx = fields
            .iter()
            .enumerate()
            .map(|(index, field)| (field.name.clone(), index))
            .collect();
        Ok(SlotInfo {
            cls: cls.clone(),
            class_def: Arc::new(ClassDef::from_own_fields(cls, config)),
            fields,
            field_idx,
            vals_pool: Mutex::new(Vec::new()),
        })
    }

    pub fn class_name(&self) -> &str {
        self.cls.name()
    }

    pub fn fields(&self) -> &[SlotField] {
        &self.fields
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.field_idx.get(name).copied()
    }

    pub fn take_vals(&self) -> Vec<Option<Value>> {
        self.vals_pool
            .lock()
            .pop()
            .unwrap_or_else(|| vec![None; self.fields.len()])
    }

    /// Cleared on release so no state leaks across invocations.
    pub fn return_vals(&self, mut vals: Vec<Option<Value>>) {
        for slot in vals.iter_mut() {
            *slot = None;
        }
        self.vals_pool.lock().push(vals);
    }
}

/// Serializer for one slot-mode type.
pub(crate) struct SlotsSerializer {
    ty: Arc<RecordType>,
    slots: Vec<SlotInfo>,
}

impl SlotsSerializer {
    /// Build the slot vector, enforcing the eligibility gate: custom
    /// hooks somewhere in the chain, no replace/resolve hooks, no
    /// duplicate field names across the chain.
    pub fn build(config: &SerdeConfig, ty: &Arc<RecordType>) -> SerdeResult<SlotsSerializer> {
        if ty.chain_has_replace_hooks() {
            return Err(SerdeError::UnsupportedEncoding {
                operation: "replace-object hooks".into(),
                class: ty.name().to_owned(),
            });
        }
        if let Some(field) = ty.duplicated_field() {
            return Err(SerdeError::SchemaMismatch {
                reason: format!(
                    "field {} is declared more than once in the {} ancestor chain",
                    field,
                    ty.name()
                ),
            });
        }
        let chain = serializable_chain(ty);
        if chain.is_empty() {
            return Err(SerdeError::InvalidObject {
                reason: format!("type {} is not serializable", ty.name()),
            });
        }
        let mut slots = Vec::with_capacity(chain.len());
        for cls in &chain {
            slots.push(SlotInfo::build(cls, ty, config)?);
        }
        Ok(SlotsSerializer {
            ty: ty.clone(),
            slots,
        })
    }

    pub fn write(&self, w: &mut Writer<'_>, obj: &ObjRef) -> SerdeResult<()> {
        let share = w.engine.config().meta_share_enabled;
        w.buf.write_i16(self.slots.len() as i16);
        for slot in &self.slots {
            w.meta.write_class(w.buf, &slot.class_def, share)?;
            if let Some(hook) = &slot.cls.hooks().write_self {
                let mut stream = SlotWriteStream::new(w, slot, obj);
                hook(obj, &mut stream)?;
            } else {
                for field in slot.fields() {
                    let value = obj.lock().field_at(field.record_index).clone();
                    w.write_field_value(&field.type_ref, field.nullable, &value)?;
                }
            }
        }
        Ok(())
    }

    pub fn read(&self, r: &mut Reader<'_>, register: bool) -> SerdeResult<ObjRef> {
        let wire_slots = r.buf.read_i16()?;
        if wire_slots < 0 {
            return Err(SerdeError::ProtocolViolation {
                reason: format!("negative slot count {}", wire_slots),
            });
        }
        let obj = Record::new_default(&self.ty)?;
        // Register before any slot reads so field back-references into
        // this instance resolve.
        if register {
            r.refs.register(&obj);
        }
        let mut callbacks = ValidationQueue::new();
        let mut slot_cursor = 0usize;
        for _ in 0..wire_slots {
            let wire_def = r.meta.read_class(r.buf)?;
            let slot = loop {
                if slot_cursor >= self.slots.len() {
                    return Err(SerdeError::SchemaMismatch {
                        reason: format!(
                            "wire class {} matches no remaining slot of {}",
                            wire_def.class_name(),
                            self.ty.name()
                        ),
                    });
                }
                let candidate = &self.slots[slot_cursor];
                slot_cursor += 1;
                if candidate.class_name() == wire_def.class_name() {
                    break candidate;
                }
                // The local version extends a class the sender's version
                // does not have.
                if let Some(hook) = &candidate.cls.hooks().read_no_data {
                    hook(&obj)?;
                }
            };
            if let Some(hook) = &slot.cls.hooks().read_self {
                let mut stream = SlotReadStream::new(r, slot, &wire_def, &obj, &mut callbacks);
                hook(&obj, &mut stream)?;
            } else {
                let layout = r.engine.slot_record_layout(&wire_def, slot);
                for field in &layout.fields {
                    let value = r.read_field_value(&field.peer_type, field.nullable)?;
                    if let Some(index) = field.accessor {
                        let value = widen(value, field.local_type.as_ref());
                        obj.lock().set_field_at(index, value);
                    }
                }
            }
        }
        // Trailing local slots carried no data at all.
        while slot_cursor < self.slots.len() {
            if let Some(hook) = &self.slots[slot_cursor].cls.hooks().read_no_data {
                hook(&obj)?;
            }
            slot_cursor += 1;
        }
        for (_, group) in callbacks.iter().rev() {
            for callback in group {
                callback(&obj)?;
            }
        }
        Ok(obj)
    }
}
