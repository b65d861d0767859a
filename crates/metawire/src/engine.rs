// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Engine facade: configuration, class registry, and the per-type caches
//! behind one pair of `serialize`/`deserialize` entry points.
//!
//! An engine is shareable across threads; each call is single-threaded
//! and owns fresh reference state. Concurrent calls must use distinct
//! meta contexts.

use crate::buffer::WireBuffer;
use crate::classdef::ClassDef;
use crate::compat::consolidate::{consolidate, record_bindings, ConsolidatedLayout, LocalBinding};
use crate::compat::layout_cache::{LayoutCache, LayoutKey, LayoutKind};
use crate::compat::slots::{SlotInfo, SlotsSerializer};
use crate::compat::structural::{Reader, Writer};
use crate::config::{CompatibleMode, SerdeConfig};
use crate::error::SerdeResult;
use crate::meta::MetaContext;
use crate::model::value::ObjRef;
use crate::registry::{ClassRegistry, RecordType};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Serialization engine bound to one registry and configuration.
pub struct Engine {
    config: SerdeConfig,
    registry: Arc<ClassRegistry>,
    class_defs: RwLock<HashMap<String, Arc<ClassDef>>>,
    synthetic_types: RwLock<HashMap<u64, Arc<RecordType>>>,
    layouts: LayoutCache,
    slot_serializers: RwLock<HashMap<String, Arc<SlotsSerializer>>>,
}

impl Engine {
    pub fn new(config: SerdeConfig, registry: Arc<ClassRegistry>) -> SerdeResult<Engine> {
        config.validate()?;
        Ok(Engine {
            config,
            registry,
            class_defs: RwLock::new(HashMap::new()),
            synthetic_types: RwLock::new(HashMap::new()),
            layouts: LayoutCache::new(),
            slot_serializers: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &SerdeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ClassRegistry> {
        &self.registry
    }

    pub(crate) fn strict_mode(&self) -> bool {
        self.config.compatible_mode == CompatibleMode::Strict
    }

    /// Serialize an object graph into a fresh message. The meta context
    /// carries class definitions across messages of the same pairing.
    pub fn serialize(&self, root: &ObjRef, ctx: &mut MetaContext) -> SerdeResult<Vec<u8>> {
        let mut buf = WireBuffer::new();
        {
            let mut writer = Writer::new(self, &mut buf, ctx);
            writer.write_root(root, None)?;
        }
        Ok(buf.into_bytes())
    }

    /// Serialize the root object against a pre-configured peer definition
    /// instead of its own; local fields absent from that definition are
    /// not written, fields it declares but the local type lacks are
    /// emitted as zero values. Within one meta context the legacy
    /// definition and the type's own keep separate handles, so the two
    /// call styles can be mixed freely.
    pub fn serialize_compat(
        &self,
        root: &ObjRef,
        peer_def: &Arc<ClassDef>,
        ctx: &mut MetaContext,
    ) -> SerdeResult<Vec<u8>> {
        let mut buf = WireBuffer::new();
        {
            let mut writer = Writer::new(self, &mut buf, ctx);
            writer.write_root(root, Some(peer_def))?;
        }
        Ok(buf.into_bytes())
    }

    /// Materialize the object graph of one message.
    pub fn deserialize(&self, bytes: &[u8], ctx: &mut MetaContext) -> SerdeResult<ObjRef> {
        let mut buf = WireBuffer::from_bytes(bytes.to_vec());
        let mut reader = Reader::new(self, &mut buf, ctx);
        reader.read_root()
    }

    /// Definition of a type's full serializable layout, built once per
    /// engine.
    pub fn class_def_for(&self, ty: &Arc<RecordType>) -> Arc<ClassDef> {
        if let Some(def) = self.class_defs.read().get(ty.name()) {
            return def.clone();
        }
        let def = Arc::new(ClassDef::from_type(ty, &self.config));
        self.class_defs
            .write()
            .entry(ty.name().to_owned())
            .or_insert_with(|| def.clone())
            .clone()
    }

    /// Local type for a wire definition: registry lookup (alias-aware),
    /// falling back to a type materialized from the definition itself so
    /// unknown peer classes can still be read and discarded.
    pub(crate) fn resolve_type(&self, def: &Arc<ClassDef>) -> SerdeResult<Arc<RecordType>> {
        if let Some(ty) = self.registry.resolve(def.class_name()) {
            return Ok(ty);
        }
        if let Some(ty) = self.synthetic_types.read().get(&def.id()) {
            return Ok(ty.clone());
        }
        log::debug!(
            "materializing unknown class {} from its peer definition",
            def.class_name()
        );
        let mut builder = RecordType::builder(def.class_name());
        for field in def.fields() {
            builder = builder.field_with(&field.name, field.type_ref.clone(), field.nullable);
        }
        let ty = builder.build();
        self.synthetic_types
            .write()
            .entry(def.id())
            .or_insert_with(|| ty.clone());
        Ok(ty)
    }

    pub(crate) fn slot_serializer(&self, ty: &Arc<RecordType>) -> SerdeResult<Arc<SlotsSerializer>> {
        if let Some(serializer) = self.slot_serializers.read().get(ty.name()) {
            return Ok(serializer.clone());
        }
        let serializer = Arc::new(SlotsSerializer::build(&self.config, ty)?);
        log::warn!(
            "{} uses custom per-ancestor serialization hooks, which is slower than the \
             structural path",
            ty.name()
        );
        let installed = self
            .slot_serializers
            .write()
            .entry(ty.name().to_owned())
            .or_insert_with(|| serializer.clone())
            .clone();
        Ok(installed)
    }

    /// Consolidation of a peer definition against a type's full instance
    /// layout.
    pub(crate) fn record_layout(
        &self,
        def: &Arc<ClassDef>,
        ty: &Arc<RecordType>,
    ) -> Arc<ConsolidatedLayout> {
        let key = LayoutKey {
            class: ty.name().to_owned(),
            def_id: def.id(),
            kind: LayoutKind::Record,
        };
        self.layouts.get_or_build(self.config.code_gen_enabled, key, || {
            consolidate(def, &record_bindings(ty))
        })
    }

    /// Consolidation of a peer slot definition against one ancestor's own
    /// fields, bound to instance indices.
    pub(crate) fn slot_record_layout(
        &self,
        def: &Arc<ClassDef>,
        slot: &SlotInfo,
    ) -> Arc<ConsolidatedLayout> {
        let key = LayoutKey {
            class: slot.class_name().to_owned(),
            def_id: def.id(),
            kind: LayoutKind::SlotFields,
        };
        self.layouts.get_or_build(self.config.code_gen_enabled, key, || {
            let bindings: Vec<LocalBinding> = slot
                .fields()
                .iter()
                .map(|field| LocalBinding {
                    name: field.name.clone(),
                    type_ref: field.type_ref.clone(),
                    index: field.record_index,
                })
                .collect();
            consolidate(def, &bindings)
        })
    }

    /// Consolidation of a peer slot definition against one ancestor's
    /// put-field positions.
    pub(crate) fn slot_put_layout(
        &self,
        def: &Arc<ClassDef>,
        slot: &SlotInfo,
    ) -> Arc<ConsolidatedLayout> {
        let key = LayoutKey {
            class: slot.class_name().to_owned(),
            def_id: def.id(),
            kind: LayoutKind::PutFields,
        };
        self.layouts.get_or_build(self.config.code_gen_enabled, key, || {
            let bindings: Vec<LocalBinding> = slot
                .fields()
                .iter()
                .enumerate()
                .map(|(position, field)| LocalBinding {
                    name: field.name.clone(),
                    type_ref: field.type_ref.clone(),
                    index: position,
                })
                .collect();
            consolidate(def, &bindings)
        })
    }

    /// Number of cached consolidated layouts (diagnostics).
    pub fn cached_layouts(&self) -> usize {
        self.layouts.len()
    }
}
