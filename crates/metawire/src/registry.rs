// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registry of live record types.
//!
//! A `RecordType` is the local, in-memory description of a class: its
//! field layout (own fields plus everything inherited through serializable
//! ancestors), optional per-ancestor serialization hooks, and allocation
//! policy. Registries map wire class names to local types, with an alias
//! table for renamed or re-parented classes.

use crate::compat::stream::{SlotReadStream, SlotWriteStream};
use crate::error::SerdeResult;
use crate::model::type_ref::TypeRef;
use crate::model::value::ObjRef;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Custom per-ancestor write hook.
pub type WriteHook =
    Box<dyn Fn(&ObjRef, &mut SlotWriteStream<'_, '_>) -> SerdeResult<()> + Send + Sync>;

/// Custom per-ancestor read hook.
pub type ReadHook =
    Box<dyn Fn(&ObjRef, &mut SlotReadStream<'_, '_>) -> SerdeResult<()> + Send + Sync>;

/// Invoked when a slot exists locally but carries no data on the wire.
pub type ReadNoDataHook = Box<dyn Fn(&ObjRef) -> SerdeResult<()> + Send + Sync>;

/// Per-type serialization hooks.
#[derive(Default)]
pub struct TypeHooks {
    pub(crate) write_self: Option<WriteHook>,
    pub(crate) read_self: Option<ReadHook>,
    pub(crate) read_no_data: Option<ReadNoDataHook>,
    /// Replace/resolve style hooks are handled by a different serializer
    /// family; their presence disqualifies slot mode.
    pub(crate) has_replace_hooks: bool,
}

impl TypeHooks {
    pub fn has_custom_io(&self) -> bool {
        self.write_self.is_some() || self.read_self.is_some()
    }
}

/// A field declared directly on one class.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub type_ref: TypeRef,
    pub nullable: bool,
    /// Excluded fields exist on instances but never reach the wire.
    pub excluded: bool,
}

/// A field as seen on the full instance layout, with its declaring class.
#[derive(Debug, Clone)]
pub struct MergedField {
    pub name: String,
    pub type_ref: TypeRef,
    pub nullable: bool,
    pub excluded: bool,
    pub owner: String,
}

/// Local description of a record class.
pub struct RecordType {
    name: String,
    parent: Option<Arc<RecordType>>,
    serializable: bool,
    constructible: bool,
    own_fields: Vec<FieldDef>,
    hooks: TypeHooks,
    merged: Vec<MergedField>,
    merged_idx: HashMap<String, usize>,
    duplicated_field: Option<String>,
}

impl RecordType {
    pub fn builder(name: impl Into<String>) -> RecordTypeBuilder {
        RecordTypeBuilder {
            name: name.into(),
            parent: None,
            serializable: true,
            constructible: true,
            fields: Vec::new(),
            hooks: TypeHooks::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<RecordType>> {
        self.parent.as_ref()
    }

    pub fn serializable(&self) -> bool {
        self.serializable
    }

    pub fn constructible(&self) -> bool {
        self.constructible
    }

    pub fn own_fields(&self) -> &[FieldDef] {
        &self.own_fields
    }

    pub(crate) fn hooks(&self) -> &TypeHooks {
        &self.hooks
    }

    /// Full instance layout: inherited serializable fields first, own
    /// fields after, most-derived declaration winning on a name clash.
    pub fn merged_fields(&self) -> &[MergedField] {
        &self.merged
    }

    pub fn merged_index(&self, name: &str) -> Option<usize> {
        self.merged_idx.get(name).copied()
    }

    /// First field name declared by more than one class in the chain, if
    /// any. Slot mode refuses such chains.
    pub fn duplicated_field(&self) -> Option<&str> {
        self.duplicated_field.as_deref()
    }

    /// Whether this type or any serializable ancestor declares custom
    /// write/read hooks.
    pub fn chain_has_custom_io(self: &Arc<Self>) -> bool {
        serializable_chain(self)
            .iter()
            .any(|ty| ty.hooks.has_custom_io())
    }

    pub(crate) fn chain_has_replace_hooks(self: &Arc<Self>) -> bool {
        serializable_chain(self)
            .iter()
            .any(|ty| ty.hooks.has_replace_hooks)
    }
}

// Debug skips hook closures and the parent chain.
impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordType")
            .field("name", &self.name)
            .field("fields", &self.merged.len())
            .field("serializable", &self.serializable)
            .finish()
    }
}

/// Serializable ancestor chain in superclass-first order: from the
/// highest serializable ancestor down to the type itself. Walking stops
/// at the first non-serializable ancestor.
pub(crate) fn serializable_chain(ty: &Arc<RecordType>) -> Vec<Arc<RecordType>> {
    let mut chain = Vec::new();
    let mut current = Some(ty.clone());
    while let Some(t) = current {
        if !t.serializable {
            break;
        }
        current = t.parent.clone();
        chain.push(t);
    }
    chain.reverse();
    chain
}

/// Builder for [`RecordType`].
pub struct RecordTypeBuilder {
    name: String,
    parent: Option<Arc<RecordType>>,
    serializable: bool,
    constructible: bool,
    fields: Vec<FieldDef>,
    hooks: TypeHooks,
}

impl RecordTypeBuilder {
    /// Declare a field with the type's default nullability.
    pub fn field(mut self, name: impl Into<String>, type_ref: TypeRef) -> Self {
        let nullable = type_ref.default_nullable();
        self.fields.push(FieldDef {
            name: name.into(),
            type_ref,
            nullable,
            excluded: false,
        });
        self
    }

    pub fn field_with(
        mut self,
        name: impl Into<String>,
        type_ref: TypeRef,
        nullable: bool,
    ) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            type_ref,
            nullable,
            excluded: false,
        });
        self
    }

    /// Declare a field that exists in memory but never reaches the wire.
    pub fn transient_field(mut self, name: impl Into<String>, type_ref: TypeRef) -> Self {
        let nullable = type_ref.default_nullable();
        self.fields.push(FieldDef {
            name: name.into(),
            type_ref,
            nullable,
            excluded: true,
        });
        self
    }

    pub fn parent(mut self, parent: Arc<RecordType>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn not_serializable(mut self) -> Self {
        self.serializable = false;
        self
    }

    pub fn non_constructible(mut self) -> Self {
        self.constructible = false;
        self
    }

    pub fn write_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ObjRef, &mut SlotWriteStream<'_, '_>) -> SerdeResult<()> + Send + Sync + 'static,
    {
        self.hooks.write_self = Some(Box::new(hook));
        self
    }

    pub fn read_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ObjRef, &mut SlotReadStream<'_, '_>) -> SerdeResult<()> + Send + Sync + 'static,
    {
        self.hooks.read_self = Some(Box::new(hook));
        self
    }

    pub fn read_no_data<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ObjRef) -> SerdeResult<()> + Send + Sync + 'static,
    {
        self.hooks.read_no_data = Some(Box::new(hook));
        self
    }

    pub fn with_replace_hooks(mut self) -> Self {
        self.hooks.has_replace_hooks = true;
        self
    }

    pub fn build(self) -> Arc<RecordType> {
        let mut merged: Vec<MergedField> = Vec::new();
        let mut duplicated_field = None;
        if let Some(parent) = &self.parent {
            if parent.serializable {
                merged.extend(parent.merged.iter().cloned());
                duplicated_field = parent.duplicated_field.clone();
            }
        }
        for field in &self.fields {
            if let Some(existing) = merged.iter_mut().find(|m| m.name == field.name) {
                // Most-derived declaration wins; remember the clash for
                // the slot-mode gate.
                if duplicated_field.is_none() {
                    duplicated_field = Some(field.name.clone());
                }
                existing.type_ref = field.type_ref.clone();
                existing.nullable = field.nullable;
                existing.excluded = field.excluded;
                existing.owner = self.name.clone();
            } else {
                merged.push(MergedField {
                    name: field.name.clone(),
                    type_ref: field.type_ref.clone(),
                    nullable: field.nullable,
                    excluded: field.excluded,
                    owner: self.name.clone(),
                });
            }
        }
        let merged_idx = merged
            .iter()
            .enumerate()
            .map(|(i, m)| (m.name.clone(), i))
            .collect();
        Arc::new(RecordType {
            name: self.name,
            parent: self.parent,
            serializable: self.serializable,
            constructible: self.constructible,
            own_fields: self.fields,
            hooks: self.hooks,
            merged,
            merged_idx,
            duplicated_field,
        })
    }
}

/// Name-keyed store of local record types.
#[derive(Default)]
pub struct ClassRegistry {
    types: RwLock<HashMap<String, Arc<RecordType>>>,
    aliases: RwLock<HashMap<String, String>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, ty: Arc<RecordType>) {
        self.types.write().insert(ty.name().to_owned(), ty);
    }

    pub fn get(&self, name: &str) -> Option<Arc<RecordType>> {
        self.types.read().get(name).cloned()
    }

    /// Map a peer-visible class name onto a differently named local type.
    pub fn add_alias(&self, wire_name: impl Into<String>, local_name: impl Into<String>) {
        self.aliases
            .write()
            .insert(wire_name.into(), local_name.into());
    }

    /// Alias-aware lookup used when materializing wire classes.
    pub fn resolve(&self, wire_name: &str) -> Option<Arc<RecordType>> {
        let target = self.aliases.read().get(wire_name).cloned();
        match target {
            Some(local) => self.get(&local),
            None => self.get(wire_name),
        }
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("types", &self.types.read().len())
            .finish()
    }
}
