// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # metawire - schema-evolution object-graph serialization
//!
//! Serialize and deserialize structured records between peers that hold
//! different versions of the same types: fields added, removed, or
//! reordered on either side round-trip safely, with reference identity
//! (including cycles) preserved.
//!
//! ## How it works
//!
//! Each peer derives a [`ClassDef`] from its live type: the class name
//! plus the serializable fields in a canonical grouped order, fingerprinted
//! into a stable 64-bit id. Within a [`MetaContext`] (one direction of one
//! peer pairing) a definition travels once, inline before the first object
//! of its class; later objects reference it by a dense integer handle.
//! The receiver consolidates each incoming definition against its local
//! type: matching fields are read and assigned (with numeric boxing
//! widened), peer-only fields are read and discarded, local-only fields
//! keep their defaults.
//!
//! ```no_run
//! use metawire::{ClassRegistry, Engine, MetaContext, PrimitiveKind, Record, RecordType,
//!                SerdeConfig, TypeRef};
//! use std::sync::Arc;
//!
//! # fn main() -> metawire::SerdeResult<()> {
//! let registry = Arc::new(ClassRegistry::new());
//! registry.register(
//!     RecordType::builder("Point")
//!         .field("x", TypeRef::Primitive(PrimitiveKind::I32))
//!         .field("y", TypeRef::Primitive(PrimitiveKind::I32))
//!         .build(),
//! );
//!
//! let engine = Engine::new(SerdeConfig::default(), registry.clone())?;
//! let point = Record::new_default(&registry.get("Point").expect("registered"))?;
//! point.lock().set("x", 3)?;
//!
//! let mut out_ctx = MetaContext::new();
//! let bytes = engine.serialize(&point, &mut out_ctx)?;
//!
//! let mut in_ctx = MetaContext::new();
//! let back = engine.deserialize(&bytes, &mut in_ctx)?;
//! assert_eq!(back.lock().get("x"), point.lock().get("x"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Legacy per-ancestor hooks
//!
//! Types whose ancestor chain declares `write_self`/`read_self` hooks are
//! carried by the slot protocol: one slot per serializable ancestor in
//! superclass-first order, each with its own class handle and payload.
//! Hooks receive a [`SlotWriteStream`]/[`SlotReadStream`] offering default
//! structural IO, sparse [`PutField`]/[`GetField`] records, typed scalar
//! helpers, and validation registration. Legacy stream operations outside
//! that surface fail explicitly with `unsupported-encoding`.
//!
//! ## Concurrency
//!
//! Engines are shareable; every call is single-threaded, owns its
//! reference state, and requires its own [`MetaContext`] per direction of
//! each peer pairing. The consolidated-layout cache is engine-owned and
//! lock-striped for concurrent lookups.

/// Little-endian wire buffer with varint and string support.
pub mod buffer;
/// Portable class definitions with stable 64-bit fingerprints.
pub mod classdef;
/// Compatibility engine: consolidation, structural and slot modes.
pub mod compat;
/// Engine feature flags.
pub mod config;
/// Error types.
pub mod error;
/// Per-peer session cache of shared class definitions.
pub mod meta;
/// Declared types, dynamic values, descriptors and field grouping.
pub mod model;
/// Live type registry.
pub mod registry;
/// Reference resolver (object identity within one call).
pub mod resolver;

mod engine;

pub use buffer::WireBuffer;
pub use classdef::{ClassDef, ClassDefField};
pub use compat::{GetField, PutField, SlotReadStream, SlotWriteStream};
pub use config::{CompatibleMode, SerdeConfig};
pub use engine::Engine;
pub use error::{SerdeError, SerdeResult};
pub use meta::MetaContext;
pub use model::{Descriptor, DescriptorGrouper, ObjRef, PrimitiveKind, Record, TypeRef, Value};
pub use registry::{ClassRegistry, FieldDef, RecordType, RecordTypeBuilder};
