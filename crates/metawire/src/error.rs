// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types surfaced at the serialization call boundary.

use std::fmt;

/// Errors raised by the serialization engine.
///
/// Nothing is recovered internally; every error propagates to the caller.
/// Pooled scratch objects are returned to their pools on error paths, and
/// per-call reference state is discarded with the failed call.
#[derive(Debug, Clone)]
pub enum SerdeError {
    /// Field-by-field mapping between peer and local class could not be
    /// reconciled, a slot chain carries duplicate field names, or a wire
    /// class matched no remaining slot.
    SchemaMismatch { reason: String },
    /// Malformed wire data: bad class handle, unknown type tag, truncated
    /// class definition.
    ProtocolViolation { reason: String },
    /// Buffer exhausted before the requested bytes were available.
    Eof { offset: usize, need: usize },
    /// A sparse field record was given a name the class does not declare.
    UnknownField { class: String, field: String },
    /// PutField/GetField state machine violation (double write, flush
    /// without an active record, ...).
    NotActive { reason: String },
    /// A user hook invoked a legacy stream operation this engine refuses
    /// to emulate.
    UnsupportedEncoding { operation: String, class: String },
    /// Null validation callback, or an object otherwise unfit for
    /// registration.
    InvalidObject { reason: String },
    /// Target instance could not be allocated.
    ConstructionFailed { class: String },
    /// Rejected configuration (mutually exclusive flags).
    InvalidConfig { reason: String },
}

impl fmt::Display for SerdeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerdeError::SchemaMismatch { reason } => write!(f, "schema mismatch: {}", reason),
            SerdeError::ProtocolViolation { reason } => {
                write!(f, "protocol violation: {}", reason)
            }
            SerdeError::Eof { offset, need } => {
                write!(
                    f,
                    "unexpected end of buffer at offset {}: {} more bytes needed",
                    offset, need
                )
            }
            SerdeError::UnknownField { class, field } => {
                write!(f, "field {} does not exist in class {}", field, class)
            }
            SerdeError::NotActive { reason } => write!(f, "not active: {}", reason),
            SerdeError::UnsupportedEncoding { operation, class } => {
                write!(
                    f,
                    "{} is not supported for {}; register a fallback serializer for this type",
                    operation, class
                )
            }
            SerdeError::InvalidObject { reason } => write!(f, "invalid object: {}", reason),
            SerdeError::ConstructionFailed { class } => {
                write!(f, "failed to construct instance of {}", class)
            }
            SerdeError::InvalidConfig { reason } => write!(f, "invalid configuration: {}", reason),
        }
    }
}

impl std::error::Error for SerdeError {}

pub type SerdeResult<T> = Result<T, SerdeError>;
