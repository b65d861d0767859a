// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Engine configuration.
//!
//! Peers must run with identical wire-affecting settings (`compress_ints`,
//! `compress_longs`, `track_refs_for_basic_types`) for their field layouts
//! to line up.

use crate::error::{SerdeError, SerdeResult};

/// How the engine treats a peer class definition that differs from the
/// local one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompatibleMode {
    /// Identical structure required; any drift is a schema mismatch.
    Strict,
    /// Added and removed fields are tolerated in both directions.
    ForwardBackward,
}

/// Serialization feature flags.
#[derive(Debug, Clone)]
pub struct SerdeConfig {
    /// Peer schema drift policy.
    pub compatible_mode: CompatibleMode,

    /// Share class definitions once per meta context and reference them by
    /// handle afterwards. When disabled every object carries its full
    /// definition inline.
    pub meta_share_enabled: bool,

    /// Emit and verify the 64-bit class fingerprint per object. Must stay
    /// off when meta sharing runs in `ForwardBackward` mode.
    pub check_class_version: bool,

    /// Encode `i32` fields as zigzag varints.
    pub compress_ints: bool,

    /// Encode `i64` fields as zigzag varints.
    pub compress_longs: bool,

    /// Route boxed primitive fields through the reference resolver.
    pub track_refs_for_basic_types: bool,

    /// Cache consolidated field layouts across calls. Off means every call
    /// re-derives its layout (the interpreted path).
    pub code_gen_enabled: bool,
}

impl Default for SerdeConfig {
    fn default() -> Self {
        Self {
            compatible_mode: CompatibleMode::ForwardBackward,
            meta_share_enabled: true,
            check_class_version: false,
            compress_ints: true,
            compress_longs: true,
            track_refs_for_basic_types: false,
            code_gen_enabled: true,
        }
    }
}

impl SerdeConfig {
    pub fn with_compatible_mode(mut self, mode: CompatibleMode) -> Self {
        self.compatible_mode = mode;
        self
    }

    pub fn with_meta_share(mut self, enabled: bool) -> Self {
        self.meta_share_enabled = enabled;
        self
    }

    pub fn with_check_class_version(mut self, enabled: bool) -> Self {
        self.check_class_version = enabled;
        self
    }

    pub fn with_compress_ints(mut self, enabled: bool) -> Self {
        self.compress_ints = enabled;
        self
    }

    pub fn with_compress_longs(mut self, enabled: bool) -> Self {
        self.compress_longs = enabled;
        self
    }

    pub fn with_track_refs_for_basic_types(mut self, enabled: bool) -> Self {
        self.track_refs_for_basic_types = enabled;
        self
    }

    pub fn with_code_gen(mut self, enabled: bool) -> Self {
        self.code_gen_enabled = enabled;
        self
    }

    /// Reject flag combinations that cannot produce a coherent wire format.
    pub fn validate(&self) -> SerdeResult<()> {
        if self.check_class_version
            && self.meta_share_enabled
            && self.compatible_mode == CompatibleMode::ForwardBackward
        {
            return Err(SerdeError::InvalidConfig {
                reason: "class version check must be disabled when meta sharing runs in \
                         forward-backward compatible mode"
                    .into(),
            });
        }
        Ok(())
    }
}
