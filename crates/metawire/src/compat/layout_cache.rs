// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared cache of consolidated layouts.
//!
//! Keyed by local type identity and peer definition id. Lookups take a
//! read lock; installation uses `try_write` so concurrent serializations
//! never block behind each other -- a loser simply keeps the layout it
//! just derived (the interpreted path) and the next call sees the
//! installed one. The cache is owned by its engine and dies with it.

use crate::compat::consolidate::ConsolidatedLayout;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Which consolidation flavor a cached layout holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum LayoutKind {
    /// Peer definition against a type's full instance layout.
    Record,
    /// Peer slot definition against one ancestor's own fields, bound to
    /// instance indices.
    SlotFields,
    /// Peer slot definition against one ancestor's put-field positions.
    PutFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct LayoutKey {
    pub class: String,
    pub def_id: u64,
    pub kind: LayoutKind,
}

/// Engine-owned layout cache.
#[derive(Debug, Default)]
pub struct LayoutCache {
    inner: RwLock<HashMap<LayoutKey, Arc<ConsolidatedLayout>>>,
}

impl LayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get_or_build<F>(
        &self,
        enabled: bool,
        key: LayoutKey,
        build: F,
    ) -> Arc<ConsolidatedLayout>
    where
        F: FnOnce() -> ConsolidatedLayout,
    {
        if !enabled {
            return Arc::new(build());
        }
        if let Some(layout) = self.inner.read().get(&key) {
            return layout.clone();
        }
        let layout = Arc::new(build());
        if let Some(mut map) = self.inner.try_write() {
            map.entry(key).or_insert_with(|| layout.clone());
        }
        layout
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(class: &str, id: u64) -> LayoutKey {
        LayoutKey {
            class: class.into(),
            def_id: id,
            kind: LayoutKind::Record,
        }
    }

    fn empty_layout() -> ConsolidatedLayout {
        ConsolidatedLayout { fields: Vec::new() }
    }

    #[test]
    fn test_cache_builds_once_when_enabled() {
        let cache = LayoutCache::new();
        let builds = AtomicUsize::new(0);

        let first = cache.get_or_build(true, key("T", 1), || {
            builds.fetch_add(1, Ordering::SeqCst);
            empty_layout()
        });
        let second = cache.get_or_build(true, key("T", 1), || {
            builds.fetch_add(1, Ordering::SeqCst);
            empty_layout()
        });

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_disabled_cache_rebuilds_every_call() {
        let cache = LayoutCache::new();
        let builds = AtomicUsize::new(0);

        for _ in 0..3 {
            cache.get_or_build(false, key("T", 1), || {
                builds.fetch_add(1, Ordering::SeqCst);
                empty_layout()
            });
        }
        assert_eq!(builds.load(Ordering::SeqCst), 3);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_distinct_definitions_get_distinct_entries() {
        let cache = LayoutCache::new();
        cache.get_or_build(true, key("T", 1), empty_layout);
        cache.get_or_build(true, key("T", 2), empty_layout);
        let put_key = LayoutKey {
            class: "T".into(),
            def_id: 1,
            kind: LayoutKind::PutFields,
        };
        cache.get_or_build(true, put_key, empty_layout);
        assert_eq!(cache.len(), 3);
    }
}
