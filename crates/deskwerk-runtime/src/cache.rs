// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Identity cache: one wrapper per desktop identity.

use std::sync::Arc;

use dashmap::DashMap;
use deskwerk_core::error::Result;
use deskwerk_core::types::DesktopId;
use tracing::debug;

use crate::desktop::Desktop;

#[derive(Default)]
pub struct IdentityCache {
    desktops: DashMap<DesktopId, Arc<Desktop>>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The wrapper for `id`, building it with `build` if absent.
    ///
    /// Insert-if-absent is a single map operation, so racing callers always
    /// receive the same instance and `build` runs at most once per identity.
    pub fn resolve(&self, id: DesktopId, build: impl FnOnce() -> Result<Desktop>) -> Result<Arc<Desktop>> {
        let entry = self
            .desktops
            .entry(id)
            .or_try_insert_with(|| build().map(Arc::new))?;
        Ok(Arc::clone(entry.value()))
    }

    pub fn get(&self, id: DesktopId) -> Option<Arc<Desktop>> {
        self.desktops.get(&id).map(|e| Arc::clone(e.value()))
    }

    /// Every cached wrapper, in no particular order.
    pub fn snapshot(&self) -> Vec<Arc<Desktop>> {
        self.desktops.iter().map(|e| Arc::clone(e.value())).collect()
    }

    pub fn evict(&self, id: DesktopId) -> Option<Arc<Desktop>> {
        let removed = self.desktops.remove(&id).map(|(_, d)| d);
        if let Some(desktop) = &removed {
            // Neighbours to the right close the gap.
            if let Some(index) = desktop.index() {
                self.shift(|i| i > index as i32, -1);
            }
        }
        removed
    }

    /// Adjust cached positions after the desktop at `from` moved to `to`.
    pub fn apply_move(&self, moved: DesktopId, from: i32, to: i32) {
        if from < to {
            self.shift(|i| i > from && i <= to, -1);
        } else if to < from {
            self.shift(|i| i >= to && i < from, 1);
        }
        if let Some(desktop) = self.get(moved) {
            desktop.set_index(to);
        }
    }

    fn shift(&self, pick: impl Fn(i32) -> bool, delta: i32) {
        for entry in self.desktops.iter() {
            if let Some(index) = entry.value().index() {
                let index = index as i32;
                if pick(index) {
                    entry.value().set_index(index + delta);
                }
            }
        }
    }

    pub fn clear(&self) -> usize {
        let count = self.desktops.len();
        self.desktops.clear();
        debug!(count, "identity cache cleared");
        count
    }

    pub fn len(&self) -> usize {
        self.desktops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.desktops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Weak;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use deskwerk_interop::DesktopHandle;
    use deskwerk_interop::traits::NativeObject;

    fn desktop(id: DesktopId, index: i32) -> Desktop {
        let desktop = Desktop::new(
            DesktopHandle::new(id, NativeObject::new(())),
            1,
            String::new(),
            String::new(),
            Weak::new(),
        );
        desktop.set_index(index);
        desktop
    }

    #[test]
    fn resolve_builds_once_per_identity() {
        let cache = IdentityCache::new();
        let id = DesktopId::new();
        let builds = AtomicUsize::new(0);

        let a = cache
            .resolve(id, || {
                builds.fetch_add(1, Ordering::SeqCst);
                Ok(desktop(id, 0))
            })
            .unwrap();
        let b = cache
            .resolve(id, || {
                builds.fetch_add(1, Ordering::SeqCst);
                Ok(desktop(id, 0))
            })
            .unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_build_leaves_no_entry() {
        let cache = IdentityCache::new();
        let id = DesktopId::new();
        let out = cache.resolve(id, || {
            Err(deskwerk_core::error::DeskwerkError::Binding("gone".into()))
        });
        assert!(out.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn moves_reorder_cached_positions() {
        let cache = IdentityCache::new();
        let ids: Vec<DesktopId> = (0..4).map(|_| DesktopId::new()).collect();
        for (i, id) in ids.iter().enumerate() {
            cache.resolve(*id, || Ok(desktop(*id, i as i32))).unwrap();
        }

        // [a b c d] -> [b c a d]
        cache.apply_move(ids[0], 0, 2);
        let index = |i: usize| cache.get(ids[i]).unwrap().index();
        assert_eq!(
            (index(0), index(1), index(2), index(3)),
            (Some(2), Some(0), Some(1), Some(3))
        );

        // [b c a d] -> [d b c a]
        cache.apply_move(ids[3], 3, 0);
        assert_eq!(
            (index(0), index(1), index(2), index(3)),
            (Some(3), Some(1), Some(2), Some(0))
        );
    }

    #[test]
    fn evict_closes_the_gap() {
        let cache = IdentityCache::new();
        let ids: Vec<DesktopId> = (0..3).map(|_| DesktopId::new()).collect();
        for (i, id) in ids.iter().enumerate() {
            cache.resolve(*id, || Ok(desktop(*id, i as i32))).unwrap();
        }

        let removed = cache.evict(ids[1]).unwrap();
        assert_eq!(removed.id(), ids[1]);
        assert_eq!(cache.get(ids[0]).unwrap().index(), Some(0));
        assert_eq!(cache.get(ids[2]).unwrap().index(), Some(1));
        assert_eq!(cache.clear(), 2);
    }
}
