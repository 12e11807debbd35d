// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stable wrapper around one virtual desktop.

use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, RwLock, Weak};

use deskwerk_core::error::{DeskwerkError, Result};
use deskwerk_core::types::{AdjacentDirection, DesktopId};
use deskwerk_interop::DesktopHandle;

use crate::context::Shared;

/// One virtual desktop.
///
/// Exactly one `Desktop` exists per identity while its context is bound to
/// the same shell instance. Notifications update the name, wallpaper and
/// position in place; after a shell restart a fresh wrapper replaces this one
/// and this one keeps its last-known values.
pub struct Desktop {
    handle: DesktopHandle,
    generation: u64,
    name: RwLock<String>,
    wallpaper: RwLock<String>,
    index: AtomicI32,
    context: Weak<Shared>,
}

impl Desktop {
    pub(crate) fn new(
        handle: DesktopHandle,
        generation: u64,
        name: String,
        wallpaper: String,
        context: Weak<Shared>,
    ) -> Self {
        Self {
            handle,
            generation,
            name: RwLock::new(name),
            wallpaper: RwLock::new(wallpaper),
            index: AtomicI32::new(-1),
            context,
        }
    }

    pub fn id(&self) -> DesktopId {
        self.handle.id()
    }

    /// Display name; empty when unnamed or when the layout has no names.
    pub fn name(&self) -> String {
        read(&self.name)
    }

    pub fn wallpaper_path(&self) -> String {
        read(&self.wallpaper)
    }

    /// Position among all desktops as last observed.
    ///
    /// Positions are learned from a full listing (`all_desktops`, `create`)
    /// and kept current by move and removal notifications. A wrapper first
    /// reached some other way reports `None` until the next listing.
    pub fn index(&self) -> Option<usize> {
        usize::try_from(self.index.load(Ordering::SeqCst)).ok()
    }

    /// Binding generation this wrapper was created under.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn handle(&self) -> &DesktopHandle {
        &self.handle
    }

    pub(crate) fn set_name(&self, name: &str) {
        write(&self.name, name);
    }

    pub(crate) fn set_wallpaper_path(&self, path: &str) {
        write(&self.wallpaper, path);
    }

    pub(crate) fn set_index(&self, index: i32) {
        self.index.store(index, Ordering::SeqCst);
    }

    fn context(&self) -> Result<Arc<Shared>> {
        self.context
            .upgrade()
            .ok_or_else(|| DeskwerkError::Binding("desktop context has been dropped".into()))
    }

    // -- Mutators ---------------------------------------------------------------

    pub fn rename(&self, name: &str) -> Result<()> {
        self.context()?.rename(self, name)
    }

    pub fn set_wallpaper(&self, path: &str) -> Result<()> {
        self.context()?.set_wallpaper(self, path)
    }

    pub fn switch_to(&self) -> Result<()> {
        self.context()?.switch_to(self)
    }

    /// Move this desktop to position `index`.
    pub fn move_to(&self, index: usize) -> Result<()> {
        self.context()?.move_desktop(self, index)
    }

    pub fn left(&self) -> Result<Option<Arc<Desktop>>> {
        self.context()?.adjacent(self, AdjacentDirection::Left)
    }

    pub fn right(&self) -> Result<Option<Arc<Desktop>>> {
        self.context()?.adjacent(self, AdjacentDirection::Right)
    }

    /// Remove this desktop; `false` if it was already gone.
    pub fn remove(&self, fallback: Option<&Desktop>) -> Result<bool> {
        self.context()?.remove(self, fallback)
    }
}

impl fmt::Debug for Desktop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Desktop")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("index", &self.index())
            .field("generation", &self.generation)
            .finish()
    }
}

impl fmt::Display for Desktop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        if name.is_empty() {
            write!(f, "{}", self.id())
        } else {
            write!(f, "{name} ({})", self.id())
        }
    }
}

fn read(lock: &RwLock<String>) -> String {
    lock.read().unwrap_or_else(|p| p.into_inner()).clone()
}

fn write(lock: &RwLock<String>, value: &str) {
    *lock.write().unwrap_or_else(|p| p.into_inner()) = value.to_string();
}
