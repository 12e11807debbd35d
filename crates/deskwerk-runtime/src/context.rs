// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `VirtualDesktops`: the context object behind the public API.
//
// One context owns one binding slot, one identity cache, one notification
// subscription and (optionally) one shell-restart listener. Public calls go
// cache -> safe invocation -> binding; notifications come back through the
// same cache before they reach subscribers.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, RwLock, Weak};

use deskwerk_core::config::DesktopConfig;
use deskwerk_core::error::{DeskwerkError, Result};
use deskwerk_core::types::{AdjacentDirection, BuildVersion, DesktopId, NativeErrorCode, WindowHandle};
use deskwerk_interop::catalog::{InterfaceVariant, LogicalOp, VariantId};
use deskwerk_interop::traits::{NativeHost, RestartListener};
use deskwerk_interop::{Binding, DesktopHandle, fingerprint, platform_host, resolve_variant};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::cache::IdentityCache;
use crate::desktop::Desktop;
use crate::events::{DesktopEvent, DesktopEventKind};
use crate::invoke::{BenignCodes, invoke};
use crate::notifications::NotificationSubscription;
use crate::recovery::RecoveryState;
use crate::slot::BindingSlot;

/// Mutable lifecycle resources, guarded by one lock.
#[derive(Default)]
pub(crate) struct Lifecycle {
    pub(crate) subscription: Option<NotificationSubscription>,
    pub(crate) listener: Option<Box<dyn RestartListener>>,
}

struct Status {
    state: RecoveryState,
    failure: Option<String>,
}

pub(crate) struct Shared {
    me: Weak<Shared>,
    host: Arc<dyn NativeHost>,
    config: DesktopConfig,
    benign: BenignCodes,
    build: OnceLock<Option<BuildVersion>>,
    slot: BindingSlot,
    cache: IdentityCache,
    events: broadcast::Sender<DesktopEvent>,
    status: RwLock<Status>,
    lifecycle: Mutex<Lifecycle>,
}

impl Shared {
    // -- Accessors --------------------------------------------------------------

    pub(crate) fn weak(&self) -> Weak<Shared> {
        self.me.clone()
    }

    pub(crate) fn host(&self) -> &dyn NativeHost {
        self.host.as_ref()
    }

    pub(crate) fn config(&self) -> &DesktopConfig {
        &self.config
    }

    pub(crate) fn slot(&self) -> &BindingSlot {
        &self.slot
    }

    pub(crate) fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    pub(crate) fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub(crate) fn state(&self) -> RecoveryState {
        self.status.read().unwrap_or_else(|p| p.into_inner()).state
    }

    pub(crate) fn failure(&self) -> Option<String> {
        self.status
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .failure
            .clone()
    }

    pub(crate) fn set_state(&self, state: RecoveryState, failure: Option<String>) {
        let mut status = self.status.write().unwrap_or_else(|p| p.into_inner());
        debug!(from = %status.state, to = %state, "recovery state");
        status.state = state;
        status.failure = failure;
    }

    pub(crate) fn build_version(&self) -> Option<BuildVersion> {
        *self.build.get_or_init(|| match self.config.build_override {
            Some(pinned) => {
                info!(build = %pinned, "using configured build override");
                Some(pinned)
            }
            None => fingerprint(self.host.as_ref()),
        })
    }

    pub(crate) fn resolve_layout(&self) -> Result<&'static InterfaceVariant> {
        match self.build_version() {
            Some(version) => resolve_variant(version),
            None => Err(DeskwerkError::Unsupported { build: None }),
        }
    }

    /// The published binding, if any, without waiting or initializing.
    pub(crate) fn published(&self) -> Option<Arc<Binding>> {
        self.slot.current()
    }

    /// The binding to call through: initializes lazily, waits (bounded)
    /// while a recovery is in flight.
    pub(crate) fn binding(&self) -> Result<Arc<Binding>> {
        if let Some(binding) = self.slot.current() {
            return Ok(binding);
        }
        match self.state() {
            RecoveryState::Uninitialized => self.initialize()?,
            RecoveryState::Failed => return Err(self.failed_error()),
            RecoveryState::Active | RecoveryState::Recovering => {}
        }
        self.slot.wait(self.config.ready_timeout())
    }

    pub(crate) fn broadcast(&self, kind: DesktopEventKind) {
        let event = DesktopEvent::new(kind);
        if self.events.send(event).is_err() {
            debug!("desktop event dropped; no subscribers");
        }
    }

    // -- Identity -------------------------------------------------------------

    /// The cached wrapper for `handle`, created on first sight.
    pub(crate) fn resolve(&self, binding: &Binding, handle: DesktopHandle) -> Result<Arc<Desktop>> {
        self.cache
            .resolve(handle.id(), || self.build_wrapper(binding, handle))
    }

    /// The wrapper for a desktop the shell just destroyed.
    ///
    /// Returns the cached wrapper when there is one. Otherwise the desktop
    /// was never seen, and a detached wrapper is returned without caching it.
    pub(crate) fn resolve_departed(
        &self,
        binding: &Binding,
        handle: DesktopHandle,
    ) -> Result<Arc<Desktop>> {
        match self.cache.get(handle.id()) {
            Some(desktop) => Ok(desktop),
            None => self.build_wrapper(binding, handle).map(Arc::new),
        }
    }

    fn build_wrapper(&self, binding: &Binding, handle: DesktopHandle) -> Result<Desktop> {
        let id = handle.id();
        let name = self.optional_text(binding, LogicalOp::GetName, || binding.desktop_name(&handle))?;
        let wallpaper = self.optional_text(binding, LogicalOp::GetWallpaperPath, || {
            binding.desktop_wallpaper(&handle)
        })?;
        debug!(%id, generation = binding.generation(), "desktop wrapper created");
        Ok(Desktop::new(
            handle,
            binding.generation(),
            name,
            wallpaper,
            self.weak(),
        ))
    }

    fn optional_text(
        &self,
        binding: &Binding,
        op: LogicalOp,
        call: impl FnOnce() -> Result<String>,
    ) -> Result<String> {
        if !binding.supports(op) {
            return Ok(String::new());
        }
        Ok(invoke(&self.benign, call)?.unwrap_or_default())
    }

    /// A native handle for `desktop` that is valid for `binding`.
    fn handle_for(&self, binding: &Binding, desktop: &Desktop) -> Result<DesktopHandle> {
        if desktop.generation() == binding.generation() {
            Ok(desktop.handle().clone())
        } else {
            binding.find_desktop(desktop.id())
        }
    }

    // -- Operations -------------------------------------------------------------

    pub(crate) fn current_desktop(&self) -> Result<Arc<Desktop>> {
        let binding = self.binding()?;
        let handle = binding.current_desktop()?;
        self.resolve(&binding, handle)
    }

    pub(crate) fn all_desktops(&self) -> Result<Vec<Arc<Desktop>>> {
        let binding = self.binding()?;
        self.refresh_positions(&binding)
    }

    /// Every desktop in shell order, with each wrapper's position updated.
    fn refresh_positions(&self, binding: &Binding) -> Result<Vec<Arc<Desktop>>> {
        let handles = binding.desktops()?;
        let mut desktops = Vec::with_capacity(handles.len());
        for (index, handle) in handles.into_iter().enumerate() {
            let desktop = self.resolve(binding, handle)?;
            desktop.set_index(index as i32);
            desktops.push(desktop);
        }
        Ok(desktops)
    }

    pub(crate) fn all_current_desktops(&self) -> Result<Vec<Arc<Desktop>>> {
        let binding = self.binding()?;
        binding
            .all_current_desktops()?
            .into_iter()
            .map(|handle| self.resolve(&binding, handle))
            .collect()
    }

    pub(crate) fn desktop_count(&self) -> Result<u32> {
        self.binding()?.desktop_count()
    }

    pub(crate) fn create(&self) -> Result<Arc<Desktop>> {
        let binding = self.binding()?;
        let handle = binding.create_desktop()?;
        let desktop = self.resolve(&binding, handle)?;
        self.refresh_positions(&binding)?;
        info!(id = %desktop.id(), index = ?desktop.index(), "desktop created");
        Ok(desktop)
    }

    pub(crate) fn remove(&self, desktop: &Desktop, fallback: Option<&Desktop>) -> Result<bool> {
        let binding = self.binding()?;
        let Some(target) = invoke(&self.benign, || binding.find_desktop(desktop.id()))? else {
            debug!(id = %desktop.id(), "desktop already removed");
            return Ok(false);
        };

        let chosen = match fallback {
            Some(f) => invoke(&self.benign, || self.handle_for(&binding, f))?,
            None => None,
        };
        let fallback = match chosen {
            Some(handle) => handle,
            None => self.neighbour(&binding, &target)?,
        };

        match invoke(&self.benign, || binding.remove_desktop(&target, &fallback))? {
            // The wrapper stays cached until the shell reports the removal.
            Some(()) => {
                info!(id = %desktop.id(), fallback = %fallback.id(), "desktop removed");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Left neighbour, else right neighbour.
    fn neighbour(&self, binding: &Binding, target: &DesktopHandle) -> Result<DesktopHandle> {
        for direction in [AdjacentDirection::Left, AdjacentDirection::Right] {
            if let Some(handle) = invoke(&self.benign, || binding.adjacent_desktop(target, direction))? {
                return Ok(handle);
            }
        }
        warn!(id = %target.id(), "refusing to remove the only desktop");
        Err(DeskwerkError::NativeCall {
            op: LogicalOp::RemoveDesktop.name(),
            code: NativeErrorCode::INVALID_ARG,
        })
    }

    pub(crate) fn switch_to(&self, desktop: &Desktop) -> Result<()> {
        let binding = self.binding()?;
        let handle = self.handle_for(&binding, desktop)?;
        binding.switch_desktop(&handle)
    }

    pub(crate) fn move_desktop(&self, desktop: &Desktop, index: usize) -> Result<()> {
        let index = i32::try_from(index)
            .map_err(|_| DeskwerkError::Config(format!("desktop index {index} out of range")))?;
        let binding = self.binding()?;
        let handle = self.handle_for(&binding, desktop)?;
        binding.move_desktop(&handle, index)
    }

    pub(crate) fn adjacent(
        &self,
        desktop: &Desktop,
        direction: AdjacentDirection,
    ) -> Result<Option<Arc<Desktop>>> {
        let binding = self.binding()?;
        let handle = self.handle_for(&binding, desktop)?;
        match invoke(&self.benign, || binding.adjacent_desktop(&handle, direction))? {
            Some(found) => self.resolve(&binding, found).map(Some),
            None => Ok(None),
        }
    }

    pub(crate) fn find_by_id(&self, id: DesktopId) -> Result<Option<Arc<Desktop>>> {
        let binding = self.binding()?;
        match invoke(&self.benign, || binding.find_desktop(id))? {
            Some(handle) => self.resolve(&binding, handle).map(Some),
            None => Ok(None),
        }
    }

    pub(crate) fn rename(&self, desktop: &Desktop, name: &str) -> Result<()> {
        let binding = self.binding()?;
        let handle = self.handle_for(&binding, desktop)?;
        binding.set_desktop_name(&handle, name)?;
        desktop.set_name(name);
        Ok(())
    }

    pub(crate) fn set_wallpaper(&self, desktop: &Desktop, path: &str) -> Result<()> {
        let binding = self.binding()?;
        let handle = self.handle_for(&binding, desktop)?;
        binding.set_desktop_wallpaper(&handle, path)?;
        desktop.set_wallpaper_path(path);
        Ok(())
    }

    pub(crate) fn set_wallpaper_for_all(&self, path: &str) -> Result<()> {
        self.binding()?.update_wallpaper_for_all(path)?;
        for desktop in self.cache.snapshot() {
            desktop.set_wallpaper_path(path);
        }
        Ok(())
    }

    pub(crate) fn move_view(&self, window: WindowHandle, desktop: &Desktop) -> Result<()> {
        let binding = self.binding()?;
        let handle = self.handle_for(&binding, desktop)?;
        binding.move_view(window, &handle)
    }

    pub(crate) fn can_move_view(&self, window: WindowHandle) -> Result<bool> {
        self.binding()?.can_move_view(window)
    }
}

/// Entry point: stable access to the shell's virtual desktops.
///
/// Cheap to clone; clones share one binding, cache and event stream.
#[derive(Clone)]
pub struct VirtualDesktops {
    shared: Arc<Shared>,
}

impl VirtualDesktops {
    /// A context for the running host.
    pub fn new(config: DesktopConfig) -> Self {
        Self::with_host(platform_host(), config)
    }

    /// A context driving the given host backend.
    pub fn with_host(host: Arc<dyn NativeHost>, config: DesktopConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let benign = BenignCodes::default().widen(&config.extra_benign_codes);
        let shared = Arc::new_cyclic(|me| Shared {
            me: me.clone(),
            host,
            config,
            benign,
            build: OnceLock::new(),
            slot: BindingSlot::new(),
            cache: IdentityCache::new(),
            events,
            status: RwLock::new(Status {
                state: RecoveryState::Uninitialized,
                failure: None,
            }),
            lifecycle: Mutex::new(Lifecycle::default()),
        });
        Self { shared }
    }

    // -- Lifecycle --------------------------------------------------------------

    /// Whether this host has a known interface layout.
    pub fn is_supported(&self) -> bool {
        self.shared.resolve_layout().is_ok()
    }

    /// Bind now instead of on first use.
    pub fn initialize(&self) -> Result<()> {
        self.shared.initialize()
    }

    pub fn state(&self) -> RecoveryState {
        self.shared.state()
    }

    pub fn build_version(&self) -> Option<BuildVersion> {
        self.shared.build_version()
    }

    pub fn variant(&self) -> Result<VariantId> {
        self.shared.resolve_layout().map(|v| v.id)
    }

    /// Generation of the published binding.
    pub fn generation(&self) -> Option<u64> {
        self.shared.published().map(|b| b.generation())
    }

    /// Run restart recovery now. The restart listener calls this too.
    pub fn notify_shell_restarted(&self) {
        self.shared.recover();
    }

    /// Unregister notifications, stop the restart listener and forget every
    /// wrapper. A later call binds again from scratch.
    pub fn shutdown(&self) {
        self.shared.shutdown();
    }

    pub fn config(&self) -> &DesktopConfig {
        self.shared.config()
    }

    /// Number of wrappers currently cached.
    pub fn cached_count(&self) -> usize {
        self.shared.cache().len()
    }

    // -- Desktops ---------------------------------------------------------------

    pub fn current_desktop(&self) -> Result<Arc<Desktop>> {
        self.shared.current_desktop()
    }

    /// Every desktop, in order. Refreshes the position of each wrapper.
    pub fn all_desktops(&self) -> Result<Vec<Arc<Desktop>>> {
        self.shared.all_desktops()
    }

    /// The current desktop of every monitor.
    pub fn all_current_desktops(&self) -> Result<Vec<Arc<Desktop>>> {
        self.shared.all_current_desktops()
    }

    pub fn desktop_count(&self) -> Result<u32> {
        self.shared.desktop_count()
    }

    /// Create a desktop. Its position is read from a fresh listing.
    pub fn create(&self) -> Result<Arc<Desktop>> {
        self.shared.create()
    }

    /// Remove `desktop`, switching to `fallback` (or a neighbour) if it was
    /// current. Returns `false` when the desktop was already gone.
    pub fn remove(&self, desktop: &Desktop, fallback: Option<&Desktop>) -> Result<bool> {
        self.shared.remove(desktop, fallback)
    }

    pub fn switch_to(&self, desktop: &Desktop) -> Result<()> {
        self.shared.switch_to(desktop)
    }

    pub fn move_desktop(&self, desktop: &Desktop, index: usize) -> Result<()> {
        self.shared.move_desktop(desktop, index)
    }

    pub fn adjacent(
        &self,
        desktop: &Desktop,
        direction: AdjacentDirection,
    ) -> Result<Option<Arc<Desktop>>> {
        self.shared.adjacent(desktop, direction)
    }

    pub fn find_by_id(&self, id: DesktopId) -> Result<Option<Arc<Desktop>>> {
        self.shared.find_by_id(id)
    }

    pub fn set_wallpaper_for_all(&self, path: &str) -> Result<()> {
        self.shared.set_wallpaper_for_all(path)
    }

    // -- Views ------------------------------------------------------------------

    pub fn move_view(&self, window: WindowHandle, desktop: &Desktop) -> Result<()> {
        self.shared.move_view(window, desktop)
    }

    pub fn can_move_view(&self, window: WindowHandle) -> Result<bool> {
        self.shared.can_move_view(window)
    }

    // -- Events and raw access -------------------------------------------------

    /// Stream of desktop events, starting now.
    pub fn subscribe(&self) -> broadcast::Receiver<DesktopEvent> {
        self.shared.events.subscribe()
    }

    /// Call the binding directly, treating `extra` codes as benign on top of
    /// the context's set.
    pub fn invoke_with<T>(
        &self,
        extra: &[NativeErrorCode],
        call: impl FnOnce(&Binding) -> Result<T>,
    ) -> Result<Option<T>> {
        let binding = self.shared.binding()?;
        invoke(&self.shared.benign.widen(extra), || call(&binding))
    }
}

impl std::fmt::Debug for VirtualDesktops {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualDesktops")
            .field("state", &self.state())
            .field("generation", &self.generation())
            .field("cached", &self.cached_count())
            .finish()
    }
}
