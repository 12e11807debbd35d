// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory shell used by tests and demos.
//
// Behaves like the real desktop manager at the level the binding can observe:
// objects die with the shell (restart bumps an epoch and every older object
// answers `RPC_E_DISCONNECTED`), lookups of removed desktops answer
// `TYPE_E_ELEMENTNOTFOUND`, and every state change is reported to registered
// sinks in order. Calls are also checked against the descriptor's parameter
// list, so a binding that shapes arguments wrongly fails loudly here.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use deskwerk_core::error::{DeskwerkError, Result};
use deskwerk_core::types::{AdjacentDirection, BuildVersion, DesktopId, NativeErrorCode};
use tracing::debug;

use crate::catalog::{InterfaceVariant, LogicalOp, MethodDescriptor, Param};
use crate::traits::{
    NativeArg, NativeEvent, NativeEventSink, NativeHost, NativeObject, NativeResult, NativeSession,
    NativeValue, RestartCallback, RestartListener,
};

/// Native object handed out by the fake shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FakeRef {
    id: DesktopId,
    epoch: u64,
}

#[derive(Debug, Clone)]
struct FakeDesktop {
    id: DesktopId,
    name: String,
    wallpaper: String,
}

struct Registration {
    cookie: u32,
    sink: Arc<dyn NativeEventSink>,
}

struct FakeShell {
    epoch: u64,
    desktops: Vec<FakeDesktop>,
    current: DesktopId,
    sinks: Vec<Registration>,
    next_cookie: u32,
    views: HashMap<isize, DesktopId>,
    failures: HashMap<LogicalOp, NativeErrorCode>,
}

struct FakeInner {
    version: BuildVersion,
    hide_revision: AtomicBool,
    refuse: AtomicBool,
    calls: AtomicUsize,
    shell: Mutex<FakeShell>,
    watchers: Mutex<Vec<(u64, RestartCallback)>>,
    next_watcher: AtomicU64,
}

/// Scriptable stand-in for the Windows shell.
#[derive(Clone)]
pub struct FakeHost {
    inner: Arc<FakeInner>,
}

impl FakeHost {
    /// A shell with a single desktop named "Desktop 1".
    pub fn new(version: BuildVersion) -> Self {
        Self::with_desktops(version, &["Desktop 1"])
    }

    /// A shell with one desktop per name; the first one is current.
    pub fn with_desktops(version: BuildVersion, names: &[&str]) -> Self {
        let mut desktops: Vec<FakeDesktop> = names
            .iter()
            .map(|name| FakeDesktop {
                id: DesktopId::new(),
                name: name.to_string(),
                wallpaper: String::new(),
            })
            .collect();
        if desktops.is_empty() {
            desktops.push(FakeDesktop {
                id: DesktopId::new(),
                name: String::new(),
                wallpaper: String::new(),
            });
        }
        let current = desktops[0].id;

        Self {
            inner: Arc::new(FakeInner {
                version,
                hide_revision: AtomicBool::new(false),
                refuse: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
                shell: Mutex::new(FakeShell {
                    epoch: 0,
                    desktops,
                    current,
                    sinks: Vec::new(),
                    next_cookie: 1,
                    views: HashMap::new(),
                    failures: HashMap::new(),
                }),
                watchers: Mutex::new(Vec::new()),
                next_watcher: AtomicU64::new(1),
            }),
        }
    }

    fn shell(&self) -> MutexGuard<'_, FakeShell> {
        lock(&self.inner.shell)
    }

    // -- Knobs ----------------------------------------------------------------

    /// Make the update revision unreadable.
    pub fn hide_revision(&self) {
        self.inner.hide_revision.store(true, Ordering::SeqCst);
    }

    /// Make `connect` fail as if the shell object could not be created.
    pub fn refuse_connections(&self, refuse: bool) {
        self.inner.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Fail the next call of `op` with `code`.
    pub fn fail_next(&self, op: LogicalOp, code: NativeErrorCode) {
        self.shell().failures.insert(op, code);
    }

    // -- Observations ---------------------------------------------------------

    /// Number of native calls that reached the shell.
    pub fn native_calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    pub fn desktop_ids(&self) -> Vec<DesktopId> {
        self.shell().desktops.iter().map(|d| d.id).collect()
    }

    pub fn current_id(&self) -> DesktopId {
        self.shell().current
    }

    pub fn name_of(&self, id: DesktopId) -> Option<String> {
        self.shell()
            .desktops
            .iter()
            .find(|d| d.id == id)
            .map(|d| d.name.clone())
    }

    pub fn view_desktop(&self, window: isize) -> Option<DesktopId> {
        self.shell().views.get(&window).copied()
    }

    /// Number of live notification registrations.
    pub fn registrations(&self) -> usize {
        self.shell().sinks.len()
    }

    /// Number of installed restart listeners.
    pub fn restart_listeners(&self) -> usize {
        lock(&self.inner.watchers).len()
    }

    // -- Outside actions --------------------------------------------------------

    /// Kill and restart the shell: every object and registration dies, then
    /// restart listeners fire.
    pub fn restart_shell(&self) {
        {
            let mut shell = self.shell();
            shell.epoch += 1;
            shell.sinks.clear();
            debug!(epoch = shell.epoch, "fake shell restarted");
        }
        let watchers: Vec<RestartCallback> = lock(&self.inner.watchers)
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in watchers {
            callback();
        }
    }

    /// Rename a desktop as the user would from the task view.
    pub fn user_rename(&self, id: DesktopId, name: &str) {
        let events = {
            let mut shell = self.shell();
            let epoch = shell.epoch;
            match shell.desktops.iter_mut().find(|d| d.id == id) {
                Some(desktop) => {
                    desktop.name = name.to_string();
                    vec![NativeEvent::Renamed {
                        desktop: object(id, epoch),
                        name: name.to_string(),
                    }]
                }
                None => Vec::new(),
            }
        };
        self.emit(events);
    }

    /// Create a desktop as the user would; returns its id.
    pub fn user_create(&self, name: &str) -> DesktopId {
        let id = DesktopId::new();
        let events = {
            let mut shell = self.shell();
            shell.desktops.push(FakeDesktop {
                id,
                name: name.to_string(),
                wallpaper: String::new(),
            });
            vec![NativeEvent::Created {
                desktop: object(id, shell.epoch),
            }]
        };
        self.emit(events);
        id
    }

    /// Close a desktop as the user would, falling back to its neighbour.
    pub fn user_remove(&self, id: DesktopId) {
        let events = {
            let mut shell = self.shell();
            let Some(index) = shell.desktops.iter().position(|d| d.id == id) else {
                return;
            };
            if shell.desktops.len() < 2 {
                return;
            }
            let fallback = if index == 0 {
                shell.desktops[1].id
            } else {
                shell.desktops[index - 1].id
            };
            remove_locked(&mut shell, index, fallback)
        };
        self.emit(events);
    }

    fn emit(&self, events: Vec<NativeEvent>) {
        if events.is_empty() {
            return;
        }
        let sinks: Vec<Arc<dyn NativeEventSink>> = self
            .shell()
            .sinks
            .iter()
            .map(|r| Arc::clone(&r.sink))
            .collect();
        for event in events {
            for sink in &sinks {
                sink.on_event(event.clone());
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn object(id: DesktopId, epoch: u64) -> NativeObject {
    NativeObject::new(FakeRef { id, epoch })
}

fn remove_locked(shell: &mut FakeShell, index: usize, fallback: DesktopId) -> Vec<NativeEvent> {
    let epoch = shell.epoch;
    let removed = shell.desktops.remove(index);
    let mut events = vec![NativeEvent::DestroyBegin {
        desktop: object(removed.id, epoch),
        fallback: object(fallback, epoch),
    }];
    if shell.current == removed.id {
        shell.current = fallback;
        events.push(NativeEvent::CurrentChanged {
            old: object(removed.id, epoch),
            new: object(fallback, epoch),
        });
    }
    events.push(NativeEvent::Destroyed {
        desktop: object(removed.id, epoch),
        fallback: object(fallback, epoch),
    });
    events
}

impl NativeHost for FakeHost {
    fn platform_name(&self) -> &str {
        "fake shell"
    }

    fn os_version(&self) -> Option<BuildVersion> {
        Some(BuildVersion {
            revision: 0,
            ..self.inner.version
        })
    }

    fn os_revision(&self) -> Option<u32> {
        if self.inner.hide_revision.load(Ordering::SeqCst) {
            None
        } else {
            Some(self.inner.version.revision)
        }
    }

    fn connect(&self, variant: &'static InterfaceVariant) -> Result<Box<dyn NativeSession>> {
        if self.inner.refuse.load(Ordering::SeqCst) {
            return Err(DeskwerkError::Binding(
                "immersive shell is not running".into(),
            ));
        }
        let epoch = self.shell().epoch;
        Ok(Box::new(FakeSession {
            host: self.clone(),
            variant,
            epoch,
        }))
    }

    fn watch_shell_restart(&self, on_restart: RestartCallback) -> Result<Box<dyn RestartListener>> {
        let key = self.inner.next_watcher.fetch_add(1, Ordering::SeqCst);
        lock(&self.inner.watchers).push((key, on_restart));
        Ok(Box::new(FakeRestartListener {
            inner: Arc::downgrade(&self.inner),
            key,
        }))
    }
}

struct FakeRestartListener {
    inner: Weak<FakeInner>,
    key: u64,
}

impl RestartListener for FakeRestartListener {}

impl Drop for FakeRestartListener {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            lock(&inner.watchers).retain(|(key, _)| *key != self.key);
        }
    }
}

struct FakeSession {
    host: FakeHost,
    variant: &'static InterfaceVariant,
    epoch: u64,
}

impl FakeSession {
    fn desktop_arg(&self, shell: &FakeShell, arg: Option<&NativeArg<'_>>) -> NativeResult<(usize, DesktopId)> {
        let Some(NativeArg::Desktop(obj)) = arg else {
            return Err(NativeErrorCode::INVALID_ARG);
        };
        let fake = self.resolve(shell, obj)?;
        shell
            .desktops
            .iter()
            .position(|d| d.id == fake.id)
            .map(|i| (i, fake.id))
            .ok_or(NativeErrorCode::ELEMENT_NOT_FOUND)
    }

    fn resolve(&self, shell: &FakeShell, obj: &NativeObject) -> NativeResult<FakeRef> {
        let fake = obj
            .downcast_ref::<FakeRef>()
            .copied()
            .ok_or(NativeErrorCode::NO_INTERFACE)?;
        if fake.epoch != shell.epoch {
            return Err(NativeErrorCode::DISCONNECTED);
        }
        Ok(fake)
    }

    fn text_arg<'a>(arg: Option<&'a NativeArg<'_>>) -> NativeResult<&'a str> {
        match arg {
            Some(NativeArg::Text(t)) => Ok(t),
            _ => Err(NativeErrorCode::INVALID_ARG),
        }
    }

    fn check_shape(method: &MethodDescriptor, args: &[NativeArg<'_>]) -> NativeResult<()> {
        if method.params.len() != args.len() {
            return Err(NativeErrorCode::INVALID_ARG);
        }
        for (param, arg) in method.params.iter().zip(args) {
            let ok = matches!(
                (param, arg),
                (Param::Monitor, NativeArg::Monitor)
                    | (Param::Desktop, NativeArg::Desktop(_))
                    | (Param::View, NativeArg::View(_))
                    | (Param::Guid, NativeArg::Guid(_))
                    | (Param::Text, NativeArg::Text(_))
                    | (Param::Index, NativeArg::Index(_))
                    | (Param::Direction, NativeArg::Direction(_))
                    | (Param::Sink, NativeArg::Sink(_))
                    | (Param::Cookie, NativeArg::Cookie(_))
            );
            if !ok {
                return Err(NativeErrorCode::INVALID_ARG);
            }
        }
        Ok(())
    }

    fn dispatch(
        &self,
        shell: &mut FakeShell,
        method: &MethodDescriptor,
        target: Option<&NativeObject>,
        args: &[NativeArg<'_>],
        events: &mut Vec<NativeEvent>,
    ) -> NativeResult<NativeValue> {
        let epoch = shell.epoch;
        // Drop the monitor placeholders; the fake has a single monitor.
        let args: Vec<&NativeArg<'_>> = args
            .iter()
            .filter(|a| !matches!(a, NativeArg::Monitor))
            .collect();
        let arg = |i: usize| args.get(i).copied();

        match method.op {
            LogicalOp::GetCount => Ok(NativeValue::Count(shell.desktops.len() as u32)),
            LogicalOp::GetCurrentDesktop => Ok(NativeValue::Object(object(shell.current, epoch))),
            LogicalOp::GetDesktops => Ok(NativeValue::Objects(
                shell.desktops.iter().map(|d| object(d.id, epoch)).collect(),
            )),
            LogicalOp::GetAllCurrentDesktops => {
                Ok(NativeValue::Objects(vec![object(shell.current, epoch)]))
            }
            LogicalOp::GetAdjacentDesktop => {
                let (index, _) = self.desktop_arg(shell, arg(0))?;
                let neighbour = match arg(1) {
                    Some(NativeArg::Direction(AdjacentDirection::Left)) => index.checked_sub(1),
                    Some(NativeArg::Direction(AdjacentDirection::Right)) => Some(index + 1),
                    _ => return Err(NativeErrorCode::INVALID_ARG),
                };
                neighbour
                    .and_then(|i| shell.desktops.get(i))
                    .map(|d| NativeValue::Object(object(d.id, epoch)))
                    .ok_or(NativeErrorCode::ELEMENT_NOT_FOUND)
            }
            LogicalOp::SwitchDesktop => {
                let (_, id) = self.desktop_arg(shell, arg(0))?;
                if shell.current != id {
                    events.push(NativeEvent::CurrentChanged {
                        old: object(shell.current, epoch),
                        new: object(id, epoch),
                    });
                    shell.current = id;
                }
                Ok(NativeValue::Unit)
            }
            LogicalOp::CreateDesktop => {
                let id = DesktopId::new();
                shell.desktops.push(FakeDesktop {
                    id,
                    name: String::new(),
                    wallpaper: String::new(),
                });
                events.push(NativeEvent::Created {
                    desktop: object(id, epoch),
                });
                Ok(NativeValue::Object(object(id, epoch)))
            }
            LogicalOp::MoveDesktop => {
                let (from, id) = self.desktop_arg(shell, arg(0))?;
                let Some(NativeArg::Index(to)) = arg(1) else {
                    return Err(NativeErrorCode::INVALID_ARG);
                };
                let to = usize::try_from(*to).map_err(|_| NativeErrorCode::INVALID_ARG)?;
                if to >= shell.desktops.len() {
                    return Err(NativeErrorCode::INVALID_ARG);
                }
                let desktop = shell.desktops.remove(from);
                shell.desktops.insert(to, desktop);
                events.push(NativeEvent::Moved {
                    desktop: object(id, epoch),
                    from: from as i32,
                    to: to as i32,
                });
                Ok(NativeValue::Unit)
            }
            LogicalOp::RemoveDesktop => {
                let (index, id) = self.desktop_arg(shell, arg(0))?;
                let (_, fallback) = self.desktop_arg(shell, arg(1))?;
                if fallback == id {
                    return Err(NativeErrorCode::INVALID_ARG);
                }
                events.extend(remove_locked(shell, index, fallback));
                Ok(NativeValue::Unit)
            }
            LogicalOp::FindDesktop => {
                let Some(NativeArg::Guid(guid)) = arg(0) else {
                    return Err(NativeErrorCode::INVALID_ARG);
                };
                shell
                    .desktops
                    .iter()
                    .find(|d| d.id.0 == *guid)
                    .map(|d| NativeValue::Object(object(d.id, epoch)))
                    .ok_or(NativeErrorCode::ELEMENT_NOT_FOUND)
            }
            LogicalOp::SetDesktopName => {
                let (index, id) = self.desktop_arg(shell, arg(0))?;
                let name = Self::text_arg(arg(1))?;
                shell.desktops[index].name = name.to_string();
                events.push(NativeEvent::Renamed {
                    desktop: object(id, epoch),
                    name: name.to_string(),
                });
                Ok(NativeValue::Unit)
            }
            LogicalOp::SetDesktopWallpaper => {
                let (index, id) = self.desktop_arg(shell, arg(0))?;
                let path = Self::text_arg(arg(1))?;
                shell.desktops[index].wallpaper = path.to_string();
                events.push(NativeEvent::WallpaperChanged {
                    desktop: object(id, epoch),
                    path: path.to_string(),
                });
                Ok(NativeValue::Unit)
            }
            LogicalOp::UpdateWallpaperForAllDesktops => {
                let path = Self::text_arg(arg(0))?;
                for desktop in shell.desktops.iter_mut() {
                    desktop.wallpaper = path.to_string();
                    events.push(NativeEvent::WallpaperChanged {
                        desktop: object(desktop.id, epoch),
                        path: path.to_string(),
                    });
                }
                Ok(NativeValue::Unit)
            }
            LogicalOp::MoveViewToDesktop => {
                let Some(NativeArg::View(window)) = arg(0) else {
                    return Err(NativeErrorCode::INVALID_ARG);
                };
                if window.0 == 0 {
                    return Err(NativeErrorCode::ELEMENT_NOT_FOUND);
                }
                let (_, id) = self.desktop_arg(shell, arg(1))?;
                shell.views.insert(window.0, id);
                events.push(NativeEvent::ViewChanged);
                Ok(NativeValue::Unit)
            }
            LogicalOp::CanViewMoveDesktops => match arg(0) {
                Some(NativeArg::View(window)) => Ok(NativeValue::Bool(window.0 != 0)),
                _ => Err(NativeErrorCode::INVALID_ARG),
            },
            LogicalOp::GetId | LogicalOp::GetName | LogicalOp::GetWallpaperPath => {
                let obj = target.ok_or(NativeErrorCode::INVALID_ARG)?;
                let fake = self.resolve(shell, obj)?;
                if method.op == LogicalOp::GetId {
                    return Ok(NativeValue::Guid(fake.id.0));
                }
                let desktop = shell
                    .desktops
                    .iter()
                    .find(|d| d.id == fake.id)
                    .ok_or(NativeErrorCode::ELEMENT_NOT_FOUND)?;
                Ok(NativeValue::Text(if method.op == LogicalOp::GetName {
                    desktop.name.clone()
                } else {
                    desktop.wallpaper.clone()
                }))
            }
            LogicalOp::RegisterNotifications => {
                let Some(NativeArg::Sink(sink)) = arg(0) else {
                    return Err(NativeErrorCode::INVALID_ARG);
                };
                let cookie = shell.next_cookie;
                shell.next_cookie += 1;
                shell.sinks.push(Registration {
                    cookie,
                    sink: Arc::clone(sink),
                });
                Ok(NativeValue::Cookie(cookie))
            }
            LogicalOp::UnregisterNotifications => {
                let Some(NativeArg::Cookie(cookie)) = arg(0) else {
                    return Err(NativeErrorCode::INVALID_ARG);
                };
                let before = shell.sinks.len();
                shell.sinks.retain(|r| r.cookie != *cookie);
                if shell.sinks.len() == before {
                    return Err(NativeErrorCode::ELEMENT_NOT_FOUND);
                }
                Ok(NativeValue::Unit)
            }
        }
    }
}

impl NativeSession for FakeSession {
    fn invoke(
        &self,
        method: &MethodDescriptor,
        target: Option<&NativeObject>,
        args: &[NativeArg<'_>],
    ) -> NativeResult<NativeValue> {
        self.host.inner.calls.fetch_add(1, Ordering::SeqCst);
        debug_assert!(self.variant.method(method.op).is_some());

        let mut events = Vec::new();
        let result = {
            let mut shell = self.host.shell();
            if shell.epoch != self.epoch {
                return Err(NativeErrorCode::DISCONNECTED);
            }
            Self::check_shape(method, args)?;
            if let Some(code) = shell.failures.remove(&method.op) {
                return Err(code);
            }
            self.dispatch(&mut shell, method, target, args, &mut events)
        };

        self.host.emit(events);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BUILD_20348, BUILD_22621};

    #[test]
    fn stale_objects_are_disconnected_after_restart() {
        let host = FakeHost::new(BuildVersion::new(10, 0, 22621, 2215));
        let session = host.connect(&BUILD_22621).unwrap();
        let current = BUILD_22621.method(LogicalOp::GetCurrentDesktop).unwrap();
        assert!(session.invoke(current, None, &[]).is_ok());

        host.restart_shell();
        assert_eq!(
            session.invoke(current, None, &[]).unwrap_err(),
            NativeErrorCode::DISCONNECTED
        );
    }

    #[test]
    fn misshaped_arguments_are_rejected() {
        let host = FakeHost::new(BuildVersion::new(10, 0, 20348, 0));
        let session = host.connect(&BUILD_20348).unwrap();
        let current = BUILD_20348.method(LogicalOp::GetCurrentDesktop).unwrap();
        // This layout wants a monitor argument.
        assert_eq!(
            session.invoke(current, None, &[]).unwrap_err(),
            NativeErrorCode::INVALID_ARG
        );
        assert!(session.invoke(current, None, &[NativeArg::Monitor]).is_ok());
    }

    #[test]
    fn restart_listener_is_removed_on_drop() {
        let host = FakeHost::new(BuildVersion::new(10, 0, 22621, 2215));
        let listener = host.watch_shell_restart(Arc::new(|| {})).unwrap();
        assert_eq!(host.restart_listeners(), 1);
        drop(listener);
        assert_eq!(host.restart_listeners(), 0);
    }
}
