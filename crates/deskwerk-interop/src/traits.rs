// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host seam: the few things a platform backend must provide so that the
// binding can drive it from the catalog tables.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use deskwerk_core::error::Result;
use deskwerk_core::types::{AdjacentDirection, BuildVersion, NativeErrorCode, WindowHandle};
use uuid::Uuid;

use crate::catalog::{InterfaceVariant, MethodDescriptor};

/// Result of a raw native call: the failure side is the host's error code.
pub type NativeResult<T> = std::result::Result<T, NativeErrorCode>;

/// Opaque, reference-counted native object (a COM pointer on Windows).
#[derive(Clone)]
pub struct NativeObject(Arc<dyn Any + Send + Sync>);

impl NativeObject {
    pub fn new<T: Any + Send + Sync>(inner: T) -> Self {
        Self(Arc::new(inner))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for NativeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeObject({:p})", Arc::as_ptr(&self.0))
    }
}

/// One argument of a native call, shaped by a descriptor's `params`.
pub enum NativeArg<'a> {
    Monitor,
    Desktop(&'a NativeObject),
    View(WindowHandle),
    Guid(Uuid),
    Text(&'a str),
    Index(i32),
    Direction(AdjacentDirection),
    Sink(Arc<dyn NativeEventSink>),
    Cookie(u32),
}

impl fmt::Debug for NativeArg<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Monitor => write!(f, "Monitor"),
            Self::Desktop(o) => write!(f, "Desktop({o:?})"),
            Self::View(w) => write!(f, "View({:#x})", w.0),
            Self::Guid(g) => write!(f, "Guid({g})"),
            Self::Text(t) => write!(f, "Text({t:?})"),
            Self::Index(i) => write!(f, "Index({i})"),
            Self::Direction(d) => write!(f, "Direction({d:?})"),
            Self::Sink(_) => write!(f, "Sink"),
            Self::Cookie(c) => write!(f, "Cookie({c})"),
        }
    }
}

/// Decoded out-parameter of a native call.
#[derive(Debug)]
pub enum NativeValue {
    Unit,
    Count(u32),
    Bool(bool),
    Object(NativeObject),
    Objects(Vec<NativeObject>),
    Guid(Uuid),
    Text(String),
    Cookie(u32),
}

/// A notification as delivered by the host, before identity resolution.
#[derive(Debug, Clone)]
pub enum NativeEvent {
    Created {
        desktop: NativeObject,
    },
    DestroyBegin {
        desktop: NativeObject,
        fallback: NativeObject,
    },
    DestroyFailed {
        desktop: NativeObject,
        fallback: NativeObject,
    },
    Destroyed {
        desktop: NativeObject,
        fallback: NativeObject,
    },
    Moved {
        desktop: NativeObject,
        from: i32,
        to: i32,
    },
    Renamed {
        desktop: NativeObject,
        name: String,
    },
    WallpaperChanged {
        desktop: NativeObject,
        path: String,
    },
    CurrentChanged {
        old: NativeObject,
        new: NativeObject,
    },
    ViewChanged,
    PerMonitorChanged {
        enabled: bool,
    },
    RemoteConnected {
        desktop: NativeObject,
    },
}

/// Receiver for host notifications. Called on whatever thread the host uses.
pub trait NativeEventSink: Send + Sync {
    fn on_event(&self, event: NativeEvent);
}

/// A live connection to the shell's desktop manager objects.
pub trait NativeSession: Send + Sync {
    /// Call the method described by `method`.
    ///
    /// `target` is the desktop object for desktop-interface methods and
    /// `None` otherwise. `args` follow `method.params` one-to-one.
    fn invoke(
        &self,
        method: &MethodDescriptor,
        target: Option<&NativeObject>,
        args: &[NativeArg<'_>],
    ) -> NativeResult<NativeValue>;
}

/// Keeps a shell-restart listener alive; dropping it stops listening.
pub trait RestartListener: Send {}

/// Callback fired when the shell process has restarted.
pub type RestartCallback = Arc<dyn Fn() + Send + Sync>;

/// Platform backend.
pub trait NativeHost: Send + Sync {
    /// Human-readable backend name (e.g. "Windows shell", "stub").
    fn platform_name(&self) -> &str;

    /// OS version without the update revision. `None` when the host is not a
    /// platform that could have the facility at all.
    fn os_version(&self) -> Option<BuildVersion>;

    /// Update build revision, `None` if it cannot be read.
    fn os_revision(&self) -> Option<u32>;

    /// Instantiate the shell objects for `variant`.
    fn connect(&self, variant: &'static InterfaceVariant) -> Result<Box<dyn NativeSession>>;

    /// Start listening for shell restarts.
    fn watch_shell_restart(&self, on_restart: RestartCallback) -> Result<Box<dyn RestartListener>>;
}
