// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Deskwerk interop: versioned bindings to the shell's virtual desktop
// interfaces.
//
// The `catalog` describes every known binary layout as data; `binding` drives
// whichever layout the host build selects through the `NativeHost` seam.
// Platform backends live behind cfg gates, with a stub for hosts that have no
// virtual desktop manager at all.

pub mod binding;
pub mod catalog;
pub mod fingerprint;
pub mod traits;

#[cfg(windows)]
pub mod win32;

#[cfg(not(windows))]
pub mod stub;

#[cfg(any(test, feature = "fake-host"))]
pub mod fake;

use std::sync::Arc;

pub use binding::{Binding, DesktopHandle, build_binding};
pub use catalog::{CATALOG, InterfaceVariant, LogicalOp, VariantId, resolve_variant};
pub use fingerprint::{current_build_version, fingerprint};
pub use traits::{NativeEvent, NativeEventSink, NativeHost};

/// Host backend for the operating system this crate was compiled for.
pub fn platform_host() -> Arc<dyn NativeHost> {
    #[cfg(windows)]
    {
        Arc::new(win32::WindowsHost::new())
    }
    #[cfg(not(windows))]
    {
        // No shell to talk to; every connection attempt reports Unsupported.
        Arc::new(stub::StubHost)
    }
}
