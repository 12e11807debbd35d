// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub host for platforms without a virtual desktop manager.

use deskwerk_core::error::{DeskwerkError, Result};
use deskwerk_core::types::BuildVersion;

use crate::catalog::InterfaceVariant;
use crate::traits::*;

/// Host returned on non-Windows targets.
pub struct StubHost;

impl NativeHost for StubHost {
    fn platform_name(&self) -> &str {
        "stub"
    }

    fn os_version(&self) -> Option<BuildVersion> {
        None
    }

    fn os_revision(&self) -> Option<u32> {
        None
    }

    fn connect(&self, variant: &'static InterfaceVariant) -> Result<Box<dyn NativeSession>> {
        tracing::warn!(variant = variant.name(), "NativeHost::connect called on stub host");
        Err(DeskwerkError::Unsupported { build: None })
    }

    fn watch_shell_restart(&self, _on_restart: RestartCallback) -> Result<Box<dyn RestartListener>> {
        tracing::warn!("NativeHost::watch_shell_restart called on stub host");
        Err(DeskwerkError::Unsupported { build: None })
    }
}
