// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Windows host: registry fingerprint, immersive shell objects, notification
// sink and the TaskbarCreated listener.

mod restart;
mod shell;
mod sink;

use deskwerk_core::error::Result;
use deskwerk_core::types::BuildVersion;
use tracing::debug;
use windows::Win32::Foundation::ERROR_SUCCESS;
use windows::Win32::System::Registry::{
    HKEY_LOCAL_MACHINE, RRF_RT_REG_DWORD, RRF_RT_REG_SZ, RegGetValueW,
};
use windows::core::{HSTRING, PCWSTR, w};

use crate::catalog::InterfaceVariant;
use crate::traits::{NativeHost, NativeSession, RestartCallback, RestartListener};

const CURRENT_VERSION_KEY: PCWSTR = w!(r"SOFTWARE\Microsoft\Windows NT\CurrentVersion");

/// Host backed by the running Windows shell.
pub struct WindowsHost;

impl WindowsHost {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WindowsHost {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeHost for WindowsHost {
    fn platform_name(&self) -> &str {
        "Windows shell"
    }

    fn os_version(&self) -> Option<BuildVersion> {
        let major = read_dword(w!("CurrentMajorVersionNumber")).unwrap_or(10);
        let minor = read_dword(w!("CurrentMinorVersionNumber")).unwrap_or(0);
        let build = read_string(w!("CurrentBuildNumber"))?.trim().parse().ok()?;
        Some(BuildVersion::new(major, minor, build, 0))
    }

    fn os_revision(&self) -> Option<u32> {
        read_dword(w!("UBR"))
    }

    fn connect(&self, variant: &'static InterfaceVariant) -> Result<Box<dyn NativeSession>> {
        let session = shell::ShellSession::open(variant)?;
        Ok(Box::new(session))
    }

    fn watch_shell_restart(&self, on_restart: RestartCallback) -> Result<Box<dyn RestartListener>> {
        let listener = restart::TaskbarListener::spawn(on_restart)?;
        Ok(Box::new(listener))
    }
}

fn read_dword(value: PCWSTR) -> Option<u32> {
    let mut data: u32 = 0;
    let mut size = std::mem::size_of::<u32>() as u32;
    // SAFETY: `data` and `size` outlive the call and match RRF_RT_REG_DWORD.
    let status = unsafe {
        RegGetValueW(
            HKEY_LOCAL_MACHINE,
            CURRENT_VERSION_KEY,
            value,
            RRF_RT_REG_DWORD,
            None,
            Some(&mut data as *mut u32 as *mut _),
            Some(&mut size),
        )
    };
    if status != ERROR_SUCCESS {
        debug!(status = status.0, "registry DWORD read failed");
        return None;
    }
    Some(data)
}

fn read_string(value: PCWSTR) -> Option<String> {
    let mut buffer = [0u16; 64];
    let mut size = std::mem::size_of_val(&buffer) as u32;
    // SAFETY: `buffer` holds `size` bytes for the duration of the call.
    let status = unsafe {
        RegGetValueW(
            HKEY_LOCAL_MACHINE,
            CURRENT_VERSION_KEY,
            value,
            RRF_RT_REG_SZ,
            None,
            Some(buffer.as_mut_ptr() as *mut _),
            Some(&mut size),
        )
    };
    if status != ERROR_SUCCESS {
        debug!(status = status.0, "registry string read failed");
        return None;
    }
    let len = buffer.iter().position(|c| *c == 0).unwrap_or(buffer.len());
    Some(HSTRING::from_wide(&buffer[..len]).ok()?.to_string_lossy())
}
