// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for Deskwerk.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DeskwerkError;

/// Host OS build fingerprint, e.g. `10.0.22621.2215`.
///
/// Field order matters: the derived ordering compares major, then minor, then
/// build, then revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    /// Update build revision (the `UBR` registry value on Windows).
    pub revision: u32,
}

impl BuildVersion {
    pub const fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }
}

impl fmt::Display for BuildVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl FromStr for BuildVersion {
    type Err = DeskwerkError;

    /// Parse `major.minor.build[.revision]`; a missing revision means 0.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if !(3..=4).contains(&parts.len()) {
            return Err(DeskwerkError::InvalidVersion(s.to_string()));
        }

        let mut fields = [0u32; 4];
        for (i, part) in parts.iter().enumerate() {
            fields[i] = part
                .parse()
                .map_err(|_| DeskwerkError::InvalidVersion(s.to_string()))?;
        }

        Ok(Self::new(fields[0], fields[1], fields[2], fields[3]))
    }
}

/// Host-assigned identity of a virtual desktop. Stable across renames and
/// moves, but not across desktop removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DesktopId(pub Uuid);

impl DesktopId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DesktopId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for DesktopId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for DesktopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DesktopId {
    type Err = DeskwerkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('{').trim_end_matches('}');
        Uuid::parse_str(trimmed)
            .map(Self)
            .map_err(|e| DeskwerkError::Config(format!("invalid desktop id {s:?}: {e}")))
    }
}

/// A failure code reported by the native facility (an `HRESULT` on Windows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NativeErrorCode(pub i32);

impl NativeErrorCode {
    /// `TYPE_E_ELEMENTNOTFOUND`: the desktop no longer exists.
    pub const ELEMENT_NOT_FOUND: Self = Self(0x8002_802B_u32 as i32);
    /// `E_FAIL`.
    pub const FAIL: Self = Self(0x8000_4005_u32 as i32);
    /// `E_INVALIDARG`.
    pub const INVALID_ARG: Self = Self(0x8007_0057_u32 as i32);
    /// `E_NOINTERFACE`.
    pub const NO_INTERFACE: Self = Self(0x8000_4002_u32 as i32);
    /// `RPC_E_DISCONNECTED`: the object's server (the shell) went away.
    pub const DISCONNECTED: Self = Self(0x8001_0108_u32 as i32);
    /// `RPC_S_SERVER_UNAVAILABLE` as an `HRESULT`.
    pub const SERVER_UNAVAILABLE: Self = Self(0x8007_06BA_u32 as i32);

    pub fn is_element_not_found(&self) -> bool {
        *self == Self::ELEMENT_NOT_FOUND
    }
}

impl fmt::Display for NativeErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0 as u32)
    }
}

/// Direction argument of the adjacent-desktop query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdjacentDirection {
    Left,
    Right,
}

impl AdjacentDirection {
    /// Value the shell expects for this direction.
    pub fn native_value(&self) -> u32 {
        match self {
            Self::Left => 3,
            Self::Right => 4,
        }
    }
}

/// Raw top-level window handle of an application window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowHandle(pub isize);
