// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Deskwerk.

use std::time::Duration;

use thiserror::Error;

use crate::types::{BuildVersion, NativeErrorCode};

/// Top-level error type for all Deskwerk operations.
#[derive(Debug, Error)]
pub enum DeskwerkError {
    // -- Host support --
    /// The host is older than every known interface layout, or the virtual
    /// desktop facility is not present at all.
    #[error("virtual desktops are not supported on this host (build {})", display_build(.build))]
    Unsupported { build: Option<BuildVersion> },

    /// The shell's desktop manager object could not be instantiated.
    #[error("failed to bind to the shell desktop manager: {0}")]
    Binding(String),

    // -- Calls --
    #[error("operation `{op}` is not available in the {variant} interface layout")]
    UnsupportedOperation {
        op: &'static str,
        variant: &'static str,
    },

    #[error("native call `{op}` failed with {code}")]
    NativeCall {
        op: &'static str,
        code: NativeErrorCode,
    },

    #[error("desktop manager was not ready after {waited:?}")]
    NotReady { waited: Duration },

    // -- Configuration / persistence --
    #[error("invalid build version: {0}")]
    InvalidVersion(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DeskwerkError {
    /// The native error code carried by this error, if any.
    pub fn native_code(&self) -> Option<NativeErrorCode> {
        match self {
            Self::NativeCall { code, .. } => Some(*code),
            _ => None,
        }
    }
}

fn display_build(build: &Option<BuildVersion>) -> String {
    match build {
        Some(v) => v.to_string(),
        None => "unknown".into(),
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DeskwerkError>;
