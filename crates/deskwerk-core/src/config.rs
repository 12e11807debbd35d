// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Runtime configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DeskwerkError, Result};
use crate::types::{BuildVersion, NativeErrorCode};

/// Settings for a desktop manager context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesktopConfig {
    /// Listen for shell restarts and rebind automatically.
    pub auto_restart: bool,
    /// How long callers wait for a published binding before giving up.
    pub ready_timeout_ms: u64,
    /// Pin the host build instead of querying the OS.
    pub build_override: Option<BuildVersion>,
    /// Codes treated as benign in addition to "element not found".
    pub extra_benign_codes: Vec<NativeErrorCode>,
    /// Capacity of the public event channel.
    pub event_capacity: usize,
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            auto_restart: true,
            ready_timeout_ms: 5_000,
            build_override: None,
            extra_benign_codes: Vec::new(),
            event_capacity: 64,
        }
    }
}

impl DesktopConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        info!(path = %path.display(), "desktop config loaded");
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise return the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "no desktop config found, using defaults");
            Ok(Self::default())
        }
    }

    /// Write settings as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.ready_timeout_ms == 0 {
            return Err(DeskwerkError::Config(
                "ready_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(DeskwerkError::Config(
                "event_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deskwerk.json");
        std::fs::write(
            &path,
            r#"{ "auto_restart": false, "build_override": { "major": 10, "minor": 0, "build": 22000, "revision": 0 } }"#,
        )
        .unwrap();

        let config = DesktopConfig::load(&path).unwrap();
        assert!(!config.auto_restart);
        assert_eq!(config.build_override, Some(BuildVersion::new(10, 0, 22000, 0)));
        assert_eq!(config.ready_timeout_ms, 5_000);
        assert_eq!(config.event_capacity, 64);
    }

    #[test]
    fn save_then_load_preserves_benign_codes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deskwerk.json");
        let config = DesktopConfig {
            extra_benign_codes: vec![NativeErrorCode::DISCONNECTED],
            ..Default::default()
        };
        config.save(&path).unwrap();

        assert_eq!(DesktopConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deskwerk.json");
        std::fs::write(&path, r#"{ "ready_timeout_ms": 0 }"#).unwrap();

        assert!(matches!(
            DesktopConfig::load(&path),
            Err(DeskwerkError::Config(_))
        ));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = DesktopConfig::load_or_default(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, DesktopConfig::default());
    }
}
