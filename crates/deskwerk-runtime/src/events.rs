// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Public desktop events.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::desktop::Desktop;

/// A change reported by the shell, with every desktop already resolved to
/// its cached wrapper.
#[derive(Debug, Clone)]
pub struct DesktopEvent {
    pub at: DateTime<Utc>,
    pub kind: DesktopEventKind,
}

impl DesktopEvent {
    pub fn new(kind: DesktopEventKind) -> Self {
        Self {
            at: Utc::now(),
            kind,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DesktopEventKind {
    Created(Arc<Desktop>),
    Removed {
        desktop: Arc<Desktop>,
        fallback: Arc<Desktop>,
    },
    Moved {
        desktop: Arc<Desktop>,
        from: i32,
        to: i32,
    },
    CurrentChanged {
        old: Arc<Desktop>,
        new: Arc<Desktop>,
    },
    Renamed {
        desktop: Arc<Desktop>,
        name: String,
    },
    WallpaperChanged {
        desktop: Arc<Desktop>,
        path: String,
    },
    /// The shell restarted and a new binding is live.
    Recovered { generation: u64 },
}

impl fmt::Display for DesktopEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created(d) => write!(f, "created {d}"),
            Self::Removed { desktop, fallback } => {
                write!(f, "removed {desktop}, fell back to {fallback}")
            }
            Self::Moved { desktop, from, to } => write!(f, "moved {desktop} from {from} to {to}"),
            Self::CurrentChanged { old, new } => write!(f, "switched from {old} to {new}"),
            Self::Renamed { desktop, name } => write!(f, "renamed {} to {name:?}", desktop.id()),
            Self::WallpaperChanged { desktop, path } => {
                write!(f, "wallpaper of {desktop} set to {path}")
            }
            Self::Recovered { generation } => write!(f, "rebound after shell restart (generation {generation})"),
        }
    }
}

impl fmt::Display for DesktopEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.at.format("%H:%M:%S%.3f"), self.kind)
    }
}
