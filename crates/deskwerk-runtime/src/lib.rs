// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Deskwerk runtime: the `VirtualDesktops` context with its identity cache,
// safe invocation, notification redispatch and shell-restart recovery, on top
// of the versioned bindings in `deskwerk-interop`.

pub mod cache;
pub mod context;
pub mod desktop;
pub mod events;
pub mod invoke;
pub mod notifications;
pub mod recovery;
pub mod slot;

pub use context::VirtualDesktops;
pub use desktop::Desktop;
pub use events::{DesktopEvent, DesktopEventKind};
pub use invoke::BenignCodes;
pub use recovery::RecoveryState;
