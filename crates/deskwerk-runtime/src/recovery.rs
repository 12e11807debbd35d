// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Binding lifecycle: first initialization and rebinding after the shell
// process restarts.
//
//   Uninitialized --initialize--> Active
//   Active --shell restart--> Recovering --rebuilt--> Active
//                                        --failed---> Failed
//   Failed --shell restart--> Recovering
//
// Every transition runs under the context's lifecycle lock, so recovery
// cycles never interleave. Callers arriving mid-transition block on the
// binding slot until the new binding is published or the rebuild fails.

use std::fmt;
use std::sync::Arc;

use deskwerk_core::error::{DeskwerkError, Result};
use deskwerk_interop::{Binding, build_binding};
use tracing::{info, instrument, warn};

use crate::context::{Lifecycle, Shared};
use crate::events::DesktopEventKind;
use crate::notifications::{EventRouter, NotificationSubscription};

/// Where a context is in its binding lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    /// Nothing bound yet (or shut down).
    Uninitialized,
    Active,
    /// Tearing down and rebuilding after a shell restart.
    Recovering,
    /// The last rebuild failed; waiting for the next restart signal.
    Failed,
}

impl fmt::Display for RecoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl RecoveryState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Active => "active",
            Self::Recovering => "recovering",
            Self::Failed => "failed",
        }
    }
}

impl Shared {
    /// Build a binding, register for notifications and publish it.
    ///
    /// Nothing becomes visible to callers until every step has succeeded.
    pub(crate) fn establish(&self, lifecycle: &mut Lifecycle) -> Result<Arc<Binding>> {
        let variant = self.resolve_layout()?;
        let generation = self.slot().next_generation();
        let binding = Arc::new(build_binding(self.host(), variant, generation)?);

        match lifecycle.subscription.as_mut() {
            Some(subscription) => subscription.resubscribe(Arc::clone(&binding))?,
            None => {
                let router = Arc::new(EventRouter::new(self.weak()));
                lifecycle.subscription = Some(NotificationSubscription::open(
                    Arc::clone(&binding),
                    router,
                )?);
            }
        }

        self.slot().publish(Arc::clone(&binding));
        Ok(binding)
    }

    /// First bind. Installs the restart listener when configured to.
    #[instrument(skip(self))]
    pub(crate) fn initialize(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle();
        match self.state() {
            RecoveryState::Active | RecoveryState::Recovering => return Ok(()),
            RecoveryState::Uninitialized | RecoveryState::Failed => {}
        }

        // Fail fast on unsupported hosts without touching the shell.
        let variant = self.resolve_layout()?;

        if self.config().auto_restart && lifecycle.listener.is_none() {
            let weak = self.weak();
            let on_restart = Arc::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.recover();
                }
            });
            match self.host().watch_shell_restart(on_restart) {
                Ok(listener) => lifecycle.listener = Some(listener),
                Err(e) => warn!(error = %e, "shell restart listener unavailable"),
            }
        }

        match self.establish(&mut lifecycle) {
            Ok(binding) => {
                self.set_state(RecoveryState::Active, None);
                info!(
                    variant = variant.name(),
                    generation = binding.generation(),
                    "virtual desktops initialized"
                );
                Ok(())
            }
            Err(e) => {
                // With a listener installed, a later shell start retries.
                let reason = failure_reason(&e);
                self.set_state(RecoveryState::Failed, Some(reason.clone()));
                self.slot().fail(reason);
                Err(e)
            }
        }
    }

    /// Rebind after the shell restarted.
    #[instrument(skip(self))]
    pub(crate) fn recover(&self) {
        let mut lifecycle = self.lifecycle();
        if self.state() == RecoveryState::Uninitialized {
            info!("shell restart before initialization; nothing to recover");
            return;
        }

        self.set_state(RecoveryState::Recovering, None);
        self.slot().invalidate();
        let dropped = self.cache().clear();
        if let Some(subscription) = lifecycle.subscription.as_mut() {
            subscription.close();
        }
        info!(dropped, "recovering from shell restart");

        match self.establish(&mut lifecycle) {
            Ok(binding) => {
                self.set_state(RecoveryState::Active, None);
                info!(generation = binding.generation(), "rebound after shell restart");
                self.broadcast(DesktopEventKind::Recovered {
                    generation: binding.generation(),
                });
            }
            Err(e) => {
                warn!(error = %e, "rebinding failed; waiting for the next shell restart");
                let reason = failure_reason(&e);
                self.set_state(RecoveryState::Failed, Some(reason.clone()));
                self.slot().fail(reason);
            }
        }
    }

    /// Unregister, stop listening and drop every cached wrapper.
    #[instrument(skip(self))]
    pub(crate) fn shutdown(&self) {
        let listener = {
            let mut lifecycle = self.lifecycle();
            if let Some(mut subscription) = lifecycle.subscription.take() {
                subscription.close();
            }
            self.slot().invalidate();
            self.cache().clear();
            self.set_state(RecoveryState::Uninitialized, None);
            lifecycle.listener.take()
        };
        // Stopping the listener may wait for its thread, which could itself be
        // waiting for the lifecycle lock inside `recover`.
        drop(listener);
        info!("virtual desktops shut down");
    }

    /// Error callers see while the context is `Failed`.
    pub(crate) fn failed_error(&self) -> DeskwerkError {
        DeskwerkError::Binding(
            self.failure()
                .unwrap_or_else(|| "desktop manager binding failed".into()),
        )
    }
}

/// Text stored for a failed build; binding errors keep their bare message.
fn failure_reason(error: &DeskwerkError) -> String {
    match error {
        DeskwerkError::Binding(message) => message.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_display_in_lowercase() {
        assert_eq!(RecoveryState::Recovering.to_string(), "recovering");
        assert_eq!(RecoveryState::Failed.to_string(), "failed");
    }

    #[test]
    fn failure_reason_is_not_prefixed_twice() {
        let reason = failure_reason(&DeskwerkError::Binding("no shell".into()));
        assert_eq!(reason, "no shell");
        let rewrapped = DeskwerkError::Binding(reason).to_string();
        assert_eq!(rewrapped.matches("no shell").count(), 1);
        assert_eq!(rewrapped, DeskwerkError::Binding("no shell".into()).to_string());
    }
}
