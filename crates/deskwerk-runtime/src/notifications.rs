// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Notification registration and redispatch.
//
// `EventRouter` is the sink the shell calls. It resolves every desktop in a
// notification through the identity cache, applies the change to the cached
// wrapper, then broadcasts the public event. A destroyed desktop is looked up
// but never re-cached, and is evicted once its event is out. `NotificationSubscription` owns
// the registration cookie and is torn down and recreated by restart recovery.

use std::sync::{Arc, Weak};

use deskwerk_core::error::Result;
use deskwerk_interop::traits::{NativeEvent, NativeEventSink, NativeObject};
use deskwerk_interop::Binding;
use tracing::{debug, info, warn};

use crate::context::Shared;
use crate::desktop::Desktop;
use crate::events::DesktopEventKind;

/// Sink registered with the shell on behalf of one context.
pub(crate) struct EventRouter {
    shared: Weak<Shared>,
}

impl EventRouter {
    pub(crate) fn new(shared: Weak<Shared>) -> Self {
        Self { shared }
    }

    fn translate(
        shared: &Shared,
        binding: &Binding,
        event: NativeEvent,
    ) -> Result<Option<DesktopEventKind>> {
        let resolve = |object: NativeObject| -> Result<Arc<Desktop>> {
            let handle = binding.handle(object)?;
            shared.resolve(binding, handle)
        };

        let kind = match event {
            NativeEvent::Created { desktop } => DesktopEventKind::Created(resolve(desktop)?),
            NativeEvent::Destroyed { desktop, fallback } => DesktopEventKind::Removed {
                desktop: shared.resolve_departed(binding, binding.handle(desktop)?)?,
                fallback: resolve(fallback)?,
            },
            NativeEvent::Moved { desktop, from, to } => {
                let desktop = resolve(desktop)?;
                shared.cache().apply_move(desktop.id(), from, to);
                DesktopEventKind::Moved { desktop, from, to }
            }
            NativeEvent::CurrentChanged { old, new } => DesktopEventKind::CurrentChanged {
                old: resolve(old)?,
                new: resolve(new)?,
            },
            NativeEvent::Renamed { desktop, name } => {
                let desktop = resolve(desktop)?;
                desktop.set_name(&name);
                DesktopEventKind::Renamed { desktop, name }
            }
            NativeEvent::WallpaperChanged { desktop, path } => {
                let desktop = resolve(desktop)?;
                desktop.set_wallpaper_path(&path);
                DesktopEventKind::WallpaperChanged { desktop, path }
            }
            other => {
                debug!(event = ?other, "notification not redispatched");
                return Ok(None);
            }
        };
        Ok(Some(kind))
    }
}

impl NativeEventSink for EventRouter {
    fn on_event(&self, event: NativeEvent) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let Some(binding) = shared.published() else {
            debug!("notification arrived while no binding is published");
            return;
        };

        match Self::translate(&shared, &binding, event) {
            Ok(Some(kind)) => {
                let removed = match &kind {
                    DesktopEventKind::Removed { desktop, .. } => Some(desktop.id()),
                    _ => None,
                };
                shared.broadcast(kind);
                if let Some(id) = removed {
                    shared.cache().evict(id);
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "notification could not be resolved"),
        }
    }
}

struct Registration {
    binding: Arc<Binding>,
    cookie: u32,
}

/// The live registration of a sink with the shell.
pub struct NotificationSubscription {
    sink: Arc<dyn NativeEventSink>,
    registration: Option<Registration>,
}

impl NotificationSubscription {
    /// Register `sink` through `binding`.
    pub fn open(binding: Arc<Binding>, sink: Arc<dyn NativeEventSink>) -> Result<Self> {
        let mut subscription = Self {
            sink,
            registration: None,
        };
        subscription.resubscribe(binding)?;
        Ok(subscription)
    }

    pub fn is_active(&self) -> bool {
        self.registration.is_some()
    }

    /// Generation of the binding the sink is registered with.
    pub fn generation(&self) -> Option<u64> {
        self.registration.as_ref().map(|r| r.binding.generation())
    }

    /// Unregister. Idempotent; a registration that died with the shell is
    /// simply forgotten.
    pub fn close(&mut self) {
        let Some(registration) = self.registration.take() else {
            return;
        };
        match registration.binding.unregister(registration.cookie) {
            Ok(()) => debug!(cookie = registration.cookie, "notifications unregistered"),
            Err(e) => debug!(
                cookie = registration.cookie,
                error = %e,
                "unregister failed; registration already gone"
            ),
        }
    }

    /// Close the current registration (if any) and register again through
    /// `binding`.
    pub fn resubscribe(&mut self, binding: Arc<Binding>) -> Result<()> {
        self.close();
        let cookie = binding.register(Arc::clone(&self.sink))?;
        info!(cookie, generation = binding.generation(), "notifications registered");
        self.registration = Some(Registration { binding, cookie });
        Ok(())
    }
}

impl Drop for NotificationSubscription {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use deskwerk_core::types::BuildVersion;
    use deskwerk_interop::build_binding;
    use deskwerk_interop::catalog::BUILD_22621;
    use deskwerk_interop::fake::FakeHost;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl NativeEventSink for Recorder {
        fn on_event(&self, event: NativeEvent) {
            let label = match event {
                NativeEvent::Created { .. } => "created",
                NativeEvent::Renamed { .. } => "renamed",
                _ => "other",
            };
            self.0.lock().unwrap().push(label.to_string());
        }
    }

    fn host() -> FakeHost {
        FakeHost::new(BuildVersion::new(10, 0, 22621, 2215))
    }

    #[test]
    fn close_is_idempotent() {
        let host = host();
        let binding = Arc::new(build_binding(&host, &BUILD_22621, 1).unwrap());
        let mut sub = NotificationSubscription::open(binding, Arc::new(Recorder::default())).unwrap();
        assert_eq!(host.registrations(), 1);

        sub.close();
        sub.close();
        assert!(!sub.is_active());
        assert_eq!(host.registrations(), 0);
    }

    #[test]
    fn resubscribe_moves_registration_to_new_binding() {
        let host = host();
        let recorder = Arc::new(Recorder::default());
        let first = Arc::new(build_binding(&host, &BUILD_22621, 1).unwrap());
        let mut sub = NotificationSubscription::open(first, recorder.clone()).unwrap();

        host.restart_shell();
        assert_eq!(host.registrations(), 0);

        let second = Arc::new(build_binding(&host, &BUILD_22621, 2).unwrap());
        sub.resubscribe(Arc::clone(&second)).unwrap();
        assert_eq!(sub.generation(), Some(2));
        assert_eq!(host.registrations(), 1);

        second.create_desktop().unwrap();
        assert_eq!(recorder.0.lock().unwrap().as_slice(), ["created"]);
    }

    #[test]
    fn dropping_the_subscription_unregisters() {
        let host = host();
        let binding = Arc::new(build_binding(&host, &BUILD_22621, 1).unwrap());
        let sub = NotificationSubscription::open(binding, Arc::new(Recorder::default())).unwrap();
        drop(sub);
        assert_eq!(host.registrations(), 0);
    }
}
