// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The single publication point for the current binding.
//
// A binding is built completely before it is published here, and readers
// either get a published binding or wait (bounded) for the next one. A
// failed build wakes waiters with its reason. The slot never hands out a
// binding that is still under construction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use deskwerk_core::error::{DeskwerkError, Result};
use deskwerk_interop::Binding;
use tracing::debug;

#[derive(Default)]
struct SlotState {
    binding: Option<Arc<Binding>>,
    /// Why the last build failed, until the next build starts.
    failure: Option<String>,
}

#[derive(Default)]
pub struct BindingSlot {
    state: Mutex<SlotState>,
    ready: Condvar,
    generation: AtomicU64,
}

impl BindingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Reserve the generation number for the next binding.
    pub fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Publish a fully built binding and wake every waiter.
    pub fn publish(&self, binding: Arc<Binding>) {
        let mut state = self.lock();
        debug!(generation = binding.generation(), "binding published");
        state.binding = Some(binding);
        state.failure = None;
        self.ready.notify_all();
    }

    /// Record that the pending build failed and wake every waiter with the
    /// reason.
    pub fn fail(&self, reason: impl Into<String>) {
        let mut state = self.lock();
        let reason = reason.into();
        debug!(%reason, "binding build failed");
        state.binding = None;
        state.failure = Some(reason);
        self.ready.notify_all();
    }

    /// Withdraw the current binding; readers block until the next publish
    /// or failure.
    pub fn invalidate(&self) -> Option<Arc<Binding>> {
        let mut state = self.lock();
        state.failure = None;
        state.binding.take()
    }

    /// The published binding, without waiting.
    pub fn current(&self) -> Option<Arc<Binding>> {
        self.lock().binding.clone()
    }

    /// The published binding, waiting up to `timeout` for one to appear.
    ///
    /// Returns the recorded reason as soon as the pending build fails.
    pub fn wait(&self, timeout: Duration) -> Result<Arc<Binding>> {
        let started = Instant::now();
        let guard = self.lock();
        let (state, _) = self
            .ready
            .wait_timeout_while(guard, timeout, |s| {
                s.binding.is_none() && s.failure.is_none()
            })
            .unwrap_or_else(|p| p.into_inner());
        if let Some(binding) = &state.binding {
            return Ok(Arc::clone(binding));
        }
        match &state.failure {
            Some(reason) => Err(DeskwerkError::Binding(reason.clone())),
            None => Err(DeskwerkError::NotReady {
                waited: started.elapsed(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskwerk_core::types::BuildVersion;
    use deskwerk_interop::build_binding;
    use deskwerk_interop::catalog::BUILD_22621;
    use deskwerk_interop::fake::FakeHost;

    fn binding(generation: u64) -> Arc<Binding> {
        let host = FakeHost::new(BuildVersion::new(10, 0, 22621, 2215));
        Arc::new(build_binding(&host, &BUILD_22621, generation).unwrap())
    }

    #[test]
    fn empty_slot_times_out() {
        let slot = BindingSlot::new();
        let err = slot.wait(Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, DeskwerkError::NotReady { .. }));
    }

    #[test]
    fn waiters_wake_on_publish() {
        let slot = Arc::new(BindingSlot::new());
        let waiter = {
            let slot = Arc::clone(&slot);
            std::thread::spawn(move || slot.wait(Duration::from_secs(5)).map(|b| b.generation()))
        };
        std::thread::sleep(Duration::from_millis(20));
        slot.publish(binding(7));
        assert_eq!(waiter.join().unwrap().unwrap(), 7);
    }

    #[test]
    fn failure_wakes_waiters_with_reason() {
        let slot = Arc::new(BindingSlot::new());
        let waiter = {
            let slot = Arc::clone(&slot);
            std::thread::spawn(move || {
                let started = Instant::now();
                (slot.wait(Duration::from_secs(10)), started.elapsed())
            })
        };
        std::thread::sleep(Duration::from_millis(20));
        slot.fail("shell refused the connection");

        let (result, waited) = waiter.join().unwrap();
        match result {
            Err(DeskwerkError::Binding(reason)) => {
                assert_eq!(reason, "shell refused the connection")
            }
            other => panic!("expected a binding error, got {:?}", other.map(|b| b.generation())),
        }
        assert!(waited < Duration::from_secs(5));
    }

    #[test]
    fn next_build_clears_failure() {
        let slot = BindingSlot::new();
        slot.fail("gone");
        assert!(matches!(
            slot.wait(Duration::from_millis(5)),
            Err(DeskwerkError::Binding(_))
        ));
        slot.invalidate();
        assert!(matches!(
            slot.wait(Duration::from_millis(5)),
            Err(DeskwerkError::NotReady { .. })
        ));
        slot.fail("gone again");
        slot.publish(binding(3));
        assert_eq!(slot.wait(Duration::from_millis(5)).unwrap().generation(), 3);
    }

    #[test]
    fn invalidate_withdraws_binding() {
        let slot = BindingSlot::new();
        slot.publish(binding(1));
        assert!(slot.current().is_some());
        assert_eq!(slot.invalidate().map(|b| b.generation()), Some(1));
        assert!(slot.current().is_none());
    }

    #[test]
    fn generations_increase() {
        let slot = BindingSlot::new();
        let a = slot.next_generation();
        let b = slot.next_generation();
        assert!(b > a);
    }
}
