// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Hand-built COM object implementing the layout's notification interface.
//
// The interface differs per layout (IID, slot count, parameters per slot), so
// the vtable is assembled at run time from the catalog's notification slots.
// Every slot funnels into one decoder that turns the raw arguments into a
// `NativeEvent` and hands it to the registered sink.

use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::{trace, warn};
use windows::Win32::Foundation::{E_NOINTERFACE, E_POINTER, S_OK};
use windows::core::{GUID, HRESULT, HSTRING, IUnknown, Interface};

use super::shell::{ComObject, guid};
use crate::catalog::{InterfaceVariant, NotificationKind, NotificationSlot, Param};
use crate::traits::{NativeEvent, NativeEventSink, NativeObject};

#[repr(C)]
pub(crate) struct SinkObject {
    vtable: *const *const c_void,
    refs: AtomicU32,
    iid: GUID,
    variant: &'static InterfaceVariant,
    sink: Arc<dyn NativeEventSink>,
    slots: Box<[*const c_void]>,
}

impl SinkObject {
    /// Build a sink and return it as an owned COM pointer.
    pub(crate) fn create(
        variant: &'static InterfaceVariant,
        sink: Arc<dyn NativeEventSink>,
    ) -> IUnknown {
        let count = variant.notification_slot_count() as usize;
        let mut slots = vec![unhandled as *const c_void; count];
        slots[0] = query_interface as *const c_void;
        slots[1] = add_ref as *const c_void;
        slots[2] = release as *const c_void;
        for slot in variant.notifications {
            match thunk(slot.ordinal, slot.params.len()) {
                Some(f) => slots[slot.ordinal as usize] = f,
                None => warn!(ordinal = slot.ordinal, "no thunk for notification slot"),
            }
        }

        let slots = slots.into_boxed_slice();
        let object = Box::new(SinkObject {
            vtable: slots.as_ptr(),
            refs: AtomicU32::new(1),
            iid: guid(variant.iids.notification),
            variant,
            sink,
            slots,
        });
        let raw = Box::into_raw(object) as *mut c_void;
        // SAFETY: `raw` starts with a valid vtable pointer and holds one reference.
        unsafe { IUnknown::from_raw(raw) }
    }

    fn dispatch(&self, ordinal: u16, args: &[usize]) {
        let Some(slot) = self.variant.notifications.iter().find(|s| s.ordinal == ordinal) else {
            return;
        };
        match decode(slot, args) {
            Some(event) => {
                trace!(kind = ?slot.kind, "shell notification");
                self.sink.on_event(event);
            }
            None => warn!(kind = ?slot.kind, "undecodable shell notification"),
        }
    }
}

fn borrowed_desktop(raw: usize) -> Option<NativeObject> {
    let raw = raw as *mut c_void;
    // SAFETY: the shell keeps the argument alive for the call; cloning adds
    // our own reference.
    let object = unsafe { IUnknown::from_raw_borrowed(&raw) }?.clone();
    Some(NativeObject::new(ComObject(object)))
}

fn borrowed_string(raw: usize) -> String {
    // SAFETY: the caller owns the HSTRING; ManuallyDrop leaves it untouched.
    let string = ManuallyDrop::new(unsafe { std::mem::transmute::<usize, HSTRING>(raw) });
    string.to_string_lossy()
}

fn decode(slot: &NotificationSlot, args: &[usize]) -> Option<NativeEvent> {
    let mut desktops = Vec::new();
    let mut ints = Vec::new();
    let mut text = None;
    for (param, raw) in slot.params.iter().zip(args) {
        match param {
            Param::Desktop => desktops.push(borrowed_desktop(*raw)?),
            Param::Index => ints.push(*raw as i32),
            Param::Text => text = Some(borrowed_string(*raw)),
            _ => {}
        }
    }
    let mut desktops = desktops.into_iter();
    let mut next = || desktops.next();

    Some(match slot.kind {
        NotificationKind::Created => NativeEvent::Created { desktop: next()? },
        NotificationKind::DestroyBegin => NativeEvent::DestroyBegin {
            desktop: next()?,
            fallback: next()?,
        },
        NotificationKind::DestroyFailed => NativeEvent::DestroyFailed {
            desktop: next()?,
            fallback: next()?,
        },
        NotificationKind::Destroyed => NativeEvent::Destroyed {
            desktop: next()?,
            fallback: next()?,
        },
        NotificationKind::Moved => NativeEvent::Moved {
            desktop: next()?,
            from: *ints.first()?,
            to: *ints.get(1)?,
        },
        NotificationKind::Renamed => NativeEvent::Renamed {
            desktop: next()?,
            name: text?,
        },
        NotificationKind::WallpaperChanged => NativeEvent::WallpaperChanged {
            desktop: next()?,
            path: text?,
        },
        NotificationKind::CurrentChanged => NativeEvent::CurrentChanged {
            old: next()?,
            new: next()?,
        },
        NotificationKind::ViewChanged => NativeEvent::ViewChanged,
        NotificationKind::PerMonitorChanged => NativeEvent::PerMonitorChanged {
            enabled: *ints.first()? != 0,
        },
        NotificationKind::RemoteConnected => NativeEvent::RemoteConnected { desktop: next()? },
    })
}

// -- IUnknown ---------------------------------------------------------------

unsafe extern "system" fn query_interface(
    this: *mut c_void,
    iid: *const GUID,
    out: *mut *mut c_void,
) -> HRESULT {
    if iid.is_null() || out.is_null() {
        return E_POINTER;
    }
    unsafe {
        let object = &*(this as *const SinkObject);
        if *iid == IUnknown::IID || *iid == object.iid {
            object.refs.fetch_add(1, Ordering::SeqCst);
            *out = this;
            S_OK
        } else {
            *out = std::ptr::null_mut();
            E_NOINTERFACE
        }
    }
}

unsafe extern "system" fn add_ref(this: *mut c_void) -> u32 {
    let object = unsafe { &*(this as *const SinkObject) };
    object.refs.fetch_add(1, Ordering::SeqCst) + 1
}

unsafe extern "system" fn release(this: *mut c_void) -> u32 {
    let remaining = {
        let object = unsafe { &*(this as *const SinkObject) };
        object.refs.fetch_sub(1, Ordering::SeqCst) - 1
    };
    if remaining == 0 {
        // SAFETY: last reference; the object came from Box::into_raw.
        drop(unsafe { Box::from_raw(this as *mut SinkObject) });
    }
    remaining
}

unsafe extern "system" fn unhandled(_this: *mut c_void) -> HRESULT {
    S_OK
}

// -- Notification slots -------------------------------------------------------

fn deliver(this: *mut c_void, ordinal: u16, args: &[usize]) -> HRESULT {
    let object = unsafe { &*(this as *const SinkObject) };
    // A panic must never unwind into the shell.
    if catch_unwind(AssertUnwindSafe(|| object.dispatch(ordinal, args))).is_err() {
        warn!(ordinal, "notification handler panicked");
    }
    S_OK
}

unsafe extern "system" fn slot1<const S: u16>(this: *mut c_void, a: usize) -> HRESULT {
    deliver(this, S, &[a])
}

unsafe extern "system" fn slot2<const S: u16>(this: *mut c_void, a: usize, b: usize) -> HRESULT {
    deliver(this, S, &[a, b])
}

unsafe extern "system" fn slot3<const S: u16>(
    this: *mut c_void,
    a: usize,
    b: usize,
    c: usize,
) -> HRESULT {
    deliver(this, S, &[a, b, c])
}

unsafe extern "system" fn slot4<const S: u16>(
    this: *mut c_void,
    a: usize,
    b: usize,
    c: usize,
    d: usize,
) -> HRESULT {
    deliver(this, S, &[a, b, c, d])
}

fn thunk(ordinal: u16, arity: usize) -> Option<*const c_void> {
    macro_rules! table {
        ($($s:literal)*) => {
            match ordinal {
                $($s => match arity {
                    1 => Some(slot1::<$s> as *const c_void),
                    2 => Some(slot2::<$s> as *const c_void),
                    3 => Some(slot3::<$s> as *const c_void),
                    4 => Some(slot4::<$s> as *const c_void),
                    _ => None,
                },)*
                _ => None,
            }
        };
    }
    table!(3 4 5 6 7 8 9 10 11 12 13 14 15)
}
