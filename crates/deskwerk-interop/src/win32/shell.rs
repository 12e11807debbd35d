// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Immersive shell session: instantiates the undocumented desktop manager
// objects and calls their methods by vtable slot, as the catalog describes.

use std::cell::Cell;
use std::ffi::c_void;
use std::mem;
use std::ptr;

use deskwerk_core::error::{DeskwerkError, Result};
use deskwerk_core::types::NativeErrorCode;
use tracing::{debug, instrument};
use uuid::Uuid;
use windows::Win32::System::Com::{
    CLSCTX_LOCAL_SERVER, COINIT_MULTITHREADED, CoCreateInstance, CoInitializeEx, CoUninitialize,
    IServiceProvider,
};
use windows::Win32::UI::Shell::Common::IObjectArray;
use windows::core::{GUID, HRESULT, HSTRING, IUnknown, Interface};

use super::sink::SinkObject;
use crate::catalog::{Interface as Target, InterfaceVariant, MethodDescriptor, Returns};
use crate::traits::{NativeArg, NativeObject, NativeResult, NativeSession, NativeValue};

const CLSID_IMMERSIVE_SHELL: GUID = GUID::from_u128(0xC2F03A33_21F5_47FA_B4BB_156362A2F239);
const SID_DESKTOP_MANAGER: GUID = GUID::from_u128(0xC5E0CDCA_7B6E_41B2_9FC4_D93975CC467B);
const SID_NOTIFICATION_SERVICE: GUID = GUID::from_u128(0xA501FDEC_4A09_464C_AE4E_1B9C21B84918);

/// `IApplicationViewCollection::GetViewForHwnd`.
const GET_VIEW_FOR_HWND: u16 = 6;

pub(crate) fn guid(id: Uuid) -> GUID {
    GUID::from_u128(id.as_u128())
}

/// A COM pointer owned by this process.
///
/// The shell objects are out-of-process proxies created in the MTA, so they
/// may be called from any thread.
#[derive(Clone)]
pub(crate) struct ComObject(pub(crate) IUnknown);

// SAFETY: see the type docs; only MTA proxies are ever wrapped.
unsafe impl Send for ComObject {}
unsafe impl Sync for ComObject {}

impl ComObject {
    pub(crate) fn raw(&self) -> *mut c_void {
        self.0.as_raw()
    }
}

/// This thread's membership of the multithreaded apartment.
///
/// Entered on first use and left when the thread exits, so repeated
/// connects on one thread (every restart recovery) hold one reference.
struct Apartment {
    entered: bool,
}

thread_local! {
    static APARTMENT: Apartment = Apartment::enter();
    static ENTER_CALLS: Cell<u32> = const { Cell::new(0) };
}

impl Apartment {
    fn enter() -> Self {
        ENTER_CALLS.with(|n| n.set(n.get() + 1));
        // SAFETY: balanced by `CoUninitialize` in `Drop` on the same thread.
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        if hr.is_err() {
            // RPC_E_CHANGED_MODE: the thread is already an STA, which still
            // reaches the shell's proxies.
            debug!(?hr, "COM already initialized in another mode");
        }
        Self {
            entered: hr.is_ok(),
        }
    }
}

impl Drop for Apartment {
    fn drop(&mut self) {
        if self.entered {
            // SAFETY: pairs with the successful `CoInitializeEx` in `enter`.
            unsafe { CoUninitialize() };
        }
    }
}

/// Join the MTA on this thread if it has not joined already.
pub(crate) fn ensure_apartment() {
    APARTMENT.with(|_| {});
}

fn native(object: &NativeObject) -> NativeResult<&ComObject> {
    object
        .downcast_ref::<ComObject>()
        .ok_or(NativeErrorCode::NO_INTERFACE)
}

fn code(hr: HRESULT) -> NativeResult<()> {
    if hr.is_ok() {
        Ok(())
    } else {
        Err(NativeErrorCode(hr.0))
    }
}

/// Call vtable slot `ordinal` of `this` with pointer-sized arguments.
///
/// # Safety
/// `this` must be a live COM pointer whose slot `ordinal` takes exactly
/// `args.len()` pointer-sized arguments and returns an HRESULT.
unsafe fn call_slot(this: *mut c_void, ordinal: u16, args: &[usize]) -> HRESULT {
    type F0 = unsafe extern "system" fn(*mut c_void) -> HRESULT;
    type F1 = unsafe extern "system" fn(*mut c_void, usize) -> HRESULT;
    type F2 = unsafe extern "system" fn(*mut c_void, usize, usize) -> HRESULT;
    type F3 = unsafe extern "system" fn(*mut c_void, usize, usize, usize) -> HRESULT;
    type F4 = unsafe extern "system" fn(*mut c_void, usize, usize, usize, usize) -> HRESULT;

    unsafe {
        let vtable = *(this as *const *const usize);
        let slot = *vtable.add(ordinal as usize);
        match *args {
            [] => mem::transmute::<usize, F0>(slot)(this),
            [a] => mem::transmute::<usize, F1>(slot)(this, a),
            [a, b] => mem::transmute::<usize, F2>(slot)(this, a, b),
            [a, b, c] => mem::transmute::<usize, F3>(slot)(this, a, b, c),
            [a, b, c, d] => mem::transmute::<usize, F4>(slot)(this, a, b, c, d),
            _ => HRESULT(NativeErrorCode::INVALID_ARG.0),
        }
    }
}

/// Arguments lowered to machine words, plus whatever must outlive the call.
#[derive(Default)]
struct Lowered {
    words: Vec<usize>,
    strings: Vec<HSTRING>,
    guids: Vec<Box<GUID>>,
    objects: Vec<IUnknown>,
}

pub(crate) struct ShellSession {
    variant: &'static InterfaceVariant,
    manager: ComObject,
    notifications: ComObject,
    views: ComObject,
}

impl ShellSession {
    #[instrument(skip(variant), fields(variant = variant.name()))]
    pub(crate) fn open(variant: &'static InterfaceVariant) -> Result<Self> {
        let failed = |what: &str, e: windows::core::Error| {
            DeskwerkError::Binding(format!("{what}: {e}"))
        };

        ensure_apartment();
        // SAFETY: plain COM activation; every pointer is owned by the wrapper
        // that receives it.
        unsafe {
            let provider: IServiceProvider =
                CoCreateInstance(&CLSID_IMMERSIVE_SHELL, None, CLSCTX_LOCAL_SERVER)
                    .map_err(|e| failed("immersive shell", e))?;

            let manager = query_service(&provider, SID_DESKTOP_MANAGER, guid(variant.iids.manager))
                .map_err(|e| failed("desktop manager", e))?;
            let notifications = query_service(
                &provider,
                SID_NOTIFICATION_SERVICE,
                guid(variant.iids.notification_service),
            )
            .map_err(|e| failed("notification service", e))?;
            let view_iid = guid(variant.iids.view_collection);
            let views = query_service(&provider, view_iid, view_iid)
                .map_err(|e| failed("view collection", e))?;

            debug!("immersive shell objects acquired");
            Ok(Self {
                variant,
                manager,
                notifications,
                views,
            })
        }
    }

    fn lower(&self, args: &[NativeArg<'_>]) -> NativeResult<Lowered> {
        let mut lowered = Lowered::default();
        for arg in args {
            let word = match arg {
                NativeArg::Monitor => 0,
                NativeArg::Desktop(object) => native(object)?.raw() as usize,
                NativeArg::View(window) => {
                    let view = self.view_for(window.0)?;
                    let raw = view.as_raw() as usize;
                    lowered.objects.push(view);
                    raw
                }
                NativeArg::Guid(id) => {
                    let boxed = Box::new(guid(*id));
                    let raw = &*boxed as *const GUID as usize;
                    lowered.guids.push(boxed);
                    raw
                }
                NativeArg::Text(text) => {
                    let string = HSTRING::from(*text);
                    // SAFETY: an HSTRING is a single handle word.
                    let raw = unsafe { mem::transmute_copy::<HSTRING, usize>(&string) };
                    lowered.strings.push(string);
                    raw
                }
                NativeArg::Index(i) => *i as isize as usize,
                NativeArg::Direction(d) => d.native_value() as usize,
                NativeArg::Sink(sink) => {
                    let object = SinkObject::create(self.variant, sink.clone());
                    let raw = object.as_raw() as usize;
                    lowered.objects.push(object);
                    raw
                }
                NativeArg::Cookie(cookie) => *cookie as usize,
            };
            lowered.words.push(word);
        }
        Ok(lowered)
    }

    fn view_for(&self, window: isize) -> NativeResult<IUnknown> {
        let mut view: *mut c_void = ptr::null_mut();
        // SAFETY: GetViewForHwnd(HWND, IApplicationView**).
        let hr = unsafe {
            call_slot(
                self.views.raw(),
                GET_VIEW_FOR_HWND,
                &[window as usize, &mut view as *mut _ as usize],
            )
        };
        code(hr)?;
        if view.is_null() {
            return Err(NativeErrorCode::ELEMENT_NOT_FOUND);
        }
        // SAFETY: out pointer carries one reference that we now own.
        Ok(unsafe { IUnknown::from_raw(view) })
    }

    fn wrap(raw: *mut c_void) -> NativeResult<NativeObject> {
        if raw.is_null() {
            return Err(NativeErrorCode::ELEMENT_NOT_FOUND);
        }
        // SAFETY: out pointer carries one reference that we now own.
        Ok(NativeObject::new(ComObject(unsafe { IUnknown::from_raw(raw) })))
    }

    fn unpack_array(&self, raw: *mut c_void) -> NativeResult<Vec<NativeObject>> {
        if raw.is_null() {
            return Ok(Vec::new());
        }
        // SAFETY: out pointer carries one reference that we now own.
        let array = unsafe { IObjectArray::from_raw(raw) };
        let iid = guid(self.variant.iids.desktop);
        let count = unsafe { array.GetCount() }.map_err(|e| NativeErrorCode(e.code().0))?;

        let mut objects = Vec::with_capacity(count as usize);
        for index in 0..count {
            let mut item: *mut c_void = ptr::null_mut();
            // SAFETY: IObjectArray::GetAt(UINT, REFIID, void**).
            let hr = unsafe { (array.vtable().GetAt)(array.as_raw(), index, &iid, &mut item) };
            code(hr)?;
            objects.push(Self::wrap(item)?);
        }
        Ok(objects)
    }
}

/// `IServiceProvider::QueryService` with a run-time interface id.
unsafe fn query_service(
    provider: &IServiceProvider,
    service: GUID,
    iid: GUID,
) -> windows::core::Result<ComObject> {
    let mut raw: *mut c_void = ptr::null_mut();
    unsafe {
        (provider.vtable().QueryService)(provider.as_raw(), &service, &iid, &mut raw).ok()?;
        Ok(ComObject(IUnknown::from_raw(raw)))
    }
}

impl NativeSession for ShellSession {
    fn invoke(
        &self,
        method: &MethodDescriptor,
        target: Option<&NativeObject>,
        args: &[NativeArg<'_>],
    ) -> NativeResult<NativeValue> {
        let this = match method.op.interface() {
            Target::Manager => self.manager.raw(),
            Target::NotificationService => self.notifications.raw(),
            Target::Desktop => native(target.ok_or(NativeErrorCode::INVALID_ARG)?)?.raw(),
        };
        let mut lowered = self.lower(args)?;

        macro_rules! call_with_out {
            ($out:expr) => {{
                lowered.words.push($out as usize);
                // SAFETY: the descriptor table gives the slot and its arity;
                // `lowered` keeps every argument alive across the call.
                code(unsafe { call_slot(this, method.ordinal, &lowered.words) })
            }};
        }

        match method.returns {
            Returns::Unit => {
                // SAFETY: as above, no out parameter.
                code(unsafe { call_slot(this, method.ordinal, &lowered.words) })?;
                Ok(NativeValue::Unit)
            }
            Returns::Count => {
                let mut out: u32 = 0;
                call_with_out!(&mut out as *mut u32)?;
                Ok(NativeValue::Count(out))
            }
            Returns::Cookie => {
                let mut out: u32 = 0;
                call_with_out!(&mut out as *mut u32)?;
                Ok(NativeValue::Cookie(out))
            }
            Returns::Bool => {
                let mut out: i32 = 0;
                call_with_out!(&mut out as *mut i32)?;
                Ok(NativeValue::Bool(out != 0))
            }
            Returns::Desktop => {
                let mut out: *mut c_void = ptr::null_mut();
                call_with_out!(&mut out as *mut *mut c_void)?;
                Ok(NativeValue::Object(Self::wrap(out)?))
            }
            Returns::DesktopArray => {
                let mut out: *mut c_void = ptr::null_mut();
                call_with_out!(&mut out as *mut *mut c_void)?;
                Ok(NativeValue::Objects(self.unpack_array(out)?))
            }
            Returns::Guid => {
                let mut out = GUID::zeroed();
                call_with_out!(&mut out as *mut GUID)?;
                Ok(NativeValue::Guid(Uuid::from_u128(out.to_u128())))
            }
            Returns::Text => {
                let mut out = HSTRING::new();
                call_with_out!(&mut out as *mut HSTRING)?;
                Ok(NativeValue::Text(out.to_string_lossy()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apartment_is_entered_once_per_thread() {
        let calls = std::thread::spawn(|| {
            ensure_apartment();
            ensure_apartment();
            ensure_apartment();
            ENTER_CALLS.with(Cell::get)
        })
        .join()
        .unwrap();
        assert_eq!(calls, 1);
    }
}
