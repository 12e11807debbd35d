// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shell restart detection.
//
// Explorer broadcasts the registered "TaskbarCreated" message to every
// top-level window when it comes back up. A hidden window on a dedicated
// thread receives it and fires the restart callback.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;

use deskwerk_core::error::{DeskwerkError, Result};
use tracing::{debug, info, warn};
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetMessageW, HMENU, MSG,
    PostMessageW, PostQuitMessage, RegisterClassW, RegisterWindowMessageW, TranslateMessage,
    WINDOW_EX_STYLE, WM_CLOSE, WM_DESTROY, WNDCLASSW, WS_OVERLAPPED,
};
use windows::core::w;

use crate::traits::{RestartCallback, RestartListener};

static TASKBAR_CREATED: AtomicU32 = AtomicU32::new(0);

thread_local! {
    static CALLBACK: RefCell<Option<RestartCallback>> = const { RefCell::new(None) };
}

pub(crate) struct TaskbarListener {
    window: isize,
    thread: Option<JoinHandle<()>>,
}

impl RestartListener for TaskbarListener {}

impl TaskbarListener {
    pub(crate) fn spawn(on_restart: RestartCallback) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let thread = std::thread::Builder::new()
            .name("deskwerk-restart".into())
            .spawn(move || run(on_restart, tx))?;

        match rx.recv() {
            Ok(Ok(window)) => {
                debug!(window, "restart listener window created");
                Ok(Self {
                    window,
                    thread: Some(thread),
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(DeskwerkError::Binding(
                "restart listener thread exited early".into(),
            )),
        }
    }
}

impl Drop for TaskbarListener {
    fn drop(&mut self) {
        let hwnd = HWND(self.window as *mut _);
        // SAFETY: posting to our own window; it may already be gone.
        if unsafe { PostMessageW(hwnd, WM_CLOSE, WPARAM(0), LPARAM(0)) }.is_err() {
            warn!("restart listener window already closed");
        }
        if let Some(thread) = self.thread.take() {
            // Dropped from inside the restart callback: the loop exits on its own.
            if thread.thread().id() != std::thread::current().id() {
                let _ = thread.join();
            }
        }
    }
}

fn run(on_restart: RestartCallback, ready: mpsc::Sender<Result<isize>>) {
    CALLBACK.with(|cb| *cb.borrow_mut() = Some(on_restart));

    // SAFETY: window creation and the message loop stay on this thread.
    let window = unsafe { create_window() };
    let window = match window {
        Ok(hwnd) => hwnd,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let _ = ready.send(Ok(window.0 as isize));

    let mut msg = MSG::default();
    // SAFETY: standard message pump for the window created above.
    unsafe {
        while GetMessageW(&mut msg, None, 0, 0).into() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
    debug!("restart listener stopped");
}

unsafe fn create_window() -> Result<HWND> {
    let failed = |e: windows::core::Error| {
        DeskwerkError::Binding(format!("restart listener window: {e}"))
    };
    unsafe {
        TASKBAR_CREATED.store(RegisterWindowMessageW(w!("TaskbarCreated")), Ordering::SeqCst);

        let instance = GetModuleHandleW(None).map_err(failed)?;
        let class = w!("DeskwerkRestartListener");
        let wc = WNDCLASSW {
            lpfnWndProc: Some(wndproc),
            hInstance: instance.into(),
            lpszClassName: class,
            ..Default::default()
        };
        // Zero means the class already exists from an earlier listener.
        RegisterClassW(&wc);

        CreateWindowExW(
            WINDOW_EX_STYLE::default(),
            class,
            w!("deskwerk"),
            WS_OVERLAPPED,
            0,
            0,
            0,
            0,
            HWND::default(),
            HMENU::default(),
            instance,
            None,
        )
        .map_err(failed)
    }
}

unsafe extern "system" fn wndproc(hwnd: HWND, msg: u32, wp: WPARAM, lp: LPARAM) -> LRESULT {
    let taskbar_created = TASKBAR_CREATED.load(Ordering::SeqCst);
    if taskbar_created != 0 && msg == taskbar_created {
        info!("shell restart detected");
        let callback = CALLBACK.with(|cb| cb.borrow().clone());
        if let Some(callback) = callback {
            callback();
        }
        return LRESULT(0);
    }
    match msg {
        WM_CLOSE => {
            // SAFETY: our own window, on its owning thread.
            let _ = unsafe { DestroyWindow(hwnd) };
            LRESULT(0)
        }
        WM_DESTROY => {
            unsafe { PostQuitMessage(0) };
            LRESULT(0)
        }
        _ => unsafe { DefWindowProcW(hwnd, msg, wp, lp) },
    }
}
