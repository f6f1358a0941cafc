//! Win32 `WH_KEYBOARD_LL` backend
//!
//! A low-level keyboard hook procedure receives no user pointer, so the
//! active [`HookContext`] is pinned in a thread-local slot. The OS calls the
//! procedure on the installing thread only, which limits each thread to one
//! interceptor and keeps separate threads from colliding.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, info};
use windows::core::PCWSTR;
use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW,
    SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, HHOOK, KBDLLHOOKSTRUCT, MSG,
    PM_NOREMOVE, WH_KEYBOARD_LL, WM_QUIT,
};

use super::backend::HookBackend;
use super::error::HookError;
use super::interceptor::{HookContext, Propagation};
use super::raw::RawKeyEvent;

thread_local! {
    static ACTIVE_CONTEXT: RefCell<Option<Arc<HookContext>>> = const { RefCell::new(None) };
}

#[derive(Debug, Default)]
pub struct WindowsHookBackend;

/// Registered `HHOOK`
#[derive(Debug)]
pub struct HookHandle(HHOOK);

impl HookBackend for WindowsHookBackend {
    type Handle = HookHandle;

    fn install(&mut self, context: Arc<HookContext>) -> Result<HookHandle, HookError> {
        install_with(context, || unsafe {
            GetModuleHandleW(PCWSTR::null()).and_then(|module| {
                SetWindowsHookExW(
                    WH_KEYBOARD_LL,
                    Some(low_level_keyboard_proc),
                    HINSTANCE(module.0),
                    0,
                )
            })
        })
    }

    fn uninstall(&mut self, handle: &HookHandle) -> Result<(), HookError> {
        unsafe { UnhookWindowsHookEx(handle.0) }
            .map_err(|e| HookError::Unregistration(e.to_string()))?;

        // Only unpin once the OS has let go of the procedure
        ACTIVE_CONTEXT.with(|slot| slot.borrow_mut().take());
        debug!(handle = ?handle.0, "WH_KEYBOARD_LL removed");
        Ok(())
    }
}

/// Pin `context` on this thread, then run `register`. The pin is undone if
/// registration fails.
fn install_with<R>(context: Arc<HookContext>, register: R) -> Result<HookHandle, HookError>
where
    R: FnOnce() -> windows::core::Result<HHOOK>,
{
    let occupied = ACTIVE_CONTEXT.with(|slot| slot.borrow().is_some());
    if occupied {
        return Err(HookError::ThreadOccupied);
    }

    // The OS may call back as soon as the hook exists
    ACTIVE_CONTEXT.with(|slot| *slot.borrow_mut() = Some(context));

    match register() {
        Ok(hook) => {
            info!(handle = ?hook, "WH_KEYBOARD_LL installed");
            Ok(HookHandle(hook))
        }
        Err(e) => {
            ACTIVE_CONTEXT.with(|slot| slot.borrow_mut().take());
            Err(HookError::Registration(e.to_string()))
        }
    }
}

/// Hand one callback to the pinned context.
///
/// `None` means the event must be forwarded untouched: nothing is pinned,
/// or the context panicked.
fn route<F>(code: i32, message: u32, decode: F) -> Option<Propagation>
where
    F: FnOnce() -> RawKeyEvent,
{
    // Clone out so a subscriber may stop capturing without a RefCell conflict
    let context = ACTIVE_CONTEXT
        .try_with(|slot| slot.borrow().clone())
        .ok()
        .flatten()?;

    match panic::catch_unwind(AssertUnwindSafe(|| context.on_hook(code, message, decode))) {
        Ok(decision) => Some(decision),
        Err(_) => {
            error!("keyboard hook callback panicked; forwarding event");
            None
        }
    }
}

unsafe extern "system" fn low_level_keyboard_proc(
    code: i32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    let decision = route(code, wparam.0 as u32, || {
        // SAFETY: for code >= 0 lParam points to a KBDLLHOOKSTRUCT
        // that stays valid for the duration of this call
        let info = unsafe { &*(lparam.0 as *const KBDLLHOOKSTRUCT) };
        RawKeyEvent {
            virtual_key: info.vkCode,
            scan_code: info.scanCode,
            flags: info.flags.0,
            time: info.time,
            extra_info: info.dwExtraInfo,
        }
    });

    match decision {
        Some(Propagation::Swallow) => LRESULT(1),
        _ => CallNextHookEx(HHOOK::default(), code, wparam, lparam),
    }
}

/// Message pump for the hook thread. Low-level hooks only fire while the
/// installing thread is inside `GetMessageW`.
pub struct MessageLoop {
    thread_id: u32,
}

impl MessageLoop {
    pub fn for_current_thread() -> Self {
        let mut msg = MSG::default();
        // Creates the thread's queue so an early quit request is not lost
        unsafe {
            let _ = PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_NOREMOVE);
        }
        Self {
            thread_id: unsafe { GetCurrentThreadId() },
        }
    }

    pub fn quit_handle(&self) -> QuitHandle {
        QuitHandle {
            thread_id: self.thread_id,
        }
    }

    /// Pump until `WM_QUIT`
    pub fn run(&self) -> Result<(), HookError> {
        let mut msg = MSG::default();
        loop {
            let ret = unsafe { GetMessageW(&mut msg, HWND::default(), 0, 0) };
            match ret.0 {
                -1 => {
                    return Err(HookError::MessageLoop(
                        windows::core::Error::from_win32().to_string(),
                    ))
                }
                0 => {
                    debug!("WM_QUIT received");
                    return Ok(());
                }
                _ => unsafe {
                    let _ = TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                },
            }
        }
    }
}

/// Asks a [`MessageLoop`] to return; usable from any thread
#[derive(Debug, Clone)]
pub struct QuitHandle {
    thread_id: u32,
}

impl QuitHandle {
    pub fn quit(&self) -> Result<(), HookError> {
        unsafe { PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) }
            .map_err(|e| HookError::MessageLoop(e.to_string()))
    }
}
