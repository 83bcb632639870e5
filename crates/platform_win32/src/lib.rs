//! keydrag Platform Win32
//!
//! Windows-specific integration using Win32 APIs.
//!
//! This crate handles:
//! - The global low-level keyboard hook (dedicated message-pump thread)
//! - Mapping virtual keys to gesture modifiers
//! - Resolving the window under the cursor to a manipulable top-level target
//! - Forcing the target to the foreground (thread-input attach)
//! - Reading and applying window bounds
//! - The single-instance guard

mod hook;
mod keys;

pub use hook::{install_keyboard_hook, KeyEvent, KeyboardHookHandle};
pub use keys::modifier_from_vk;

use keydrag_core_gesture::{Point, Rect, WindowHandle, WindowSystem};
use std::ffi::c_void;
use thiserror::Error;
use tracing::debug;
use windows::core::w;
use windows::Win32::Foundation::{
    CloseHandle, GetLastError, ERROR_ALREADY_EXISTS, HANDLE, HWND, POINT, RECT,
};
use windows::Win32::System::Threading::{AttachThreadInput, CreateMutexW, GetCurrentThreadId};
use windows::Win32::UI::WindowsAndMessaging::{
    GetAncestor, GetCursorPos, GetForegroundWindow, GetWindowRect, GetWindowThreadProcessId,
    SetForegroundWindow, SetWindowPos, WindowFromPoint, GA_ROOTOWNER, SWP_ASYNCWINDOWPOS,
    SWP_NOACTIVATE, SWP_NOZORDER,
};

/// Errors that can occur during Win32 operations.
#[derive(Debug, Error)]
pub enum Win32Error {
    #[error("Failed to install keyboard hook: {0}")]
    HookInstallFailed(String),

    #[error("Another keydrag instance is already running")]
    AlreadyRunning,

    #[error("Failed to acquire single-instance mutex: {0}")]
    InstanceGuardFailed(String),
}

fn to_hwnd(handle: WindowHandle) -> HWND {
    HWND(handle as usize as *mut c_void)
}

fn from_hwnd(hwnd: HWND) -> WindowHandle {
    hwnd.0 as usize as u64
}

/// Current cursor position in screen coordinates.
pub fn cursor_position() -> Option<Point> {
    let mut point = POINT::default();
    match unsafe { GetCursorPos(&mut point) } {
        Ok(()) => Some(Point::new(point.x, point.y)),
        Err(e) => {
            debug!("GetCursorPos failed: {}", e);
            None
        }
    }
}

/// The window (possibly a child control) at the given screen point.
pub fn window_at(point: Point) -> Option<WindowHandle> {
    let hwnd = unsafe {
        WindowFromPoint(POINT {
            x: point.x,
            y: point.y,
        })
    };
    if hwnd.0.is_null() {
        None
    } else {
        Some(from_hwnd(hwnd))
    }
}

/// Resolve a window to its outermost owner.
///
/// WindowFromPoint often returns a child control; moving a child would tear
/// the UI apart. GA_ROOTOWNER follows parent links for children and owner
/// links for owned top-level windows, so a gesture over a dialog acts on the
/// window that owns it.
pub fn top_level_ancestor(window: WindowHandle) -> WindowHandle {
    let root = unsafe { GetAncestor(to_hwnd(window), GA_ROOTOWNER) };
    if root.0.is_null() {
        // Already a top-level window (or the desktop itself).
        window
    } else {
        from_hwnd(root)
    }
}

/// The current foreground window, if any.
pub fn foreground_window() -> Option<WindowHandle> {
    let hwnd = unsafe { GetForegroundWindow() };
    if hwnd.0.is_null() {
        None
    } else {
        Some(from_hwnd(hwnd))
    }
}

/// Force `target` to the foreground.
///
/// SetForegroundWindow refuses calls from processes that don't own the
/// foreground input queue. Attaching this thread's input queue to both the
/// current foreground thread and the target's thread satisfies that check
/// long enough to make the call, after which the queues are detached again.
/// Refusal is logged and otherwise ignored.
pub fn request_activation(target: WindowHandle) {
    let target_hwnd = to_hwnd(target);

    unsafe {
        let fg = GetForegroundWindow();
        if fg == target_hwnd {
            return;
        }

        let caller_thread = GetCurrentThreadId();
        let fg_thread = if fg.0.is_null() {
            0
        } else {
            GetWindowThreadProcessId(fg, None)
        };
        let target_thread = GetWindowThreadProcessId(target_hwnd, None);

        if fg_thread != 0 && fg_thread != caller_thread {
            let _ = AttachThreadInput(caller_thread, fg_thread, true);
        }
        if target_thread != 0 && target_thread != caller_thread {
            let _ = AttachThreadInput(caller_thread, target_thread, true);
        }

        if !SetForegroundWindow(target_hwnd).as_bool() {
            debug!("SetForegroundWindow refused for window {}", target);
        }

        if target_thread != 0 && target_thread != caller_thread {
            let _ = AttachThreadInput(caller_thread, target_thread, false);
        }
        if fg_thread != 0 && fg_thread != caller_thread {
            let _ = AttachThreadInput(caller_thread, fg_thread, false);
        }
    }
}

/// Resolve the window a gesture starting at `cursor` should manipulate.
///
/// The window under the cursor is walked up to its top-level ancestor and
/// brought to the foreground. The returned handle is whatever window is
/// foreground AFTER that attempt: if the shell refused the activation, the
/// gesture degrades to manipulating the existing foreground window instead
/// of silently fighting the refusal every frame.
pub fn resolve_target(cursor: Point) -> Option<WindowHandle> {
    if let Some(under) = window_at(cursor) {
        let top = top_level_ancestor(under);
        match foreground_window() {
            Some(fg) if fg == top => {}
            _ => request_activation(top),
        }
    }

    foreground_window()
}

/// Current outer bounds of the window.
pub fn window_bounds(window: WindowHandle) -> Option<Rect> {
    let mut rect = RECT::default();
    match unsafe { GetWindowRect(to_hwnd(window), &mut rect) } {
        Ok(()) => Some(Rect::new(
            rect.left,
            rect.top,
            rect.right - rect.left,
            rect.bottom - rect.top,
        )),
        Err(e) => {
            debug!("GetWindowRect failed for window {}: {}", window, e);
            None
        }
    }
}

/// Apply new outer bounds to the window.
///
/// Asynchronous and non-activating: the polling loop runs at 60 Hz and must
/// not block on a hung target or steal focus while dragging.
pub fn set_window_bounds(window: WindowHandle, bounds: Rect) {
    unsafe {
        if let Err(e) = SetWindowPos(
            to_hwnd(window),
            None,
            bounds.x,
            bounds.y,
            bounds.width,
            bounds.height,
            SWP_NOZORDER | SWP_NOACTIVATE | SWP_ASYNCWINDOWPOS,
        ) {
            debug!("SetWindowPos failed for window {}: {}", window, e);
        }
    }
}

/// [`WindowSystem`] implementation backed by the free functions above.
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32WindowSystem;

impl WindowSystem for Win32WindowSystem {
    fn cursor_position(&self) -> Option<Point> {
        cursor_position()
    }

    fn resolve_target(&self, cursor: Point) -> Option<WindowHandle> {
        resolve_target(cursor)
    }

    fn window_bounds(&self, window: WindowHandle) -> Option<Rect> {
        window_bounds(window)
    }

    fn apply_bounds(&self, window: WindowHandle, bounds: Rect) {
        set_window_bounds(window, bounds)
    }
}

/// Holds the named single-instance mutex for the process lifetime.
pub struct InstanceGuard {
    handle: HANDLE,
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.handle);
        }
    }
}

/// Acquire the single-instance mutex.
///
/// Returns [`Win32Error::AlreadyRunning`] when another keydrag process holds
/// it. The guard must be kept alive until exit.
pub fn acquire_instance_guard() -> Result<InstanceGuard, Win32Error> {
    unsafe {
        let handle = CreateMutexW(None, false, w!("Local\\keydrag-daemon"))
            .map_err(|e| Win32Error::InstanceGuardFailed(e.to_string()))?;

        if GetLastError() == ERROR_ALREADY_EXISTS {
            let _ = CloseHandle(handle);
            return Err(Win32Error::AlreadyRunning);
        }

        Ok(InstanceGuard { handle })
    }
}
