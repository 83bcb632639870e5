//! Low-level keyboard hook.
//!
//! WH_KEYBOARD_LL callbacks only fire while the installing thread pumps
//! messages, so the hook lives on a dedicated thread with its own message
//! loop. Key events are forwarded over a channel; the callback itself does
//! nothing else and always passes the event along the hook chain.

use crate::Win32Error;
use std::sync::mpsc;
use std::sync::Mutex;
use tracing::info;
use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PostThreadMessageW, SetWindowsHookExW,
    TranslateMessage, UnhookWindowsHookEx, HC_ACTION, KBDLLHOOKSTRUCT, MSG, WH_KEYBOARD_LL,
    WM_KEYDOWN, WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN, WM_SYSKEYUP,
};

/// A key press or release observed by the global hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Virtual-key code as reported by the hook.
    pub vk: u32,
    /// True for key-down (including auto-repeat), false for key-up.
    pub pressed: bool,
}

/// Destination for hook events. The callback runs on the hook thread, so the
/// sender lives in a global the callback can reach.
static KEY_SENDER: Mutex<Option<mpsc::Sender<KeyEvent>>> = Mutex::new(None);

/// Handle for the installed keyboard hook.
///
/// Dropping the handle posts WM_QUIT to the hook thread, which unhooks and
/// exits, then joins it and disconnects the event channel.
pub struct KeyboardHookHandle {
    thread_id: u32,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl Drop for KeyboardHookHandle {
    fn drop(&mut self) {
        unsafe {
            let _ = PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        // Drop the sender so forwarding threads see the channel close.
        if let Ok(mut guard) = KEY_SENDER.lock() {
            *guard = None;
        }
    }
}

/// Install the low-level keyboard hook on a dedicated message-pump thread.
///
/// Key events are delivered to `sender`. Installation failure is reported
/// synchronously: the hook thread hands back either its thread id or the
/// Win32 error before this function returns.
pub fn install_keyboard_hook(
    sender: mpsc::Sender<KeyEvent>,
) -> Result<KeyboardHookHandle, Win32Error> {
    {
        let mut guard = KEY_SENDER
            .lock()
            .map_err(|_| Win32Error::HookInstallFailed("key sender lock poisoned".to_string()))?;
        *guard = Some(sender);
    }

    let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, String>>();

    let thread = std::thread::Builder::new()
        .name("keyboard-hook".to_string())
        .spawn(move || unsafe {
            let hook = match SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_proc), None, 0) {
                Ok(hook) => hook,
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(GetCurrentThreadId()));

            // Pump until WM_QUIT arrives from the handle's Drop.
            let mut msg = MSG::default();
            while GetMessageW(&mut msg, None, 0, 0).as_bool() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }

            let _ = UnhookWindowsHookEx(hook);
        })
        .map_err(|e| Win32Error::HookInstallFailed(e.to_string()))?;

    let thread_id = ready_rx
        .recv()
        .map_err(|_| {
            Win32Error::HookInstallFailed("hook thread exited before reporting readiness".to_string())
        })?
        .map_err(Win32Error::HookInstallFailed)?;

    info!("Low-level keyboard hook installed");

    Ok(KeyboardHookHandle {
        thread_id,
        thread: Some(thread),
    })
}

/// Hook callback. Forwards key transitions and always calls the next hook;
/// keydrag observes input but never swallows it.
unsafe extern "system" fn keyboard_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    // A panic must not cross the FFI boundary; input has to keep flowing.
    let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        if code == HC_ACTION as i32 {
            let kbd = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
            let event = match wparam.0 as u32 {
                WM_KEYDOWN | WM_SYSKEYDOWN => Some(KeyEvent {
                    vk: kbd.vkCode,
                    pressed: true,
                }),
                WM_KEYUP | WM_SYSKEYUP => Some(KeyEvent {
                    vk: kbd.vkCode,
                    pressed: false,
                }),
                _ => None,
            };

            if let Some(event) = event {
                if let Ok(guard) = KEY_SENDER.lock() {
                    if let Some(sender) = guard.as_ref() {
                        let _ = sender.send(event);
                    }
                }
            }
        }
    }));

    CallNextHookEx(None, code, wparam, lparam)
}
