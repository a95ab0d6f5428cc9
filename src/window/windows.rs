//! Windows implementation of the foreground window query.
//!
//! Uses `GetForegroundWindow` and `GetWindowTextW`. No hooks or background
//! threads are installed; every query is a point-in-time read.

use crate::window::{non_empty, WindowSource};
use windows::Win32::Foundation::HWND;
use windows::Win32::UI::WindowsAndMessaging::{
    GetForegroundWindow, GetWindowTextLengthW, GetWindowTextW,
};

/// Foreground window source backed by the Win32 API.
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32WindowSource;

impl Win32WindowSource {
    pub fn new() -> Self {
        Self
    }
}

impl WindowSource for Win32WindowSource {
    fn current_window(&mut self) -> Option<String> {
        // SAFETY: both calls only read window state; the buffer outlives the call.
        unsafe {
            let hwnd = GetForegroundWindow();
            if hwnd == HWND::default() {
                return None;
            }

            let len = GetWindowTextLengthW(hwnd);
            if len <= 0 {
                return None;
            }

            let mut buffer = vec![0u16; len as usize + 1];
            let copied = GetWindowTextW(hwnd, &mut buffer);
            if copied <= 0 {
                return None;
            }

            non_empty(String::from_utf16_lossy(&buffer[..copied as usize]))
        }
    }
}
