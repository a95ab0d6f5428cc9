//! Foreground window query for the Timesheet Agent.
//!
//! This module provides platform-specific implementations for reading the
//! title of the currently focused window. A failed query is never an error
//! for the caller: it simply reports no title.

#[cfg(not(target_os = "windows"))]
pub mod command;

#[cfg(target_os = "windows")]
pub mod windows;

/// Source of the currently focused window title.
pub trait WindowSource {
    /// Title of the foreground window, or `None` when no window is focused,
    /// the title is empty, or the query failed.
    fn current_window(&mut self) -> Option<String>;
}

impl<W: WindowSource + ?Sized> WindowSource for Box<W> {
    fn current_window(&mut self) -> Option<String> {
        (**self).current_window()
    }
}

#[cfg(not(target_os = "windows"))]
pub use command::CommandWindowSource;

#[cfg(target_os = "windows")]
pub use self::windows::Win32WindowSource;

/// Platform-agnostic window source type alias
#[cfg(target_os = "windows")]
pub type ForegroundWindow = Win32WindowSource;

/// Platform-agnostic window source type alias
#[cfg(not(target_os = "windows"))]
pub type ForegroundWindow = CommandWindowSource;

/// Create the window source for the current platform.
pub fn foreground_window() -> ForegroundWindow {
    #[cfg(target_os = "windows")]
    {
        Win32WindowSource::new()
    }

    #[cfg(target_os = "macos")]
    {
        CommandWindowSource::osascript()
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        CommandWindowSource::xdotool()
    }
}

/// Normalize a raw title: empty titles carry no information.
pub(crate) fn non_empty(title: String) -> Option<String> {
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Option<&'static str>);

    impl WindowSource for Fixed {
        fn current_window(&mut self) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    #[test]
    fn test_boxed_source_delegates() {
        let mut source: Box<dyn WindowSource> = Box::new(Fixed(Some("Terminal")));
        assert_eq!(source.current_window().as_deref(), Some("Terminal"));
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(String::new()), None);
        assert_eq!(non_empty(" ".to_string()).as_deref(), Some(" "));
    }
}
