//! Window title lookup by shelling out to a helper program.
//!
//! macOS asks System Events through `osascript`; X11 desktops use
//! `xdotool`. Both print the title on stdout and exit non-zero when
//! nothing is focused.

use crate::window::{non_empty, WindowSource};
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

/// How long a helper may run before it is killed.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(2);

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

const OSASCRIPT_FRONT_WINDOW: &str = r#"tell application "System Events"
    set frontApp to first application process whose frontmost is true
    tell frontApp
        if (count of windows) > 0 then
            return name of front window
        end if
    end tell
    return name of frontApp
end tell"#;

/// A window source backed by an external command.
#[derive(Debug, Clone)]
pub struct CommandWindowSource {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandWindowSource {
    /// Create a source that runs `program` with `args` on every query.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Kill the helper if it has not exited after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// macOS: front window name of the frontmost application.
    pub fn osascript() -> Self {
        Self::new("osascript", ["-e", OSASCRIPT_FRONT_WINDOW])
    }

    /// X11: name of the active window.
    pub fn xdotool() -> Self {
        Self::new("xdotool", ["getactivewindow", "getwindowname"])
    }

    /// The program this source runs.
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl WindowSource for CommandWindowSource {
    fn current_window(&mut self) -> Option<String> {
        let mut child = match Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!(program = %self.program, "window query failed: {e}");
                return None;
            }
        };

        match wait_timeout(&mut child, self.timeout) {
            Ok(Some(status)) if status.success() => {}
            Ok(Some(_)) => return None,
            Ok(None) => {
                tracing::warn!(
                    program = %self.program,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "window query timed out"
                );
                kill(&mut child);
                return None;
            }
            Err(e) => {
                tracing::debug!(program = %self.program, "window query failed: {e}");
                kill(&mut child);
                return None;
            }
        }

        // Titles are far smaller than a pipe buffer, so the helper never
        // blocks on a full stdout before exiting.
        let mut raw = Vec::new();
        if let Err(e) = child.stdout.take()?.read_to_end(&mut raw) {
            tracing::debug!(program = %self.program, "failed to read window title: {e}");
            return None;
        }

        let title = String::from_utf8_lossy(&raw);
        non_empty(title.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Poll for exit until `timeout` elapses. `Ok(None)` means still running.
fn wait_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= timeout {
            return Ok(None);
        }
        std::thread::sleep(EXIT_POLL_INTERVAL);
    }
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        tracing::debug!("failed to kill window query: {e}");
    }
    // Reap it so no zombie is left behind.
    let _ = child.wait();
}
