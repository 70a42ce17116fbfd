//! Terminal setup for the overlay screen.
//!
//! Wraps crossterm's terminal operations in a RAII guard that restores the
//! terminal state on drop, including on early returns and panics unwinding
//! through the command.

use std::io::{self, Write};

use anyhow::{Context, Result};
use crossterm::event::{
    DisableMouseCapture, EnableMouseCapture, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::{cursor, execute, terminal};
use tracing::debug;

/// RAII guard for raw mode, the alternate screen and optional mouse capture.
pub struct OverlayTerminal {
    mouse: bool,
    enhanced_keys: bool,
}

impl OverlayTerminal {
    /// Enter raw mode and the alternate screen.
    ///
    /// Key release events are requested when the terminal supports the
    /// keyboard enhancement protocol; otherwise only presses are reported.
    pub fn enter(mouse: bool) -> Result<Self> {
        terminal::enable_raw_mode().context("failed to enable raw terminal mode")?;
        // From here on, drop restores whatever was set up.
        let mut guard = Self {
            mouse: false,
            enhanced_keys: false,
        };

        let mut out = io::stdout();
        execute!(out, terminal::EnterAlternateScreen, cursor::Hide)
            .context("failed to enter the alternate screen")?;

        if mouse {
            execute!(out, EnableMouseCapture).context("failed to enable mouse capture")?;
            guard.mouse = true;
        }

        if terminal::supports_keyboard_enhancement().unwrap_or(false) {
            execute!(
                out,
                PushKeyboardEnhancementFlags(
                    KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                        | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
                )
            )
            .context("failed to enable keyboard enhancement")?;
            guard.enhanced_keys = true;
        }

        debug!(mouse, enhanced_keys = guard.enhanced_keys, "overlay terminal ready");
        Ok(guard)
    }
}

impl Drop for OverlayTerminal {
    fn drop(&mut self) {
        // Best-effort restore; nothing useful can be done with errors here.
        let mut out = io::stdout();
        if self.enhanced_keys {
            let _ = execute!(out, PopKeyboardEnhancementFlags);
        }
        if self.mouse {
            let _ = execute!(out, DisableMouseCapture);
        }
        let _ = execute!(out, cursor::Show, terminal::LeaveAlternateScreen);
        let _ = out.flush();
        let _ = terminal::disable_raw_mode();
    }
}

/// Get the current terminal size as (columns, rows).
///
/// Falls back to (80, 24) if the size cannot be determined.
pub fn size() -> (u16, u16) {
    terminal::size().unwrap_or((80, 24))
}
