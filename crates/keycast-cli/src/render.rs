//! Overlay rendering.
//!
//! [`compose`] lays a snapshot out as positioned text lines without touching
//! the terminal; [`draw`] writes them out with crossterm.

use std::io::{self, Write};

use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};
use crossterm::{cursor, queue};
use keycast_core::{CaptureMode, InputEvent, SessionStatus, Snapshot};

/// Static presenter settings.
#[derive(Debug, Clone)]
pub struct View {
    pub mode: CaptureMode,
    pub start_key: String,
    pub stop_key: String,
    pub quit_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Status,
    Key,
    Latest,
}

/// One positioned line of output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub row: u16,
    pub col: u16,
    pub text: String,
    pub style: Style,
}

/// Modifier boxes joined with `+`, then the key box: `[Ctrl] + [c]`.
pub fn format_event(event: &InputEvent) -> String {
    let main = event
        .key
        .as_deref()
        .or(event.button.as_deref())
        .unwrap_or(event.kind.as_str());
    event
        .modifiers
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(main))
        .map(|part| format!("[{part}]"))
        .collect::<Vec<_>>()
        .join(" + ")
}

pub fn status_line(snapshot: &Snapshot, view: &View) -> String {
    let state = match (snapshot.status, view.mode) {
        (SessionStatus::Idle, CaptureMode::Overlay) => {
            format!("idle · {} start · {} quit", view.start_key, view.quit_key)
        }
        (SessionStatus::Idle, CaptureMode::Recording) => {
            format!("idle · {} quit", view.quit_key)
        }
        (SessionStatus::Starting, _) => "starting".to_string(),
        (SessionStatus::Stopping, _) => "stopping".to_string(),
        (SessionStatus::Active, CaptureMode::Overlay) => {
            format!("live · {} stop · {} quit", view.stop_key, view.quit_key)
        }
        (SessionStatus::Active, CaptureMode::Recording) => format!(
            "recording \"{}\" · {} events · {} stop",
            snapshot.label.as_deref().unwrap_or_default(),
            snapshot.recorded,
            view.stop_key
        ),
    };
    format!("keycast · {state}")
}

fn clip(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len <= width {
        text.to_string()
    } else {
        text.chars().skip(len - width).collect()
    }
}

/// Lay out the status line (top left) and the key stack (bottom right,
/// newest at the bottom). The stack is omitted while the overlay is hidden.
pub fn compose(snapshot: &Snapshot, view: &View, cols: u16, rows: u16) -> Vec<Line> {
    let width = usize::from(cols);
    let mut lines = Vec::new();
    if rows == 0 || cols == 0 {
        return lines;
    }

    let status: String = status_line(snapshot, view).chars().take(width).collect();
    lines.push(Line {
        row: 0,
        col: 0,
        text: status,
        style: Style::Status,
    });

    if !snapshot.visible || rows < 2 {
        return lines;
    }

    let slots = usize::from(rows - 1);
    let shown = snapshot.events.len().min(slots);
    let start = snapshot.events.len() - shown;
    for (i, event) in snapshot.events[start..].iter().enumerate() {
        let text = clip(&format_event(event), width.saturating_sub(1).max(1));
        let text_width = u16::try_from(text.chars().count()).unwrap_or(cols);
        // i == shown - 1 is the newest, drawn on the last row.
        let row = rows - 1 - u16::try_from(shown - 1 - i).unwrap_or(0);
        lines.push(Line {
            row,
            col: cols.saturating_sub(text_width + 1),
            text,
            style: if i + 1 == shown { Style::Latest } else { Style::Key },
        });
    }
    lines
}

/// Clear the screen and write `lines`.
pub fn draw<W: Write>(out: &mut W, lines: &[Line]) -> io::Result<()> {
    queue!(out, Clear(ClearType::All))?;
    for line in lines {
        queue!(out, cursor::MoveTo(line.col, line.row))?;
        match line.style {
            Style::Status => queue!(out, SetForegroundColor(Color::DarkGrey))?,
            Style::Key => {}
            Style::Latest => queue!(
                out,
                SetAttribute(Attribute::Bold),
                SetForegroundColor(Color::Yellow)
            )?,
        }
        queue!(out, Print(&line.text), SetAttribute(Attribute::Reset), ResetColor)?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(mode: CaptureMode) -> View {
        View {
            mode,
            start_key: "F9".into(),
            stop_key: "F10".into(),
            quit_key: "ctrl+q".into(),
        }
    }

    fn snapshot(events: Vec<InputEvent>, visible: bool) -> Snapshot {
        Snapshot {
            status: SessionStatus::Active,
            label: None,
            events,
            visible,
            recorded: 0,
        }
    }

    #[test]
    fn formats_modifier_boxes() {
        let ev = InputEvent::key_press("c", vec!["Ctrl".into(), "Shift".into()], 1);
        assert_eq!(format_event(&ev), "[Ctrl] + [Shift] + [c]");
        assert_eq!(format_event(&InputEvent::key_press("⏎", vec![], 1)), "[⏎]");
        let click = InputEvent::mouse_press("left", None, 1);
        assert_eq!(format_event(&click), "[left]");
    }

    #[test]
    fn status_reflects_mode_and_state() {
        let mut snap = snapshot(vec![], false);
        snap.status = SessionStatus::Idle;
        assert_eq!(
            status_line(&snap, &view(CaptureMode::Overlay)),
            "keycast · idle · F9 start · ctrl+q quit"
        );

        snap.status = SessionStatus::Active;
        snap.label = Some("deploy".into());
        snap.recorded = 12;
        assert_eq!(
            status_line(&snap, &view(CaptureMode::Recording)),
            "keycast · recording \"deploy\" · 12 events · F10 stop"
        );
    }

    #[test]
    fn stack_is_bottom_right_with_newest_last() {
        let events = vec![
            InputEvent::key_press("a", vec![], 1),
            InputEvent::key_press("b", vec!["Ctrl".into()], 2),
        ];
        let lines = compose(&snapshot(events, true), &view(CaptureMode::Overlay), 40, 10);
        assert_eq!(lines.len(), 3);

        assert_eq!(lines[1].text, "[a]");
        assert_eq!(lines[1].row, 8);
        assert_eq!(lines[1].col, 36);
        assert_eq!(lines[1].style, Style::Key);

        assert_eq!(lines[2].text, "[Ctrl] + [b]");
        assert_eq!(lines[2].row, 9);
        assert_eq!(lines[2].col, 27);
        assert_eq!(lines[2].style, Style::Latest);
    }

    #[test]
    fn hidden_overlay_shows_status_only() {
        let events = vec![InputEvent::key_press("a", vec![], 1)];
        let lines = compose(&snapshot(events, false), &view(CaptureMode::Overlay), 40, 10);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].style, Style::Status);
    }

    #[test]
    fn short_terminal_keeps_newest() {
        let events = (1..=10)
            .map(|i| InputEvent::key_press(i.to_string(), vec![], i))
            .collect();
        let lines = compose(&snapshot(events, true), &view(CaptureMode::Overlay), 40, 4);
        let keys: Vec<&str> = lines[1..].iter().map(|l| l.text.as_str()).collect();
        assert_eq!(keys, vec!["[8]", "[9]", "[10]"]);
        assert!(compose(&snapshot(vec![], true), &view(CaptureMode::Overlay), 0, 0).is_empty());
    }

    #[test]
    fn draw_writes_text() {
        let lines = compose(
            &snapshot(vec![InputEvent::key_press("z", vec![], 1)], true),
            &view(CaptureMode::Overlay),
            20,
            5,
        );
        let mut buf = Vec::new();
        draw(&mut buf, &lines).unwrap();
        let out = String::from_utf8_lossy(&buf);
        assert!(out.contains("[z]"));
        assert!(out.contains("keycast"));
    }
}
