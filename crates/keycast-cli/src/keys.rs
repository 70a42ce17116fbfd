//! Key glyphs, modifier labels and hotkey parsing.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers, ModifierKeyCode};

/// Display label for a key, or `None` for keys the overlay does not show.
pub fn key_label(code: &KeyCode) -> Option<String> {
    let label = match code {
        KeyCode::Backspace => "⌫",
        KeyCode::CapsLock => "⇬",
        KeyCode::Delete => "⌦",
        KeyCode::Down => "↓",
        KeyCode::End => "End",
        KeyCode::Esc => "esc",
        KeyCode::Home => "Home",
        KeyCode::Left => "←",
        KeyCode::PageDown => "PgDn",
        KeyCode::PageUp => "PgUp",
        KeyCode::Enter => "⏎",
        KeyCode::Right => "→",
        KeyCode::Tab | KeyCode::BackTab => "↹",
        KeyCode::Up => "↑",
        KeyCode::PrintScreen => "PrtSc",
        KeyCode::Insert => "ins",
        KeyCode::ScrollLock => "ScrLk",
        KeyCode::NumLock => "NumLk",
        KeyCode::Pause => "Pause",
        KeyCode::Menu => "Menu",
        KeyCode::Char(' ') => "␣",
        KeyCode::Char(c) => return Some(c.to_string()),
        KeyCode::F(n) => return Some(format!("F{n}")),
        KeyCode::Modifier(m) => modifier_key_label(m),
        KeyCode::Null | KeyCode::KeypadBegin | KeyCode::Media(_) => return None,
    };
    Some(label.to_string())
}

fn modifier_key_label(code: &ModifierKeyCode) -> &'static str {
    match code {
        ModifierKeyCode::LeftShift | ModifierKeyCode::RightShift => "⇧",
        ModifierKeyCode::LeftControl | ModifierKeyCode::RightControl => "Ctrl",
        ModifierKeyCode::LeftAlt | ModifierKeyCode::RightAlt => "Alt",
        ModifierKeyCode::LeftSuper
        | ModifierKeyCode::RightSuper
        | ModifierKeyCode::LeftMeta
        | ModifierKeyCode::RightMeta => "⌘",
        ModifierKeyCode::LeftHyper | ModifierKeyCode::RightHyper => "Hyper",
        ModifierKeyCode::IsoLevel3Shift => "AltGr",
        ModifierKeyCode::IsoLevel5Shift => "Lvl5",
    }
}

/// Held modifiers in display order: Ctrl, Alt, Shift, Meta.
pub fn modifier_labels(modifiers: KeyModifiers) -> Vec<String> {
    let mut labels = Vec::new();
    if modifiers.contains(KeyModifiers::CONTROL) {
        labels.push("Ctrl".to_string());
    }
    if modifiers.contains(KeyModifiers::ALT) {
        labels.push("Alt".to_string());
    }
    if modifiers.contains(KeyModifiers::SHIFT) {
        labels.push("Shift".to_string());
    }
    if modifiers.intersects(KeyModifiers::SUPER | KeyModifiers::META) {
        labels.push("Meta".to_string());
    }
    labels
}

/// Ctrl+C, which always quits regardless of configured hotkeys.
pub fn is_interrupt(event: &KeyEvent) -> bool {
    event.kind != KeyEventKind::Release
        && event.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(event.code, KeyCode::Char('c') | KeyCode::Char('C'))
}

/// A key chord such as `F9` or `ctrl+q`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hotkey {
    code: KeyCode,
    modifiers: KeyModifiers,
}

impl Hotkey {
    /// Whether a key press (or repeat) triggers this hotkey.
    pub fn matches(&self, event: &KeyEvent) -> bool {
        if event.kind == KeyEventKind::Release {
            return false;
        }
        let code_matches = match (self.code, event.code) {
            (KeyCode::Char(want), KeyCode::Char(got)) => want == got.to_ascii_lowercase(),
            (KeyCode::BackTab, KeyCode::BackTab) => true,
            (want, got) => want == got,
        };

        let mut held = event.modifiers
            & (KeyModifiers::CONTROL
                | KeyModifiers::ALT
                | KeyModifiers::SHIFT
                | KeyModifiers::SUPER
                | KeyModifiers::META);
        if held.contains(KeyModifiers::META) {
            held.remove(KeyModifiers::META);
            held.insert(KeyModifiers::SUPER);
        }
        // Shifted letters arrive as uppercase chars; only honour Shift when asked for.
        if matches!(self.code, KeyCode::Char(_)) && !self.modifiers.contains(KeyModifiers::SHIFT) {
            held.remove(KeyModifiers::SHIFT);
        }
        code_matches && held == self.modifiers
    }
}

impl FromStr for Hotkey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<String> = s.split('+').map(|p| p.trim().to_ascii_lowercase()).collect();
        let Some((key, modifier_names)) = parts.split_last() else {
            bail!("empty hotkey");
        };
        if key.is_empty() {
            bail!("hotkey '{s}' has no key");
        }

        let mut modifiers = KeyModifiers::NONE;
        for name in modifier_names {
            modifiers |= match name.as_str() {
                "ctrl" | "control" => KeyModifiers::CONTROL,
                "alt" | "option" => KeyModifiers::ALT,
                "shift" => KeyModifiers::SHIFT,
                "meta" | "super" | "cmd" => KeyModifiers::SUPER,
                other => bail!("unknown modifier '{other}' in hotkey '{s}'"),
            };
        }

        let code = match key.as_str() {
            "esc" | "escape" => KeyCode::Esc,
            "enter" | "return" => KeyCode::Enter,
            "space" => KeyCode::Char(' '),
            "tab" => KeyCode::Tab,
            "backspace" => KeyCode::Backspace,
            "delete" | "del" => KeyCode::Delete,
            "insert" | "ins" => KeyCode::Insert,
            "home" => KeyCode::Home,
            "end" => KeyCode::End,
            "pageup" | "pgup" => KeyCode::PageUp,
            "pagedown" | "pgdn" => KeyCode::PageDown,
            "up" => KeyCode::Up,
            "down" => KeyCode::Down,
            "left" => KeyCode::Left,
            "right" => KeyCode::Right,
            f if f.len() > 1 && f.starts_with('f') => match f[1..].parse::<u8>() {
                Ok(n) if (1..=24).contains(&n) => KeyCode::F(n),
                _ => bail!("unknown key '{key}' in hotkey '{s}'"),
            },
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => KeyCode::Char(c),
                    _ => bail!("unknown key '{other}' in hotkey '{s}'"),
                }
            }
        };
        Ok(Self { code, modifiers })
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, name) in [
            (KeyModifiers::CONTROL, "ctrl"),
            (KeyModifiers::ALT, "alt"),
            (KeyModifiers::SHIFT, "shift"),
            (KeyModifiers::SUPER, "meta"),
        ] {
            if self.modifiers.contains(flag) {
                write!(f, "{name}+")?;
            }
        }
        match self.code {
            KeyCode::F(n) => write!(f, "F{n}"),
            KeyCode::Char(' ') => f.write_str("space"),
            KeyCode::Char(c) => write!(f, "{c}"),
            KeyCode::Esc => f.write_str("esc"),
            KeyCode::Enter => f.write_str("enter"),
            KeyCode::Tab => f.write_str("tab"),
            KeyCode::Backspace => f.write_str("backspace"),
            KeyCode::Delete => f.write_str("delete"),
            KeyCode::Insert => f.write_str("insert"),
            KeyCode::Home => f.write_str("home"),
            KeyCode::End => f.write_str("end"),
            KeyCode::PageUp => f.write_str("pageup"),
            KeyCode::PageDown => f.write_str("pagedown"),
            KeyCode::Up => f.write_str("up"),
            KeyCode::Down => f.write_str("down"),
            KeyCode::Left => f.write_str("left"),
            KeyCode::Right => f.write_str("right"),
            other => write!(f, "{other:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn glyphs_for_special_keys() {
        assert_eq!(key_label(&KeyCode::Backspace).as_deref(), Some("⌫"));
        assert_eq!(key_label(&KeyCode::Enter).as_deref(), Some("⏎"));
        assert_eq!(key_label(&KeyCode::Char(' ')).as_deref(), Some("␣"));
        assert_eq!(key_label(&KeyCode::Tab).as_deref(), Some("↹"));
        assert_eq!(key_label(&KeyCode::Left).as_deref(), Some("←"));
        assert_eq!(key_label(&KeyCode::F(12)).as_deref(), Some("F12"));
        assert_eq!(key_label(&KeyCode::Char('x')).as_deref(), Some("x"));
        assert_eq!(
            key_label(&KeyCode::Modifier(ModifierKeyCode::LeftShift)).as_deref(),
            Some("⇧")
        );
        assert_eq!(key_label(&KeyCode::Null), None);
    }

    #[test]
    fn modifiers_in_display_order() {
        let mods = KeyModifiers::SUPER | KeyModifiers::SHIFT | KeyModifiers::CONTROL;
        assert_eq!(modifier_labels(mods), vec!["Ctrl", "Shift", "Meta"]);
        assert!(modifier_labels(KeyModifiers::NONE).is_empty());
    }

    #[test]
    fn parse_and_display_hotkeys() {
        let f9: Hotkey = "F9".parse().unwrap();
        assert_eq!(f9.to_string(), "F9");
        let quit: Hotkey = "Ctrl + Q".parse().unwrap();
        assert_eq!(quit.to_string(), "ctrl+q");
        let chord: Hotkey = "alt+shift+space".parse().unwrap();
        assert_eq!(chord.to_string(), "alt+shift+space");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<Hotkey>().is_err());
        assert!("ctrl+".parse::<Hotkey>().is_err());
        assert!("hyper+x".parse::<Hotkey>().is_err());
        assert!("f99".parse::<Hotkey>().is_err());
        assert!("ctrl+qq".parse::<Hotkey>().is_err());
    }

    #[test]
    fn matching_respects_modifiers() {
        let quit: Hotkey = "ctrl+q".parse().unwrap();
        assert!(quit.matches(&press(KeyCode::Char('q'), KeyModifiers::CONTROL)));
        assert!(quit.matches(&press(
            KeyCode::Char('Q'),
            KeyModifiers::CONTROL | KeyModifiers::SHIFT
        )));
        assert!(!quit.matches(&press(KeyCode::Char('q'), KeyModifiers::NONE)));
        assert!(!quit.matches(&press(KeyCode::Char('q'), KeyModifiers::CONTROL | KeyModifiers::ALT)));

        let f9: Hotkey = "F9".parse().unwrap();
        assert!(f9.matches(&press(KeyCode::F(9), KeyModifiers::NONE)));
        assert!(!f9.matches(&press(KeyCode::F(9), KeyModifiers::SHIFT)));

        let mut release = press(KeyCode::F(9), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert!(!f9.matches(&release));
    }

    #[test]
    fn ctrl_c_is_interrupt() {
        assert!(is_interrupt(&press(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(!is_interrupt(&press(KeyCode::Char('c'), KeyModifiers::NONE)));
    }
}
