//! Configuration at `~/.keycast/config.toml`.
//!
//! Every field has a default, so a missing file or a partial one is fine.
//! CLI flags always override config file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use keycast_core::{CaptureMode, ControllerConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::keys::Hotkey;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub overlay: OverlayConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub keys: KeysConfig,
}

/// What the overlay shows and for how long.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Number of recent key presses on screen.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Hide the key stack after this much inactivity.
    #[serde(default = "default_hide_after_ms")]
    pub hide_after_ms: u64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            hide_after_ms: default_hide_after_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Limit for begin/end capture commands. 0 disables the limit.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    /// Capture mouse buttons, movement and wheel.
    #[serde(default = "default_mouse")]
    pub mouse: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: default_command_timeout_ms(),
            mouse: default_mouse(),
        }
    }
}

/// Control hotkeys, e.g. `F9` or `ctrl+q`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysConfig {
    #[serde(default = "default_start_key")]
    pub start: String,

    #[serde(default = "default_stop_key")]
    pub stop: String,

    #[serde(default = "default_quit_key")]
    pub quit: String,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            start: default_start_key(),
            stop: default_stop_key(),
            quit: default_quit_key(),
        }
    }
}

fn default_capacity() -> usize {
    10
}

fn default_hide_after_ms() -> u64 {
    5000
}

fn default_command_timeout_ms() -> u64 {
    5000
}

fn default_mouse() -> bool {
    true
}

fn default_start_key() -> String {
    "F9".to_string()
}

fn default_stop_key() -> String {
    "F10".to_string()
}

fn default_quit_key() -> String {
    "ctrl+q".to_string()
}

/// Parsed control hotkeys.
#[derive(Debug, Clone, Copy)]
pub struct Hotkeys {
    pub start: Hotkey,
    pub stop: Hotkey,
    pub quit: Hotkey,
}

impl Config {
    /// `~/.keycast/config.toml`
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_default();
        home.join(".keycast").join("config.toml")
    }

    /// Load configuration from a TOML file, returning defaults if the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;

        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Reject values that would make the overlay unusable.
    pub fn validate(&self) -> Result<()> {
        if self.overlay.capacity == 0 {
            bail!("overlay.capacity must be at least 1");
        }
        self.hotkeys()?;
        Ok(())
    }

    pub fn hotkeys(&self) -> Result<Hotkeys> {
        let parse = |name: &str, value: &str| -> Result<Hotkey> {
            value
                .parse()
                .with_context(|| format!("invalid keys.{name} hotkey"))
        };
        Ok(Hotkeys {
            start: parse("start", &self.keys.start)?,
            stop: parse("stop", &self.keys.stop)?,
            quit: parse("quit", &self.keys.quit)?,
        })
    }

    /// Controller settings for `mode` derived from this file.
    pub fn controller_config(&self, mode: CaptureMode) -> ControllerConfig {
        let command_timeout = match self.capture.command_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        ControllerConfig {
            mode,
            capacity: self.overlay.capacity,
            hide_after: Duration::from_millis(self.overlay.hide_after_ms),
            command_timeout,
            ..ControllerConfig::default()
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize config")
    }
}
