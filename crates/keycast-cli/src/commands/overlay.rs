//! `keycast overlay`: live keystroke overlay.

use std::time::Duration;

use anyhow::{bail, Result};
use keycast_core::CaptureMode;
use tracing::info;

use super::session::{self, Plan};
use crate::config::Config;

/// Flags that override the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub capacity: Option<usize>,
    pub hide_after_ms: Option<u64>,
    pub no_autostart: bool,
}

pub async fn run(settings: &Config, overrides: Overrides) -> Result<()> {
    let mut controller_config = settings.controller_config(CaptureMode::Overlay);
    if let Some(capacity) = overrides.capacity {
        if capacity == 0 {
            bail!("--capacity must be at least 1");
        }
        controller_config.capacity = capacity;
    }
    if let Some(ms) = overrides.hide_after_ms {
        controller_config.hide_after = Duration::from_millis(ms);
    }
    info!(
        capacity = controller_config.capacity,
        hide_after_ms = controller_config.hide_after.as_millis() as u64,
        "starting overlay"
    );

    let plan = Plan {
        autostart: (!overrides.no_autostart).then_some(None),
        exit_when_idle: false,
    };
    session::run(controller_config, settings, plan).await?;
    Ok(())
}
