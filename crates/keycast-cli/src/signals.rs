//! UNIX signal control: `SIGUSR1` starts, `SIGUSR2` stops, `SIGTERM` quits.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::backend::{TerminalBackend, UiEvent};

#[cfg(unix)]
pub fn spawn(
    backend: Arc<TerminalBackend>,
    ui: mpsc::Sender<UiEvent>,
) -> Result<Option<JoinHandle<()>>> {
    use anyhow::Context;
    use keycast_core::topics;
    use tokio::signal::unix::{signal, SignalKind};
    use tracing::info;

    let mut start = signal(SignalKind::user_defined1()).context("failed to install SIGUSR1 handler")?;
    let mut stop = signal(SignalKind::user_defined2()).context("failed to install SIGUSR2 handler")?;
    let mut term = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    Ok(Some(tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(()) = start.recv() => {
                    info!("SIGUSR1: start requested");
                    backend.request(topics::CAPTURE_START_REQUESTED);
                }
                Some(()) = stop.recv() => {
                    info!("SIGUSR2: stop requested");
                    backend.request(topics::CAPTURE_STOP_REQUESTED);
                }
                Some(()) = term.recv() => {
                    info!("SIGTERM: quitting");
                    let _ = ui.send(UiEvent::Quit).await;
                    break;
                }
                else => break,
            }
        }
    })))
}

#[cfg(not(unix))]
pub fn spawn(
    _backend: Arc<TerminalBackend>,
    _ui: mpsc::Sender<UiEvent>,
) -> Result<Option<JoinHandle<()>>> {
    Ok(None)
}
