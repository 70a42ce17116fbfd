//! Shared interactive loop for `overlay` and `record`.
//!
//! Wires the terminal backend, controller and signal bridge together, draws
//! every snapshot the controller pushes, and tears everything down in order
//! once the user quits.

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use keycast_core::{
    CapturedSession, ControllerConfig, ExternalSignalBridge, SessionController, SessionStatus,
    Snapshot,
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::backend::{TerminalBackend, UiEvent};
use crate::config::Config;
use crate::render::{self, View};
use crate::signals;
use crate::terminal::{self as term, OverlayTerminal};

/// How the loop begins and ends.
pub struct Plan {
    /// Start a session right away, with this label.
    pub autostart: Option<Option<String>>,
    /// Leave the loop once the started session has ended.
    pub exit_when_idle: bool,
}

/// Run the interactive screen until quit. Returns the last finished recording, if any.
pub async fn run(
    controller_config: ControllerConfig,
    settings: &Config,
    plan: Plan,
) -> Result<Option<CapturedSession>> {
    let hotkeys = settings.hotkeys()?;
    let view = View {
        mode: controller_config.mode,
        start_key: hotkeys.start.to_string(),
        stop_key: hotkeys.stop.to_string(),
        quit_key: hotkeys.quit.to_string(),
    };
    let mouse = settings.capture.mouse;

    let backend = Arc::new(TerminalBackend::new());
    let controller = SessionController::new(backend.clone(), controller_config);
    let bridge = ExternalSignalBridge::attach(&controller, backend.as_ref())
        .context("failed to subscribe to capture requests")?;
    let mut snapshots = controller.subscribe();

    let terminal = OverlayTerminal::enter(mouse)?;
    let (ui_tx, mut ui_rx) = mpsc::channel(16);
    let reader = backend.spawn_reader(hotkeys, mouse, ui_tx.clone());
    let signal_task = match signals::spawn(backend.clone(), ui_tx) {
        Ok(task) => task,
        Err(e) => {
            warn!("signal control unavailable: {e:#}");
            None
        }
    };

    let result = event_loop(&controller, &mut snapshots, &mut ui_rx, &view, plan).await;

    // Teardown order: app-scoped subscriptions, session, input, screen.
    // No new start request can arrive while shutdown waits on a starting one.
    bridge.shutdown();
    let stopped = controller.shutdown().await;
    reader.stop().await;
    if let Some(task) = signal_task {
        task.abort();
    }
    drop(terminal);

    result?;
    match stopped {
        Ok(Some(recording)) => Ok(Some(recording)),
        Ok(None) => Ok(controller.last_recording()),
        Err(e) => {
            warn!("session did not stop cleanly: {e}");
            Ok(controller.last_recording())
        }
    }
}

async fn event_loop(
    controller: &SessionController,
    snapshots: &mut watch::Receiver<Snapshot>,
    ui: &mut mpsc::Receiver<UiEvent>,
    view: &View,
    plan: Plan,
) -> Result<()> {
    let mut out = io::stdout();
    let (mut cols, mut rows) = term::size();
    redraw(&mut out, &controller.snapshot(), view, cols, rows)?;

    let mut started = false;
    if let Some(label) = plan.autostart {
        controller
            .start(label.as_deref())
            .await
            .context("failed to start capture session")?;
        started = true;
    }

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                redraw(&mut out, &snapshot, view, cols, rows)?;
                match snapshot.status {
                    SessionStatus::Active => started = true,
                    SessionStatus::Idle if plan.exit_when_idle && started => {
                        info!("session ended");
                        break;
                    }
                    _ => {}
                }
            }
            event = ui.recv() => match event {
                Some(UiEvent::Resize(c, r)) => {
                    debug!(cols = c, rows = r, "terminal resized");
                    cols = c;
                    rows = r;
                    redraw(&mut out, &controller.snapshot(), view, cols, rows)?;
                }
                Some(UiEvent::Quit) | None => {
                    info!("quit requested");
                    break;
                }
            },
        }
    }
    Ok(())
}

fn redraw(out: &mut io::Stdout, snapshot: &Snapshot, view: &View, cols: u16, rows: u16) -> Result<()> {
    let lines = render::compose(snapshot, view, cols, rows);
    render::draw(out, &lines).context("failed to draw overlay")
}
