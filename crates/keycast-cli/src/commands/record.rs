//! `keycast record <task>`: record a labelled task session.
//!
//! The timeline summary is printed after the terminal is restored, so it
//! ends up in the normal scrollback (or a pipe).

use anyhow::{bail, Context, Result};
use keycast_core::{CaptureMode, CapturedSession};

use super::session::{self, Plan};
use crate::config::Config;

pub async fn run(settings: &Config, task: &str, json: bool) -> Result<()> {
    let task = task.trim();
    if task.is_empty() {
        bail!("task name must not be empty");
    }

    let plan = Plan {
        autostart: Some(Some(task.to_string())),
        exit_when_idle: true,
    };
    let recording = session::run(settings.controller_config(CaptureMode::Recording), settings, plan).await?;

    let Some(recording) = recording else {
        eprintln!("keycast: no recording was captured");
        return Ok(());
    };
    print!("{}", summary(&recording));
    if json {
        let text = serde_json::to_string_pretty(&recording).context("failed to serialize recording")?;
        println!("{text}");
    }
    Ok(())
}

/// Human-readable summary of a finished recording.
pub fn summary(recording: &CapturedSession) -> String {
    let mut out = String::new();
    out.push_str(&format!("task: {}\n", recording.label));
    out.push_str(&format!(
        "duration: {:.1}s\n",
        recording.duration_ms() as f64 / 1000.0
    ));
    out.push_str(&format!("events: {}\n", recording.len()));
    for (kind, count) in recording.counts() {
        out.push_str(&format!("  {kind}: {count}\n"));
    }
    let keys = recording.keystrokes();
    if !keys.is_empty() {
        out.push_str(&format!("keys: {}\n", keys.join(" ")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use keycast_core::{InputEvent, TimelineRecorder};

    #[test]
    fn summary_lists_counts_and_keys() {
        let mut recorder = TimelineRecorder::new("fix login bug", 10_000);
        recorder.record(InputEvent::key_press("s", vec!["Ctrl".into()], 10_100));
        recorder.record(InputEvent::key_release("s", vec!["Ctrl".into()], 10_150));
        recorder.record(InputEvent::mouse_move(1.0, 1.0, 10_200));
        recorder.record(InputEvent::key_press("⏎", vec![], 10_300));
        let text = summary(&recorder.finish(12_500));

        assert!(text.starts_with("task: fix login bug\n"));
        assert!(text.contains("duration: 2.5s\n"));
        assert!(text.contains("events: 4\n"));
        assert!(text.contains("  key_press: 2\n"));
        assert!(text.contains("  mouse_move: 1\n"));
        assert!(text.contains("keys: Ctrl+s ⏎\n"));
    }

    #[test]
    fn summary_of_empty_recording() {
        let text = summary(&TimelineRecorder::new("idle", 5).finish(5));
        assert!(text.contains("events: 0\n"));
        assert!(!text.contains("keys:"));
    }
}
