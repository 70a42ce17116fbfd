//! keycast: show live keystrokes and mouse actions in a terminal overlay.
//!
//! `overlay` runs the live display, `record` captures a labelled task
//! timeline and prints a summary, `config` shows the effective settings.

mod backend;
mod commands;
mod config;
mod keys;
mod render;
mod signals;
mod terminal;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// keycast: keystroke overlay
#[derive(Parser)]
#[command(name = "keycast", version, about = "Show live keystrokes and mouse actions in a terminal overlay")]
struct Cli {
    /// Config file path (default: ~/.keycast/config.toml)
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write logs to this file instead of stderr
    #[arg(long = "log-file", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the live overlay
    Overlay {
        /// Number of recent key presses to show
        #[arg(long)]
        capacity: Option<usize>,

        /// Hide the key stack after this many milliseconds without a key press
        #[arg(long)]
        hide_after_ms: Option<u64>,

        /// Wait for the start hotkey instead of capturing immediately
        #[arg(long)]
        no_autostart: bool,
    },

    /// Record a labelled task session and print its timeline
    Record {
        /// Task name
        task: String,

        /// Also print the full timeline as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config,
}

fn init_tracing(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let default_filter = if verbose {
        "keycast=debug,keycast_core=debug"
    } else {
        "keycast=warn,keycast_core=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(verbose)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    init_tracing(cli.verbose, cli.log_file.as_deref())?;

    let config_path = cli.config.clone().unwrap_or_else(config::Config::default_path);
    let cfg = config::Config::load(&config_path)?;
    cfg.validate()
        .with_context(|| format!("invalid config at {}", config_path.display()))?;

    match cli.command {
        Command::Overlay {
            capacity,
            hide_after_ms,
            no_autostart,
        } => {
            let overrides = commands::overlay::Overrides {
                capacity,
                hide_after_ms,
                no_autostart,
            };
            commands::overlay::run(&cfg, overrides).await
        }
        Command::Record { task, json } => commands::record::run(&cfg, &task, json).await,
        Command::Config => commands::config::run(&cfg, &config_path),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("keycast: {e:#}");
        std::process::exit(1);
    }
}
