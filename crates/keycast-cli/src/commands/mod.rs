//! CLI subcommand implementations.

pub mod config;
pub mod overlay;
pub mod record;
mod session;
