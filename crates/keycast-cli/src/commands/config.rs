//! `keycast config`: print the effective configuration.

use std::path::Path;

use anyhow::Result;

use crate::config::Config;

pub fn run(config: &Config, path: &Path) -> Result<()> {
    println!("# effective configuration (file: {})", path.display());
    print!("{}", config.to_toml()?);
    Ok(())
}
