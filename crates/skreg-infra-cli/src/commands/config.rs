//! Configuration inspection.

use anyhow::{Context, Result};
use skreg_infra_config::StackConfig;

pub fn show() -> Result<()> {
    let config = StackConfig::load().context("Invalid SKREG_* configuration")?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
