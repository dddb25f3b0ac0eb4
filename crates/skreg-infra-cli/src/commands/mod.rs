//! CLI command implementations.

pub mod config;
pub mod graph;
pub mod plan;

use anyhow::{Context, Result};
use skreg_infra_config::StackConfig;
use skreg_infra_stack::SkregStack;

/// Build the stack from the process environment.
fn load_stack() -> Result<SkregStack> {
    let config = StackConfig::load().context("Invalid SKREG_* configuration")?;
    Ok(SkregStack::new(config))
}
