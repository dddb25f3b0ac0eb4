//! Preview a full apply.

use anyhow::Result;
use skreg_infra_aws::simulate;
use std::sync::Arc;

pub async fn run(json: bool) -> Result<()> {
    let stack = super::load_stack()?;
    let run = stack.run(Arc::new(simulate::engine())).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
        return Ok(());
    }

    println!("Stack: {}", stack.stack_name());
    println!("Run: {}", run.summary.run_id);
    println!();
    for change in &run.summary.changes {
        println!("  {:<8} {}", change.operation.to_string(), change.urn);
    }
    println!();
    println!(
        "{} to create, {} to update, {} unchanged",
        run.summary.created(),
        run.summary.updated(),
        run.summary.unchanged()
    );
    println!();
    println!("Outputs:");
    for (key, value) in &run.outputs {
        match value {
            serde_json::Value::String(s) if s.contains('\n') => {
                println!("  {key}:");
                for line in s.lines() {
                    println!("    {line}");
                }
            }
            other => println!("  {key}: {other}"),
        }
    }
    Ok(())
}
