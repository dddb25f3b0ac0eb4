//! Dependency graph inspection.

use anyhow::Result;
use skreg_infra_aws::simulate;
use skreg_infra_core::Context;
use std::sync::Arc;
use tracing::debug;

pub fn show(json: bool) -> Result<()> {
    let stack = super::load_stack()?;
    let ctx = Context::new(stack.stack_name(), Arc::new(simulate::engine()));
    stack.declare(&ctx)?;

    let graph = ctx.graph();
    let order = graph.topological_order()?;
    let nodes: Vec<_> = order.iter().filter_map(|urn| graph.get(urn)).collect();
    debug!(nodes = nodes.len(), "graph resolved");

    if json {
        println!("{}", serde_json::to_string_pretty(&nodes)?);
        return Ok(());
    }

    for node in nodes {
        let deps: Vec<&str> = node.all_dependencies().map(|urn| urn.name()).collect();
        let protect = if node.protect { " [protected]" } else { "" };
        if deps.is_empty() {
            println!("{} ({}){protect}", node.name, node.type_token);
        } else {
            println!(
                "{} ({}){protect} <- {}",
                node.name,
                node.type_token,
                deps.join(", ")
            );
        }
    }
    Ok(())
}
