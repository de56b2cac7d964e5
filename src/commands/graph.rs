//! `stackcraft graph` - show emission order and dependency edges

use anyhow::Result;
use colored::Colorize;
use stackgraph::{DependencyGraph, EdgeKind, NodeId, Stack, emission_order};
use std::collections::BTreeMap;

use crate::Context;
use crate::cli::{GraphArgs, GraphFormat};
use crate::ui;

/// One node in emission order with the nodes it waits for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedNode {
    pub address: String,
    pub dependencies: Vec<(String, EdgeKind)>,
}

pub fn run(ctx: &Context, args: GraphArgs) -> Result<()> {
    let (_, app) = super::load(ctx)?;
    let stacks = super::select_stacks(&app, args.stack.as_deref())?;

    for stack in stacks {
        match args.format {
            GraphFormat::Dot => print!("{}", render_dot(stack)?),
            GraphFormat::Text => print_text(stack)?,
        }
    }
    Ok(())
}

fn print_text(stack: &Stack) -> Result<()> {
    let planned = plan(stack)?;
    ui::header(stack.name());

    let total = planned.len();
    for (i, node) in planned.iter().enumerate() {
        ui::step(i + 1, total, &node.address);
        for (dependency, kind) in &node.dependencies {
            let kind = match kind {
                EdgeKind::Explicit => kind.to_string().yellow(),
                EdgeKind::Reference => kind.to_string().normal(),
            };
            println!("      {} {} ({kind})", "←".dimmed(), dependency);
        }
    }

    println!();
    ui::kv("resources", &total.to_string());
    ui::kv("edges", &stack.graph().edge_count().to_string());
    Ok(())
}

fn address(graph: &DependencyGraph<'_>, id: &NodeId) -> String {
    graph
        .registry()
        .get(id)
        .map_or_else(|| id.to_string(), |node| node.address())
}

/// Nodes in emission order, each with its direct dependencies
pub fn plan(stack: &Stack) -> stackgraph::Result<Vec<PlannedNode>> {
    let graph = stack.graph();
    let order = emission_order(&graph)?;

    let mut dependencies: BTreeMap<&NodeId, Vec<(String, EdgeKind)>> = BTreeMap::new();
    for (edge, kind) in graph.edges() {
        dependencies
            .entry(&edge.from)
            .or_default()
            .push((address(&graph, &edge.to), kind));
    }

    Ok(order
        .into_iter()
        .map(|id| PlannedNode {
            address: address(&graph, id),
            dependencies: dependencies.remove(id).unwrap_or_default(),
        })
        .collect())
}

/// Graphviz rendering; explicit edges are dashed
pub fn render_dot(stack: &Stack) -> stackgraph::Result<String> {
    let graph = stack.graph();
    let order = emission_order(&graph)?;

    let mut out = format!("digraph \"{}\" {{\n  rankdir=LR;\n", stack.name());
    for id in order {
        out.push_str(&format!("  \"{}\";\n", address(&graph, id)));
    }
    for (edge, kind) in graph.edges() {
        let style = match kind {
            EdgeKind::Explicit => " [style=dashed]",
            EdgeKind::Reference => "",
        };
        out.push_str(&format!(
            "  \"{}\" -> \"{}\"{style};\n",
            address(&graph, &edge.from),
            address(&graph, &edge.to)
        ));
    }
    out.push_str("}\n");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackgraph::Properties;

    fn stack() -> Stack {
        let mut stack = Stack::new("demo").unwrap();
        let root = stack.root();
        let function = stack
            .register(root, "function", "aws_lambda_function", Properties::new())
            .unwrap();
        let deployment = stack
            .register(
                root,
                "deployment",
                "aws_api_gateway_deployment",
                Properties::new().set("description", function.attr("version")),
            )
            .unwrap();
        stack.add_dependency(&deployment, &function).unwrap();
        stack
    }

    #[test]
    fn test_plan_lists_dependencies_in_order() {
        let planned = plan(&stack()).unwrap();
        assert_eq!(
            planned,
            vec![
                PlannedNode {
                    address: "aws_lambda_function.function".to_string(),
                    dependencies: vec![],
                },
                PlannedNode {
                    address: "aws_api_gateway_deployment.deployment".to_string(),
                    dependencies: vec![(
                        "aws_lambda_function.function".to_string(),
                        EdgeKind::Explicit
                    )],
                },
            ]
        );
    }

    #[test]
    fn test_render_dot() {
        let dot = render_dot(&stack()).unwrap();
        assert_eq!(
            dot,
            "digraph \"demo\" {\n  rankdir=LR;\n  \"aws_lambda_function.function\";\n  \"aws_api_gateway_deployment.deployment\";\n  \"aws_api_gateway_deployment.deployment\" -> \"aws_lambda_function.function\" [style=dashed];\n}\n"
        );
    }
}
