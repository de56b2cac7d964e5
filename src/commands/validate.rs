//! `stackcraft validate` - build and check every stack without writing

use anyhow::{Result, bail};
use stackgraph::Stack;

use crate::Context;
use crate::ui;

/// What a valid stack contains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSummary {
    pub resources: usize,
    pub edges: usize,
    pub outputs: usize,
}

pub fn run(ctx: &Context) -> Result<()> {
    let (_, app) = super::load(ctx)?;

    let mut failed = 0;
    for stack in app.stacks() {
        match check(stack) {
            Ok(summary) => {
                if !ctx.quiet {
                    ui::success(&format!(
                        "{}: {}, {}, {}",
                        stack.name(),
                        ui::count(summary.resources, "resource"),
                        ui::count(summary.edges, "edge"),
                        ui::count(summary.outputs, "output"),
                    ));
                }
            }
            Err(e) => {
                failed += 1;
                ui::error(&format!("{}: {e}", stack.name()));
            }
        }
    }

    if failed > 0 {
        bail!("{} failed validation", ui::count(failed, "stack"));
    }
    Ok(())
}

/// Validate the graph, then render once so output and provider references
/// are checked too
pub fn check(stack: &Stack) -> stackgraph::Result<StackSummary> {
    stack.validate()?;
    let document = stack.synthesize()?;

    Ok(StackSummary {
        resources: document.resources.len(),
        edges: stack.graph().edge_count(),
        outputs: document.outputs.len(),
    })
}
