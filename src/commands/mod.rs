// Synthesis commands
pub mod diff;
pub mod graph;
pub mod synth;
pub mod validate;

use anyhow::{Result, bail};
use stackgraph::{App, Stack, StackArtifact, Synthesis};

use crate::Context;
use crate::config::ProjectConfig;
use crate::stacks;

/// Load the project config and build the app it describes
pub fn load(ctx: &Context) -> Result<(ProjectConfig, App)> {
    let config = ProjectConfig::load(ctx.config.as_deref())?;
    let app = stacks::build(&config)?;
    Ok((config, app))
}

/// Stacks to operate on: the named one, or all of them
pub fn select_stacks<'a>(app: &'a App, name: Option<&str>) -> Result<Vec<&'a Stack>> {
    match name {
        None => Ok(app.stacks().collect()),
        Some(name) => match app.get(name) {
            Some(stack) => Ok(vec![stack]),
            None => bail!("Unknown stack '{name}' (available: {})", available(app)),
        },
    }
}

/// Artifacts to operate on: the named one, or all of them
pub fn select_artifacts<'a>(
    synthesis: &'a Synthesis,
    name: Option<&str>,
) -> Result<Vec<&'a StackArtifact>> {
    match name {
        None => Ok(synthesis.stacks.iter().collect()),
        Some(name) => match synthesis.get(name) {
            Some(artifact) => Ok(vec![artifact]),
            None => bail!("Unknown stack '{name}'"),
        },
    }
}

fn available(app: &App) -> String {
    app.stacks()
        .map(Stack::name)
        .collect::<Vec<_>>()
        .join(", ")
}
