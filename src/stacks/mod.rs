//! Stack definitions built from the project config

mod lambda_api;

use crate::config::ProjectConfig;
use anyhow::{Context, Result};
use stackgraph::App;

/// Build the app described by `config`
pub fn build(config: &ProjectConfig) -> Result<App> {
    let mut app = App::new();
    let stack = app
        .stack(&config.stack)
        .with_context(|| format!("Invalid stack name '{}'", config.stack))?;

    lambda_api::define(stack, config)
        .with_context(|| format!("Failed to define stack '{}'", config.stack))?;

    Ok(app)
}
