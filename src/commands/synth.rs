//! `stackcraft synth` - write synthesized documents to disk

use anyhow::{Context as AnyhowContext, Result};
use stackgraph::{MANIFEST_FILE, StackArtifact, Synthesis};
use std::fs;
use std::path::{Path, PathBuf};

use crate::Context;
use crate::cli::SynthArgs;
use crate::ui;

pub fn run(ctx: &Context, args: SynthArgs) -> Result<()> {
    let (config, app) = super::load(ctx)?;
    let synthesis = app.synth().context("Synthesis failed")?;
    let selected = super::select_artifacts(&synthesis, args.stack.as_deref())?;

    let out_dir = args.output.unwrap_or_else(|| config.output_dir());
    let written = write(&out_dir, &synthesis, &selected)?;

    if !ctx.quiet {
        for artifact in &selected {
            ui::success(&format!(
                "{}: {}, {}",
                artifact.name,
                ui::count(artifact.document.resources.len(), "resource"),
                ui::count(artifact.document.outputs.len(), "output"),
            ));
        }
        if ctx.verbose > 0 {
            for path in &written {
                ui::dim(&path.display().to_string());
            }
        }
        ui::info(&format!("Wrote {}", out_dir.display()));
    }

    Ok(())
}

/// Write `artifacts` and the manifest under `out_dir`, returning the paths
pub fn write(
    out_dir: &Path,
    synthesis: &Synthesis,
    artifacts: &[&StackArtifact],
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(artifacts.len() + 1);

    for artifact in artifacts {
        let path = out_dir.join(&artifact.path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Could not create {}", parent.display()))?;
        }

        let content = artifact
            .document
            .to_json()
            .with_context(|| format!("Could not serialize stack '{}'", artifact.name))?;
        fs::write(&path, content).with_context(|| format!("Could not write {}", path.display()))?;

        log::debug!("Wrote {}", path.display());
        written.push(path);
    }

    fs::create_dir_all(out_dir)
        .with_context(|| format!("Could not create {}", out_dir.display()))?;
    let manifest_path = out_dir.join(MANIFEST_FILE);
    let mut manifest = serde_json::to_string_pretty(&synthesis.manifest())?;
    manifest.push('\n');
    fs::write(&manifest_path, manifest)
        .with_context(|| format!("Could not write {}", manifest_path.display()))?;
    written.push(manifest_path);

    Ok(written)
}
