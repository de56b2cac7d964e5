//! `stackcraft diff` - compare documents on disk with a fresh synthesis

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::io::ErrorKind;

use crate::Context;
use crate::cli::DiffArgs;
use crate::ui;

/// Lines of context around each change
const CONTEXT_LINES: usize = 3;

/// One rendered diff line; `None` tag marks a hunk separator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub tag: Option<ChangeTag>,
    pub text: String,
}

pub fn run(ctx: &Context, args: DiffArgs) -> Result<()> {
    let (config, app) = super::load(ctx)?;
    let synthesis = app.synth().context("Synthesis failed")?;
    let selected = super::select_artifacts(&synthesis, args.stack.as_deref())?;
    let out_dir = config.output_dir();

    let mut changed = 0;
    for artifact in selected {
        let path = out_dir.join(&artifact.path);
        let current = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("{} does not exist yet", path.display());
                String::new()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Could not read {}", path.display()));
            }
        };
        let fresh = artifact
            .document
            .to_json()
            .with_context(|| format!("Could not serialize stack '{}'", artifact.name))?;

        let Some(lines) = diff_lines(&current, &fresh) else {
            if !ctx.quiet {
                ui::success(&format!("{}: up to date", artifact.name));
            }
            continue;
        };

        changed += 1;
        ui::header(&format!("{} ({})", artifact.name, path.display()));
        for line in lines {
            match line.tag {
                Some(ChangeTag::Delete) => print!("{}", format!("- {}", line.text).red()),
                Some(ChangeTag::Insert) => print!("{}", format!("+ {}", line.text).green()),
                Some(ChangeTag::Equal) => print!("  {}", line.text.dimmed()),
                None => println!("{}", line.text.cyan()),
            }
        }
    }

    if changed > 0 && !ctx.quiet {
        println!();
        ui::warn(&format!(
            "{} differ from disk; run `stackcraft synth` to update",
            ui::count(changed, "stack")
        ));
    }
    Ok(())
}

/// Grouped line diff of `old` against `new`, or `None` when identical
pub fn diff_lines(old: &str, new: &str) -> Option<Vec<DiffLine>> {
    let diff = TextDiff::from_lines(old, new);
    let groups = diff.grouped_ops(CONTEXT_LINES);
    if groups.is_empty() {
        return None;
    }

    let mut lines = Vec::new();
    for (i, group) in groups.iter().enumerate() {
        if i > 0 {
            lines.push(DiffLine {
                tag: None,
                text: "...".to_string(),
            });
        }
        for op in group {
            for change in diff.iter_changes(op) {
                let mut text = change.to_string();
                if change.missing_newline() {
                    text.push('\n');
                }
                lines.push(DiffLine {
                    tag: Some(change.tag()),
                    text,
                });
            }
        }
    }
    Some(lines)
}
