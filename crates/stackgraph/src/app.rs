//! App - a set of stacks synthesized together

use crate::asset::Asset;
use crate::document::{Document, VERSION};
use crate::error::{Error, Result};
use crate::stack::Stack;
use log::info;
use rayon::prelude::*;
use serde_json::{Map, Value as Json, json};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// Name of the manifest written next to the stack documents
pub const MANIFEST_FILE: &str = "manifest.json";

/// Stacks keyed by name
#[derive(Debug, Default)]
pub struct App {
    stacks: BTreeMap<String, Stack>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stack named `name` and return it for construction
    pub fn stack(&mut self, name: &str) -> Result<&mut Stack> {
        match self.stacks.entry(name.to_string()) {
            Entry::Occupied(_) => Err(Error::DuplicateId {
                scope: "app".to_string(),
                id: name.to_string(),
            }),
            Entry::Vacant(slot) => Ok(slot.insert(Stack::new(name)?)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Stack> {
        self.stacks.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Stack> {
        self.stacks.get_mut(name)
    }

    /// Stacks in ascending name order
    pub fn stacks(&self) -> impl Iterator<Item = &Stack> {
        self.stacks.values()
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// Synthesize every stack in parallel
    ///
    /// All or nothing: the first error (in stack name order) is returned and
    /// no artifacts are produced.
    pub fn synth(&self) -> Result<Synthesis> {
        let results: Vec<Result<StackArtifact>> = self
            .stacks
            .par_iter()
            .map(|(name, stack)| -> Result<StackArtifact> {
                Ok(StackArtifact {
                    name: name.clone(),
                    path: format!("stacks/{name}/cdk.tf.json"),
                    document: stack.synthesize()?,
                    assets: stack.assets().to_vec(),
                })
            })
            .collect();

        let stacks = results.into_iter().collect::<Result<Vec<_>>>()?;
        info!("Synthesized {} stack(s)", stacks.len());
        Ok(Synthesis { stacks })
    }
}

/// One synthesized stack and where it belongs in the output directory
#[derive(Debug, Clone)]
pub struct StackArtifact {
    pub name: String,
    /// Document path relative to the output directory
    pub path: String,
    pub document: Document,
    pub assets: Vec<Asset>,
}

/// Result of [`App::synth`], stacks in ascending name order
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub stacks: Vec<StackArtifact>,
}

impl Synthesis {
    pub fn get(&self, name: &str) -> Option<&StackArtifact> {
        self.stacks.iter().find(|s| s.name == name)
    }

    /// Manifest the executor reads to find each stack's document
    pub fn manifest(&self) -> Json {
        let mut stacks = Map::new();
        for artifact in &self.stacks {
            let assets: Map<String, Json> = artifact
                .assets
                .iter()
                .map(|asset| {
                    (
                        asset.id().to_string(),
                        json!({
                            "source": asset.source().display().to_string(),
                            "type": asset.kind(),
                            "hash": asset.hash(),
                            "path": asset.staged_path(),
                        }),
                    )
                })
                .collect();

            stacks.insert(
                artifact.name.clone(),
                json!({
                    "name": artifact.name,
                    "synthesizedStackPath": artifact.path,
                    "workingDirectory": format!("stacks/{}", artifact.name),
                    "assets": assets,
                }),
            );
        }

        json!({
            "version": VERSION,
            "stacks": stacks,
        })
    }
}
