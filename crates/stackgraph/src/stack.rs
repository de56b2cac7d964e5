//! Stack - one independently deployable graph
//!
//! A stack owns its registry, outputs, backend, providers and assets. It is
//! passed explicitly to everything that builds on it; there is no ambient
//! construction context.

use crate::asset::{Asset, AssetKind};
use crate::backend::BackendDescriptor;
use crate::document::Document;
use crate::error::{Error, Result, check_identifier};
use crate::graph::DependencyGraph;
use crate::node::{NodeHandle, Properties};
use crate::output::{OutputEntry, OutputPublisher};
use crate::provider::ProviderBlock;
use crate::scope::{Registry, ScopeId};
use crate::synth::Synthesizer;
use crate::value::{NodeId, Value};
use serde_json::Value as Json;
use std::path::PathBuf;

#[derive(Debug)]
pub struct Stack {
    name: String,
    registry: Registry,
    outputs: OutputPublisher,
    backend: Option<BackendDescriptor>,
    providers: Vec<ProviderBlock>,
    assets: Vec<Asset>,
}

impl Stack {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        check_identifier("stack name", &name)?;

        Ok(Self {
            registry: Registry::new(name.clone()),
            name,
            outputs: OutputPublisher::new(),
            backend: None,
            providers: Vec::new(),
            assets: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The stack's own scope
    pub fn root(&self) -> ScopeId {
        self.registry.root()
    }

    /// Create a child scope of `parent`
    pub fn scope(&mut self, parent: ScopeId, id: &str) -> Result<ScopeId> {
        self.registry.scope(parent, id)
    }

    /// Register a resource node in `scope`
    ///
    /// References inside `properties` may point at nodes registered later;
    /// they are checked when the stack is validated.
    pub fn register(
        &mut self,
        scope: ScopeId,
        id: &str,
        resource_type: &str,
        properties: Properties,
    ) -> Result<NodeHandle> {
        self.registry.register(scope, id, resource_type, properties)
    }

    /// `node` must be emitted after `on`
    pub fn add_dependency(&mut self, node: &NodeHandle, on: impl Into<NodeId>) -> Result<()> {
        self.registry.add_dependency(node.id(), on.into())
    }

    /// Record an attribute of `node` that is known before apply
    pub fn know(&mut self, node: &NodeHandle, attribute: &str, value: impl Into<Json>) -> Result<()> {
        self.registry.know(node.id(), attribute, value.into())
    }

    pub fn output(
        &mut self,
        name: &str,
        value: impl Into<Value>,
        description: Option<&str>,
    ) -> Result<()> {
        self.outputs.declare(name, value, description)
    }

    pub fn declare(&mut self, entry: OutputEntry) -> Result<()> {
        self.outputs.declare_entry(entry)
    }

    /// Replace the backend; the descriptor is validated first
    pub fn set_backend(&mut self, backend: BackendDescriptor) -> Result<()> {
        backend.validate()?;
        self.backend = Some(backend);
        Ok(())
    }

    /// Add a provider block; `(name, alias)` must be unique
    pub fn provider(&mut self, block: ProviderBlock) -> Result<()> {
        block.check()?;

        if self
            .providers
            .iter()
            .any(|p| p.name == block.name && p.alias == block.alias)
        {
            return Err(Error::DuplicateId {
                scope: format!("{}/providers", self.name),
                id: block.reference(),
            });
        }

        self.providers.push(block);
        Ok(())
    }

    /// Hash `source` and register it as an asset named `id` in `scope`
    pub fn asset(
        &mut self,
        scope: ScopeId,
        id: &str,
        source: impl Into<PathBuf>,
        kind: AssetKind,
    ) -> Result<Asset> {
        // Hash before claiming the id so a failed read leaves the scope untouched
        let logical = self.registry.available(scope, id)?;
        let asset = Asset::new(logical, source, kind)?;
        self.registry.register_asset(scope, id)?;

        self.assets.push(asset.clone());
        Ok(asset)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn outputs(&self) -> &OutputPublisher {
        &self.outputs
    }

    pub fn backend(&self) -> Option<&BackendDescriptor> {
        self.backend.as_ref()
    }

    pub fn providers(&self) -> &[ProviderBlock] {
        &self.providers
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn graph(&self) -> DependencyGraph<'_> {
        DependencyGraph::build(&self.registry)
    }

    /// Check references and acyclicity without rendering
    pub fn validate(&self) -> Result<()> {
        if let Some(backend) = &self.backend {
            backend.validate()?;
        }
        self.graph().validate()
    }

    pub fn synthesize(&self) -> Result<Document> {
        Synthesizer::new(self).synthesize()
    }
}
