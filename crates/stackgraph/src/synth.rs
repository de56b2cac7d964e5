//! Synthesizer - turns a validated stack into an ordered document
//!
//! Emission uses Kahn's algorithm in waves: every node whose dependencies
//! have all been emitted forms the next wave, and a wave is emitted in
//! ascending logical id order before any node it unblocks. References are
//! rewritten to executor expressions, or to literals when the attribute is
//! already known.

use crate::document::{Document, OutputValue, ProviderConfig, ResourceEntry};
use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::node::{Properties, ResourceNode};
use crate::scope::Registry;
use crate::stack::Stack;
use crate::value::{AttributeRef, NodeId, PathSegment, Resolved, render};
use log::{debug, info};
use serde_json::{Map, Value as Json};
use std::collections::{BTreeMap, BTreeSet};

/// Validate `graph` and return its nodes in emission order
///
/// For every edge `u -> v`, `v` precedes `u`. Ties are broken by wave, then
/// by ascending id, so the order does not depend on registration order.
pub fn emission_order<'g>(graph: &'g DependencyGraph<'_>) -> Result<Vec<&'g NodeId>> {
    graph.validate()?;

    let mut pending: BTreeMap<&NodeId, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&NodeId, Vec<&NodeId>> = BTreeMap::new();
    for id in graph.node_ids() {
        pending.insert(id, graph.dependencies(id).count());
        for dependency in graph.dependencies(id) {
            dependents.entry(dependency).or_default().push(id);
        }
    }

    let mut wave: BTreeSet<&NodeId> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut order = Vec::with_capacity(pending.len());

    while !wave.is_empty() {
        let mut next = BTreeSet::new();
        while let Some(id) = wave.pop_first() {
            order.push(id);
            for dependent in dependents.get(id).into_iter().flatten() {
                if let Some(count) = pending.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        next.insert(*dependent);
                    }
                }
            }
        }
        wave = next;
    }

    debug_assert_eq!(order.len(), graph.node_count());
    Ok(order)
}

/// Rewrites references seen while rendering one consumer
struct Resolver<'a> {
    registry: &'a Registry,
    from: String,
    /// Addresses of nodes whose known attributes were inlined
    implied: BTreeSet<String>,
}

impl<'a> Resolver<'a> {
    fn new(registry: &'a Registry, from: impl Into<String>) -> Self {
        Self {
            registry,
            from: from.into(),
            implied: BTreeSet::new(),
        }
    }

    fn resolve(&mut self, reference: &AttributeRef) -> Result<Resolved> {
        let segments = reference.segments(&self.from)?;
        let node = self
            .registry
            .get(reference.node())
            .ok_or_else(|| Error::InvalidReference {
                from: self.from.clone(),
                node: reference.node().to_string(),
                attribute: reference.path().to_string(),
                reason: format!("'{}' is not registered", reference.node()),
            })?;

        if let Some(value) = known_value(node, &segments) {
            self.implied.insert(node.address());
            return Ok(Resolved::Literal(value.clone()));
        }

        Ok(Resolved::Expression(format!(
            "{}.{}",
            node.address(),
            reference.path()
        )))
    }

    fn render_properties(&mut self, properties: &Properties) -> Result<Map<String, Json>> {
        let mut body = Map::new();
        for (field, value) in properties.iter() {
            body.insert(field.clone(), render(value, &mut |r| self.resolve(r))?);
        }
        Ok(body)
    }
}

/// Walk `segments` into the node's known attributes
fn known_value<'n>(node: &'n ResourceNode, segments: &[PathSegment]) -> Option<&'n Json> {
    let (PathSegment::Field(root), rest) = segments.split_first()? else {
        return None;
    };

    rest.iter()
        .try_fold(node.known.get(root)?, |current, segment| match segment {
            PathSegment::Field(name) => current.get(name),
            PathSegment::Index(index) => current.get(index),
        })
}

/// Renders one stack into a [`Document`]
pub struct Synthesizer<'a> {
    stack: &'a Stack,
}

impl<'a> Synthesizer<'a> {
    pub fn new(stack: &'a Stack) -> Self {
        Self { stack }
    }

    /// Validate everything, then render. Nothing is returned on failure.
    pub fn synthesize(&self) -> Result<Document> {
        let stack = self.stack;
        info!("Synthesizing stack {}", stack.name());

        let backend = match stack.backend() {
            Some(descriptor) => {
                let kind = descriptor.validate()?;
                Some((kind.as_str().to_string(), descriptor.render()))
            }
            None => None,
        };

        let registry = stack.registry();
        let providers = self.providers(registry)?;

        let graph = stack.graph();
        let order = emission_order(&graph)?;

        let mut resources = Vec::with_capacity(order.len());
        for id in order {
            let Some(node) = registry.get(id) else {
                continue;
            };
            resources.push(self.resource(registry, node)?);
        }

        let outputs = self.outputs(registry)?;

        debug!(
            "Stack {}: {} resources, {} outputs, {} providers",
            stack.name(),
            resources.len(),
            outputs.len(),
            providers.len()
        );

        Ok(Document {
            stack: stack.name().to_string(),
            backend,
            providers,
            resources,
            outputs,
        })
    }

    fn resource(&self, registry: &Registry, node: &ResourceNode) -> Result<ResourceEntry> {
        let mut resolver = Resolver::new(registry, node.id.as_str());
        let mut body = resolver.render_properties(&node.properties)?;

        let mut depends_on = resolver.implied;
        for dependency in &node.explicit_dependencies {
            if let Some(target) = registry.get(dependency) {
                depends_on.insert(target.address());
            }
        }
        if !depends_on.is_empty() {
            body.insert(
                "depends_on".to_string(),
                Json::Array(depends_on.into_iter().map(Json::String).collect()),
            );
        }

        Ok(ResourceEntry {
            resource_type: node.resource_type.clone(),
            id: node.id.clone(),
            body,
        })
    }

    fn outputs(&self, registry: &Registry) -> Result<Vec<OutputValue>> {
        self.stack
            .outputs()
            .entries()
            .iter()
            .map(|entry| -> Result<OutputValue> {
                let mut resolver = Resolver::new(registry, format!("output '{}'", entry.name));
                Ok(OutputValue {
                    name: entry.name.clone(),
                    value: render(&entry.value, &mut |r| resolver.resolve(r))?,
                    description: entry.description.clone(),
                    sensitive: entry.sensitive,
                })
            })
            .collect()
    }

    fn providers(&self, registry: &Registry) -> Result<Vec<ProviderConfig>> {
        self.stack
            .providers()
            .iter()
            .map(|block| -> Result<ProviderConfig> {
                block.check()?;
                let mut resolver =
                    Resolver::new(registry, format!("provider '{}'", block.reference()));
                let mut body = resolver.render_properties(&block.config)?;
                if let Some(alias) = &block.alias {
                    body.insert("alias".to_string(), Json::String(alias.clone()));
                }
                Ok(ProviderConfig {
                    name: block.name.clone(),
                    source: block.source.clone(),
                    version: block.version.clone(),
                    body,
                })
            })
            .collect()
    }
}
