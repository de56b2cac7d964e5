//! Resource nodes and the handles user code holds onto

use crate::value::{AttributeRef, NodeId, Value};
use serde_json::Value as Json;
use std::collections::{BTreeMap, BTreeSet};

/// Property map of a resource; field names are unique
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(BTreeMap<String, Value>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert; a repeated field overwrites the earlier value
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every reference in every field, in field order
    pub fn references(&self) -> Vec<&AttributeRef> {
        let mut found = Vec::new();
        for value in self.0.values() {
            value.visit_references(&mut |r| found.push(r));
        }
        found
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A declared infrastructure unit
#[derive(Debug, Clone)]
pub struct ResourceNode {
    /// Logical id, unique within the stack
    pub id: NodeId,
    /// Id as given at registration, unique within its scope
    pub local_id: String,
    /// Provider-defined kind, e.g. `aws_iam_role`
    pub resource_type: String,
    pub properties: Properties,
    /// Nodes that must precede this one regardless of attribute usage
    pub explicit_dependencies: BTreeSet<NodeId>,
    /// Attributes whose value is already known before apply
    pub known: BTreeMap<String, Json>,
}

impl ResourceNode {
    pub(crate) fn new(
        id: NodeId,
        local_id: String,
        resource_type: String,
        properties: Properties,
    ) -> Self {
        Self {
            id,
            local_id,
            resource_type,
            properties,
            explicit_dependencies: BTreeSet::new(),
            known: BTreeMap::new(),
        }
    }

    /// Executor address, `type.logical_id`
    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.id)
    }
}

/// Cheap handle returned from registration, used to wire references
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    id: NodeId,
    resource_type: String,
}

impl NodeHandle {
    pub(crate) fn new(id: NodeId, resource_type: String) -> Self {
        Self { id, resource_type }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Reference an attribute this node will produce
    pub fn attr(&self, path: impl Into<String>) -> AttributeRef {
        AttributeRef::new(self.id.clone(), path)
    }

    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.id)
    }
}

impl From<&NodeHandle> for NodeId {
    fn from(handle: &NodeHandle) -> Self {
        handle.id.clone()
    }
}
