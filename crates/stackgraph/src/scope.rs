//! Construction scopes and the resource node registry
//!
//! Scopes form an explicit tree rooted at the stack. Each scope maps child
//! ids to nested scopes, resource nodes or assets, so ids only need to be
//! unique among siblings. A node's logical id is its scope path below the
//! stack joined with `_`.

use crate::error::{Error, Result, check_identifier};
use crate::node::{NodeHandle, Properties, ResourceNode};
use crate::value::NodeId;
use log::{debug, trace};
use serde_json::Value as Json;
use std::collections::{BTreeMap, BTreeSet};

/// Handle to a scope inside one registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Child {
    Scope(ScopeId),
    Node(NodeId),
    Asset(String),
}

#[derive(Debug)]
struct Scope {
    id: String,
    parent: Option<ScopeId>,
    children: BTreeMap<String, Child>,
}

/// Allocates and tracks resource nodes, enforcing id uniqueness per scope
#[derive(Debug)]
pub struct Registry {
    scopes: Vec<Scope>,
    nodes: BTreeMap<NodeId, ResourceNode>,
    logical_ids: BTreeSet<String>,
}

impl Registry {
    /// Create a registry whose root scope is named `root`
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            scopes: vec![Scope {
                id: root.into(),
                parent: None,
                children: BTreeMap::new(),
            }],
            nodes: BTreeMap::new(),
            logical_ids: BTreeSet::new(),
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Create a nested scope under `parent`
    pub fn scope(&mut self, parent: ScopeId, id: &str) -> Result<ScopeId> {
        self.check_free(parent, "scope id", id)?;

        let scope = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            id: id.to_string(),
            parent: Some(parent),
            children: BTreeMap::new(),
        });
        self.scopes[parent.0]
            .children
            .insert(id.to_string(), Child::Scope(scope));

        trace!("Created scope {}", self.path(scope));
        Ok(scope)
    }

    /// Register a resource node in `scope`
    ///
    /// References inside `properties` are not checked here so that nodes can
    /// refer forward to nodes registered later; validation catches dangling
    /// ones.
    pub fn register(
        &mut self,
        scope: ScopeId,
        id: &str,
        resource_type: &str,
        properties: Properties,
    ) -> Result<NodeHandle> {
        check_identifier("resource type", resource_type)?;
        let logical = self.claim(scope, id)?;
        let node_id = NodeId::from(logical);

        self.scopes[scope.0]
            .children
            .insert(id.to_string(), Child::Node(node_id.clone()));
        self.nodes.insert(
            node_id.clone(),
            ResourceNode::new(
                node_id.clone(),
                id.to_string(),
                resource_type.to_string(),
                properties,
            ),
        );

        debug!("Registered {resource_type}.{node_id}");
        Ok(NodeHandle::new(node_id, resource_type.to_string()))
    }

    /// Reserve `id` in `scope` for an asset, returning its logical id
    pub(crate) fn register_asset(&mut self, scope: ScopeId, id: &str) -> Result<String> {
        let logical = self.claim(scope, id)?;
        self.scopes[scope.0]
            .children
            .insert(id.to_string(), Child::Asset(logical.clone()));
        Ok(logical)
    }

    /// Record an explicit dependency of `node` on `on`; idempotent
    pub fn add_dependency(&mut self, node: &NodeId, on: NodeId) -> Result<()> {
        let entry = self
            .nodes
            .get_mut(node)
            .ok_or_else(|| unregistered(node, on.as_str(), "*"))?;

        if entry.explicit_dependencies.insert(on.clone()) {
            trace!("{node} depends on {on}");
        }
        Ok(())
    }

    /// Record an attribute of `node` whose value is known before apply
    pub fn know(&mut self, node: &NodeId, attribute: &str, value: Json) -> Result<()> {
        let entry = self
            .nodes
            .get_mut(node)
            .ok_or_else(|| unregistered(node, node.as_str(), attribute))?;
        entry.known.insert(attribute.to_string(), value);
        Ok(())
    }

    pub fn get(&self, id: &NodeId) -> Option<&ResourceNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// All nodes in ascending logical id order
    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Human-readable path of a scope, e.g. `my-stack/api`
    pub fn path(&self, scope: ScopeId) -> String {
        let mut parts = Vec::new();
        let mut current = self.scopes.get(scope.0);
        while let Some(entry) = current {
            parts.push(entry.id.as_str());
            current = entry.parent.and_then(|parent| self.scopes.get(parent.0));
        }
        parts.reverse();
        parts.join("/")
    }

    /// Logical id a child named `id` of `scope` would get
    pub fn logical_id(&self, scope: ScopeId, id: &str) -> String {
        let mut parts = vec![id];
        let mut current = scope;
        while let Some(entry) = self.scopes.get(current.0)
            && let Some(parent) = entry.parent
        {
            parts.push(entry.id.as_str());
            current = parent;
        }
        parts.reverse();
        parts.join("_")
    }

    fn check_free(&self, scope: ScopeId, kind: &'static str, id: &str) -> Result<()> {
        let entry = self.scopes.get(scope.0).ok_or(Error::UnknownScope(scope.0))?;
        check_identifier(kind, id)?;

        if entry.children.contains_key(id) {
            return Err(Error::DuplicateId {
                scope: self.path(scope),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Logical id `id` would get in `scope`, if both are still free
    pub(crate) fn available(&self, scope: ScopeId, id: &str) -> Result<String> {
        self.check_free(scope, "id", id)?;

        let logical = self.logical_id(scope, id);
        if self.logical_ids.contains(&logical) {
            return Err(Error::DuplicateId {
                scope: self.path(scope),
                id: logical,
            });
        }
        Ok(logical)
    }

    fn claim(&mut self, scope: ScopeId, id: &str) -> Result<String> {
        let logical = self.available(scope, id)?;
        self.logical_ids.insert(logical.clone());
        Ok(logical)
    }
}

fn unregistered(node: &NodeId, target: &str, attribute: &str) -> Error {
    Error::InvalidReference {
        from: node.to_string(),
        node: target.to_string(),
        attribute: attribute.to_string(),
        reason: format!("'{node}' is not registered"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_returns_handle() {
        let mut registry = Registry::new("stack");
        let root = registry.root();
        let role = registry
            .register(root, "role", "aws_iam_role", Properties::new())
            .unwrap();

        assert_eq!(role.id().as_str(), "role");
        assert_eq!(role.address(), "aws_iam_role.role");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_id_in_same_scope_fails() {
        let mut registry = Registry::new("stack");
        let root = registry.root();
        registry
            .register(root, "bucket", "aws_s3_bucket", Properties::new())
            .unwrap();

        let err = registry
            .register(root, "bucket", "aws_s3_object", Properties::new())
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateId { ref id, .. } if id == "bucket"));
    }

    #[test]
    fn test_same_id_in_different_scopes_is_allowed() {
        let mut registry = Registry::new("stack");
        let root = registry.root();
        let api = registry.scope(root, "api").unwrap();
        let web = registry.scope(root, "web").unwrap();

        let a = registry
            .register(api, "role", "aws_iam_role", Properties::new())
            .unwrap();
        let b = registry
            .register(web, "role", "aws_iam_role", Properties::new())
            .unwrap();

        assert_eq!(a.id().as_str(), "api_role");
        assert_eq!(b.id().as_str(), "web_role");
        assert_eq!(registry.path(api), "stack/api");
    }

    #[test]
    fn test_scope_and_node_share_namespace() {
        let mut registry = Registry::new("stack");
        let root = registry.root();
        registry.scope(root, "api").unwrap();

        let err = registry
            .register(root, "api", "aws_api_gateway_rest_api", Properties::new())
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateId { .. }));
    }

    #[test]
    fn test_logical_id_collision_fails() {
        let mut registry = Registry::new("stack");
        let root = registry.root();
        let api = registry.scope(root, "api").unwrap();
        registry
            .register(api, "role", "aws_iam_role", Properties::new())
            .unwrap();

        let err = registry
            .register(root, "api_role", "aws_iam_role", Properties::new())
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateId { ref id, .. } if id == "api_role"));
    }

    #[test]
    fn test_forward_reference_is_accepted_at_registration() {
        let mut registry = Registry::new("stack");
        let root = registry.root();
        let props = Properties::new().set("role", crate::AttributeRef::new("later", "arn"));

        assert!(
            registry
                .register(root, "function", "aws_lambda_function", props)
                .is_ok()
        );
    }

    #[test]
    fn test_add_dependency_is_idempotent() {
        let mut registry = Registry::new("stack");
        let root = registry.root();
        let a = registry.register(root, "a", "null_resource", Properties::new()).unwrap();

        registry.add_dependency(a.id(), "b".into()).unwrap();
        registry.add_dependency(a.id(), "b".into()).unwrap();

        assert_eq!(registry.get(a.id()).unwrap().explicit_dependencies.len(), 1);
    }

    #[test]
    fn test_invalid_ids_are_rejected() {
        let mut registry = Registry::new("stack");
        let root = registry.root();

        assert!(matches!(
            registry.register(root, "", "aws_iam_role", Properties::new()),
            Err(Error::InvalidIdentifier { .. })
        ));
        assert!(matches!(
            registry.register(root, "ok", "", Properties::new()),
            Err(Error::InvalidIdentifier { .. })
        ));
        assert!(matches!(
            registry.scope(root, "a/b"),
            Err(Error::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn test_unknown_scope_is_rejected() {
        let mut other = Registry::new("other");
        let root = other.root();
        let nested = other.scope(root, "nested").unwrap();

        let mut registry = Registry::new("stack");
        let err = registry
            .register(nested, "x", "null_resource", Properties::new())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownScope(1)));
    }
}
