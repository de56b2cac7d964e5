//! Dependency graph builder and validator
//!
//! Edges point from the dependent node to the node it depends on. They come
//! from explicit `add_dependency` calls and from every attribute reference
//! found while scanning a node's properties. Two references to the same node
//! collapse into one edge, so the edge set (and everything derived from it)
//! is independent of registration order.

use crate::error::{Error, Result};
use crate::scope::Registry;
use crate::value::{AttributeRef, NodeId};
use log::debug;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Why an edge exists; explicit wins when both apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EdgeKind {
    Explicit,
    Reference,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::Explicit => write!(f, "explicit"),
            EdgeKind::Reference => write!(f, "reference"),
        }
    }
}

/// `from` must be emitted after `to`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Nodes of a registry plus the derived edge set
#[derive(Debug)]
pub struct DependencyGraph<'a> {
    registry: &'a Registry,
    edges: BTreeMap<Edge, EdgeKind>,
    adjacency: BTreeMap<NodeId, BTreeSet<NodeId>>,
    references: Vec<(&'a NodeId, &'a AttributeRef)>,
}

impl<'a> DependencyGraph<'a> {
    /// Derive the full edge set of `registry`
    pub fn build(registry: &'a Registry) -> Self {
        let mut edges = BTreeMap::new();
        let mut adjacency: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
        let mut references = Vec::new();

        for node in registry.nodes() {
            let deps = adjacency.entry(node.id.clone()).or_default();

            for target in &node.explicit_dependencies {
                deps.insert(target.clone());
                edges.insert(
                    Edge {
                        from: node.id.clone(),
                        to: target.clone(),
                    },
                    EdgeKind::Explicit,
                );
            }

            for reference in node.properties.references() {
                references.push((&node.id, reference));
                deps.insert(reference.node().clone());
                edges
                    .entry(Edge {
                        from: node.id.clone(),
                        to: reference.node().clone(),
                    })
                    .or_insert(EdgeKind::Reference);
            }
        }

        debug!(
            "Built graph with {} nodes and {} edges",
            adjacency.len(),
            edges.len()
        );

        Self {
            registry,
            edges,
            adjacency,
            references,
        }
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// Edges in ascending `(from, to)` order
    pub fn edges(&self) -> impl Iterator<Item = (&Edge, EdgeKind)> {
        self.edges.iter().map(|(edge, kind)| (edge, *kind))
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Nodes in ascending id order
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.adjacency.keys()
    }

    /// Direct dependencies of `node`, ascending
    pub fn dependencies(&self, node: &NodeId) -> impl Iterator<Item = &NodeId> {
        self.adjacency.get(node).into_iter().flatten()
    }

    /// Check attribute paths, edge targets and acyclicity
    pub fn validate(&self) -> Result<()> {
        for (from, reference) in &self.references {
            reference.segments(from.as_str())?;
        }

        for edge in self.edges.keys() {
            if !self.adjacency.contains_key(&edge.to) {
                return Err(Error::DanglingReference {
                    from: edge.from.to_string(),
                    to: edge.to.to_string(),
                });
            }
        }

        self.check_acyclic()
    }

    /// Three-colour depth-first search; unvisited nodes are simply absent
    /// from `marks`
    fn check_acyclic(&self) -> Result<()> {
        let mut marks = HashMap::with_capacity(self.adjacency.len());

        for node in self.adjacency.keys() {
            if !marks.contains_key(node) {
                self.visit(node, &mut marks)?;
            }
        }
        Ok(())
    }

    /// Iterative walk from `root`; `frames` holds the current path, each
    /// node paired with its not yet visited dependencies
    fn visit<'g>(
        &'g self,
        root: &'g NodeId,
        marks: &mut HashMap<&'g NodeId, Mark>,
    ) -> Result<()> {
        marks.insert(root, Mark::InProgress);
        let mut frames = vec![(root, self.dependencies(root))];

        while let Some((node, pending)) = frames.last_mut() {
            let node: &'g NodeId = *node;
            let Some(next) = pending.next() else {
                marks.insert(node, Mark::Done);
                frames.pop();
                continue;
            };

            match marks.get(next) {
                Some(Mark::InProgress) => {
                    let start = frames.iter().position(|(n, _)| *n == next).unwrap_or(0);
                    let mut path: Vec<String> =
                        frames[start..].iter().map(|(n, _)| n.to_string()).collect();
                    path.push(next.to_string());
                    return Err(Error::CyclicDependency { path });
                }
                Some(Mark::Done) => {}
                None => {
                    marks.insert(next, Mark::InProgress);
                    frames.push((next, self.dependencies(next)));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Properties;
    use crate::value::Value;
    use proptest::prelude::*;

    fn registry_with(nodes: &[(&str, &[&str], &[&str])]) -> Registry {
        let mut registry = Registry::new("stack");
        let root = registry.root();
        for (id, explicit, refs) in nodes {
            let props: Properties = refs
                .iter()
                .enumerate()
                .map(|(i, target)| {
                    let (node, path) = target.split_once('.').unwrap();
                    (format!("field{i}"), Value::from(AttributeRef::new(node, path)))
                })
                .collect();
            let handle = registry.register(root, id, "null_resource", props).unwrap();
            for dep in *explicit {
                registry.add_dependency(handle.id(), (*dep).into()).unwrap();
            }
        }
        registry
    }

    fn edge_pairs(graph: &DependencyGraph<'_>) -> Vec<(String, String)> {
        graph
            .edges()
            .map(|(e, _)| (e.from.to_string(), e.to.to_string()))
            .collect()
    }

    #[test]
    fn test_build_merges_explicit_and_reference_edges() {
        let registry = registry_with(&[
            ("archive", &["bucket"], &["bucket.bucket"]),
            ("bucket", &[], &[]),
            ("function", &[], &["role.arn", "archive.key", "role.name"]),
            ("role", &[], &[]),
        ]);
        let graph = DependencyGraph::build(&registry);

        assert_eq!(
            edge_pairs(&graph),
            vec![
                ("archive".into(), "bucket".into()),
                ("function".into(), "archive".into()),
                ("function".into(), "role".into()),
            ]
        );
        let kinds: Vec<EdgeKind> = graph.edges().map(|(_, k)| k).collect();
        assert_eq!(
            kinds,
            vec![EdgeKind::Explicit, EdgeKind::Reference, EdgeKind::Reference]
        );
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_edge_order_independent_of_registration_order() {
        let a = registry_with(&[
            ("x", &["z"], &["y.id"]),
            ("y", &[], &["z.id"]),
            ("z", &[], &[]),
        ]);
        let b = registry_with(&[
            ("z", &[], &[]),
            ("y", &[], &["z.id"]),
            ("x", &["z"], &["y.id"]),
        ]);

        assert_eq!(
            edge_pairs(&DependencyGraph::build(&a)),
            edge_pairs(&DependencyGraph::build(&b))
        );
    }

    #[test]
    fn test_two_node_cycle_reports_full_path() {
        let registry = registry_with(&[("A", &["B"], &[]), ("B", &["A"], &[])]);
        let err = DependencyGraph::build(&registry).validate().unwrap_err();

        match err {
            Error::CyclicDependency { path } => assert_eq!(path, vec!["A", "B", "A"]),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_longer_cycle_path_returns_to_start() {
        let registry = registry_with(&[
            ("a", &[], &["b.id"]),
            ("b", &[], &["c.id"]),
            ("c", &[], &["d.id"]),
            ("d", &[], &["b.id"]),
        ]);
        let err = DependencyGraph::build(&registry).validate().unwrap_err();

        match err {
            Error::CyclicDependency { path } => {
                assert_eq!(path, vec!["b", "c", "d", "b"]);
                assert_eq!(path.first(), path.last());
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let registry = registry_with(&[("solo", &[], &["solo.arn"])]);
        let err = DependencyGraph::build(&registry).validate().unwrap_err();
        assert!(matches!(err, Error::CyclicDependency { ref path } if path == &["solo", "solo"]));
    }

    #[test]
    fn test_dangling_reference_detected() {
        let registry = registry_with(&[("function", &[], &["ghost.arn"])]);
        let err = DependencyGraph::build(&registry).validate().unwrap_err();
        assert!(matches!(
            err,
            Error::DanglingReference { ref from, ref to } if from == "function" && to == "ghost"
        ));
    }

    #[test]
    fn test_dangling_explicit_dependency_detected() {
        let registry = registry_with(&[("stage", &["deployment"], &[])]);
        let err = DependencyGraph::build(&registry).validate().unwrap_err();
        assert!(matches!(err, Error::DanglingReference { .. }));
    }

    #[test]
    fn test_malformed_attribute_path_is_invalid_reference() {
        let mut registry = Registry::new("stack");
        let root = registry.root();
        registry
            .register(root, "role", "aws_iam_role", Properties::new())
            .unwrap();
        registry
            .register(
                root,
                "fn",
                "aws_lambda_function",
                Properties::new().set("role", AttributeRef::new("role", "arn[")),
            )
            .unwrap();

        let err = DependencyGraph::build(&registry).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidReference { ref from, .. } if from == "fn"));
    }

    #[test]
    fn test_dependencies_accessor() {
        let registry = registry_with(&[
            ("a", &["c"], &["b.id"]),
            ("b", &[], &[]),
            ("c", &[], &[]),
        ]);
        let graph = DependencyGraph::build(&registry);
        let deps: Vec<&str> = graph
            .dependencies(&NodeId::from("a"))
            .map(NodeId::as_str)
            .collect();
        assert_eq!(deps, vec!["b", "c"]);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_deep_chain_validates() {
        const DEPTH: usize = 100_000;
        let mut registry = Registry::new("stack");
        let root = registry.root();
        for i in 0..DEPTH {
            let props = if i + 1 < DEPTH {
                Properties::new().set("next", AttributeRef::new(format!("n{}", i + 1), "id"))
            } else {
                Properties::new()
            };
            registry
                .register(root, &format!("n{i}"), "null_resource", props)
                .unwrap();
        }

        let graph = DependencyGraph::build(&registry);
        assert_eq!(graph.edge_count(), DEPTH - 1);
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_deep_chain_closed_into_cycle() {
        const DEPTH: usize = 100_000;
        let mut registry = Registry::new("stack");
        let root = registry.root();
        for i in 0..DEPTH {
            let next = format!("n{}", (i + 1) % DEPTH);
            registry
                .register(
                    root,
                    &format!("n{i}"),
                    "null_resource",
                    Properties::new().set("next", AttributeRef::new(next, "id")),
                )
                .unwrap();
        }

        match DependencyGraph::build(&registry).validate().unwrap_err() {
            Error::CyclicDependency { path } => {
                assert_eq!(path.len(), DEPTH + 1);
                assert_eq!(path.first(), path.last());
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    const NODES: usize = 8;

    /// Nodes `n0..n{NODES}`; even-indexed edges become references, odd ones
    /// explicit dependencies
    fn registry_from_edges(edges: &[(usize, usize)]) -> Registry {
        let mut registry = Registry::new("stack");
        let root = registry.root();
        let mut handles = Vec::with_capacity(NODES);
        for i in 0..NODES {
            let props: Properties = edges
                .iter()
                .enumerate()
                .filter(|(k, (from, _))| *from == i && k % 2 == 0)
                .map(|(k, (_, to))| {
                    (format!("field{k}"), Value::from(AttributeRef::new(format!("n{to}"), "id")))
                })
                .collect();
            handles.push(
                registry
                    .register(root, &format!("n{i}"), "null_resource", props)
                    .unwrap(),
            );
        }
        for (k, (from, to)) in edges.iter().enumerate() {
            if k % 2 == 1 {
                registry
                    .add_dependency(handles[*from].id(), format!("n{to}").into())
                    .unwrap();
            }
        }
        registry
    }

    fn has_edge(graph: &DependencyGraph<'_>, from: &str, to: &str) -> bool {
        graph
            .edges()
            .any(|(e, _)| e.from.as_str() == from && e.to.as_str() == to)
    }

    fn any_edges() -> impl Strategy<Value = Vec<(usize, usize)>> {
        prop::collection::vec((0..NODES, 0..NODES), 0..24)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Edges that only point at lower-numbered nodes never form a cycle
        #[test]
        fn forward_only_edges_validate(edges in any_edges()) {
            let edges: Vec<(usize, usize)> = edges
                .into_iter()
                .filter(|(from, to)| from > to)
                .collect();
            let registry = registry_from_edges(&edges);
            prop_assert!(DependencyGraph::build(&registry).validate().is_ok());
        }

        /// Any reported cycle is a closed walk along real edges
        #[test]
        fn reported_cycles_follow_edges(
            edges in any_edges(),
            ring in prop::collection::btree_set(0..NODES, 1..5),
        ) {
            let ring: Vec<usize> = ring.into_iter().collect();
            let mut edges = edges;
            for (k, from) in ring.iter().enumerate() {
                edges.push((*from, ring[(k + 1) % ring.len()]));
            }

            let registry = registry_from_edges(&edges);
            let graph = DependencyGraph::build(&registry);
            match graph.validate() {
                Err(Error::CyclicDependency { path }) => {
                    prop_assert!(path.len() >= 2);
                    prop_assert_eq!(path.first(), path.last());
                    for pair in path.windows(2) {
                        prop_assert!(
                            has_edge(&graph, &pair[0], &pair[1]),
                            "{} -> {} is not an edge", pair[0], pair[1]
                        );
                    }
                }
                other => prop_assert!(false, "expected cycle, got {:?}", other),
            }
        }
    }
}
