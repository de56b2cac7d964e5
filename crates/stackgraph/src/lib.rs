//! # Stackgraph
//!
//! Dependency-aware resource graphs and deterministic plan synthesis.
//!
//! Resources are registered imperatively into scopes. A property may hold a
//! reference to an attribute of another resource that only exists once that
//! resource has been provisioned. The graph is derived from those references
//! plus explicit dependencies, validated, and emitted as a Terraform-compatible
//! JSON document whose resource order satisfies every dependency.
//!
//! ## Core Concepts
//!
//! - **Stack**: one deployable graph with its outputs, backend and providers
//! - **Value**: a literal, a deferred [`AttributeRef`], or a container of both
//! - **DependencyGraph**: edges from dependent to dependency, checked for
//!   dangling targets and cycles
//! - **Synthesizer**: Kahn-ordered emission with reference rewriting
//!
//! ## Example
//!
//! ```
//! use stackgraph::{Properties, Stack};
//!
//! let mut stack = Stack::new("demo")?;
//! let root = stack.root();
//!
//! let role = stack.register(root, "role", "aws_iam_role", Properties::new())?;
//! stack.register(
//!     root,
//!     "function",
//!     "aws_lambda_function",
//!     Properties::new().set("role", role.attr("arn")),
//! )?;
//! stack.output("roleArn", role.attr("arn"), None)?;
//!
//! let document = stack.synthesize()?;
//! assert_eq!(
//!     document.resource_order(),
//!     vec!["aws_iam_role.role", "aws_lambda_function.function"]
//! );
//! # Ok::<(), stackgraph::Error>(())
//! ```

pub mod app;
pub mod asset;
pub mod backend;
pub mod document;
mod error;
pub mod graph;
pub mod node;
pub mod output;
pub mod provider;
pub mod scope;
pub mod stack;
pub mod synth;
pub mod value;

pub use app::{App, MANIFEST_FILE, StackArtifact, Synthesis};
pub use asset::{Asset, AssetKind};
pub use backend::{BackendDescriptor, BackendKind};
pub use document::{Document, OutputValue, ProviderConfig, ResourceEntry};
pub use error::{Error, Result};
pub use graph::{DependencyGraph, Edge, EdgeKind};
pub use node::{NodeHandle, Properties, ResourceNode};
pub use output::{OutputEntry, OutputPublisher};
pub use provider::ProviderBlock;
pub use scope::{Registry, ScopeId};
pub use stack::Stack;
pub use synth::{Synthesizer, emission_order};
pub use value::{AttributeRef, NodeId, PathSegment, Value, parse_path};
