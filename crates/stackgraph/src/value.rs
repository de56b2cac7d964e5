//! Property values and attribute references
//!
//! A [`Value`] is either a literal known at construction time or a
//! [`Value::Deferred`] reference to an attribute another node will only
//! produce once it exists. Containers and string templates may nest
//! references at any depth; the graph builder finds them by walking the tree.

use crate::error::{Error, Result};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a resource node within one stack (its logical id)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&String> for NodeId {
    fn from(id: &String) -> Self {
        Self(id.clone())
    }
}

/// One step of an attribute path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// `name`
    Field(String),
    /// `[3]`
    Index(usize),
}

/// Parse a dotted/indexed attribute path such as `bucket.name` or `tags[0]`
pub fn parse_path(raw: &str) -> std::result::Result<Vec<PathSegment>, &'static str> {
    if raw.is_empty() {
        return Err("attribute path is empty");
    }

    let mut segments = Vec::new();
    let mut rest = raw;
    let mut expect_field = true;

    loop {
        if expect_field {
            let end = rest.find(['.', '[']).unwrap_or(rest.len());
            let field = &rest[..end];
            if field.is_empty() {
                return Err("empty attribute name");
            }
            if !field
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err("attribute names may only contain letters, digits and '_'");
            }
            segments.push(PathSegment::Field(field.to_string()));
            rest = &rest[end..];
        }

        match rest.chars().next() {
            None => break,
            Some('.') => {
                rest = &rest[1..];
                expect_field = true;
            }
            Some('[') => {
                let close = rest.find(']').ok_or("unclosed '['")?;
                let index = rest[1..close]
                    .parse::<usize>()
                    .map_err(|_| "index must be a non-negative integer")?;
                segments.push(PathSegment::Index(index));
                rest = &rest[close + 1..];
                expect_field = false;
            }
            Some(_) => return Err("expected '.' or '[' after an index"),
        }
    }

    Ok(segments)
}

/// A handle to an attribute of another node, resolved during synthesis
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttributeRef {
    node: NodeId,
    path: String,
}

impl AttributeRef {
    /// Reference `path` on `node`. The node may be registered later; the
    /// reference is checked when the graph is validated.
    pub fn new(node: impl Into<NodeId>, path: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            path: path.into(),
        }
    }

    pub fn node(&self) -> &NodeId {
        &self.node
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// First path segment, used to look up attributes known at synthesis
    pub fn root_attribute(&self) -> &str {
        let end = self.path.find(['.', '[']).unwrap_or(self.path.len());
        &self.path[..end]
    }

    /// Parse the attribute path, reporting failures against `from`
    pub(crate) fn segments(&self, from: &str) -> Result<Vec<PathSegment>> {
        parse_path(&self.path).map_err(|reason| Error::InvalidReference {
            from: from.to_string(),
            node: self.node.to_string(),
            attribute: self.path.clone(),
            reason: reason.to_string(),
        })
    }
}

impl fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.path)
    }
}

/// A property value: literal, deferred reference, or a container of either
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Known at construction time
    Literal(Json),
    /// Known only once the referenced node exists
    Deferred(AttributeRef),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// String template; parts are concatenated, references become
    /// `${...}` segments
    Interpolated(Vec<Value>),
}

impl Value {
    pub fn null() -> Self {
        Self::Literal(Json::Null)
    }

    /// Build a string template from literal and deferred parts
    pub fn interpolate<I, V>(parts: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Interpolated(parts.into_iter().map(Into::into).collect())
    }

    /// Encode a JSON document as a string literal (e.g. an IAM policy)
    pub fn json_string(document: &Json) -> Result<Self> {
        Ok(Self::Literal(Json::String(serde_json::to_string(document)?)))
    }

    /// Call `visit` for every reference in this value, depth-first
    pub fn visit_references<'a>(&'a self, visit: &mut impl FnMut(&'a AttributeRef)) {
        match self {
            Self::Literal(_) => {}
            Self::Deferred(reference) => visit(reference),
            Self::List(items) | Self::Interpolated(items) => {
                for item in items {
                    item.visit_references(visit);
                }
            }
            Self::Map(entries) => {
                for item in entries.values() {
                    item.visit_references(visit);
                }
            }
        }
    }

    /// All references in this value, depth-first
    pub fn references(&self) -> Vec<&AttributeRef> {
        let mut found = Vec::new();
        self.visit_references(&mut |r| found.push(r));
        found
    }

    /// True if the value contains no references
    pub fn is_literal(&self) -> bool {
        self.references().is_empty()
    }
}

impl From<Json> for Value {
    fn from(value: Json) -> Self {
        Self::Literal(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Literal(Json::String(value.to_string()))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Literal(Json::String(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Literal(Json::Bool(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Literal(Json::from(value))
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self::Literal(Json::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Literal(Json::from(value))
    }
}

impl From<AttributeRef> for Value {
    fn from(reference: AttributeRef) -> Self {
        Self::Deferred(reference)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Self::Map(entries)
    }
}

/// How a reference resolved during synthesis
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Resolved {
    /// Value known at synthesis time
    Literal(Json),
    /// Executor expression without the surrounding `${}`
    Expression(String),
}

/// Escape template markers so the executor treats literal text verbatim
pub(crate) fn escape_template(text: &str) -> String {
    text.replace("${", "$${").replace("%{", "%%{")
}

fn escape_json(value: &Json) -> Json {
    match value {
        Json::String(s) => Json::String(escape_template(s)),
        Json::Array(items) => Json::Array(items.iter().map(escape_json).collect()),
        Json::Object(entries) => Json::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), escape_json(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Text of a literal when spliced into a string template
fn template_text(value: &Json) -> String {
    match value {
        Json::Null => String::new(),
        Json::String(s) => escape_template(s),
        Json::Bool(_) | Json::Number(_) => value.to_string(),
        Json::Array(_) | Json::Object(_) => escape_template(&value.to_string()),
    }
}

/// Render a value into the executor's JSON, rewriting references through
/// `resolve`
pub(crate) fn render(
    value: &Value,
    resolve: &mut impl FnMut(&AttributeRef) -> Result<Resolved>,
) -> Result<Json> {
    Ok(match value {
        Value::Literal(json) => escape_json(json),
        Value::Deferred(reference) => match resolve(reference)? {
            Resolved::Literal(json) => escape_json(&json),
            Resolved::Expression(expr) => Json::String(format!("${{{expr}}}")),
        },
        Value::List(items) => Json::Array(
            items
                .iter()
                .map(|item| render(item, resolve))
                .collect::<Result<_>>()?,
        ),
        Value::Map(entries) => {
            let mut object = serde_json::Map::new();
            for (key, item) in entries {
                object.insert(key.clone(), render(item, resolve)?);
            }
            Json::Object(object)
        }
        Value::Interpolated(parts) => {
            let mut text = String::new();
            for part in parts {
                match part {
                    Value::Deferred(reference) => match resolve(reference)? {
                        Resolved::Literal(json) => text.push_str(&template_text(&json)),
                        Resolved::Expression(expr) => {
                            text.push_str("${");
                            text.push_str(&expr);
                            text.push('}');
                        }
                    },
                    Value::Literal(json) => text.push_str(&template_text(json)),
                    nested => match render(nested, resolve)? {
                        Json::String(s) => text.push_str(&s),
                        other => text.push_str(&other.to_string()),
                    },
                }
            }
            Json::String(text)
        }
    })
}
