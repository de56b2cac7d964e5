//! Synthesized configuration document
//!
//! The document serializes as Terraform-compatible JSON. Top-level sections
//! are written in a fixed order and resources are written as an array of
//! single-entry objects, so the order in the file is the emission order.

use crate::value::NodeId;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value as Json, json};

/// Version stamped into document metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// One emitted resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEntry {
    pub resource_type: String,
    pub id: NodeId,
    /// Rendered properties, including `depends_on` when present
    pub body: Map<String, Json>,
}

impl ResourceEntry {
    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.id)
    }

    pub fn depends_on(&self) -> Vec<&str> {
        self.body
            .get("depends_on")
            .and_then(Json::as_array)
            .map(|items| items.iter().filter_map(Json::as_str).collect())
            .unwrap_or_default()
    }
}

impl Serialize for ResourceEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut inner = Map::new();
        inner.insert(self.id.to_string(), Json::Object(self.body.clone()));

        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.resource_type, &inner)?;
        map.end()
    }
}

/// One rendered output
#[derive(Debug, Clone, PartialEq)]
pub struct OutputValue {
    pub name: String,
    pub value: Json,
    pub description: Option<String>,
    pub sensitive: bool,
}

impl OutputValue {
    fn body(&self) -> Json {
        let mut body = Map::new();
        body.insert("value".to_string(), self.value.clone());
        if let Some(description) = &self.description {
            body.insert("description".to_string(), json!(description));
        }
        if self.sensitive {
            body.insert("sensitive".to_string(), json!(true));
        }
        Json::Object(body)
    }
}

/// A rendered provider block
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub name: String,
    pub source: String,
    pub version: Option<String>,
    pub body: Map<String, Json>,
}

/// The plan handed to the external executor
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub stack: String,
    /// Backend kind and settings
    pub backend: Option<(String, Map<String, Json>)>,
    pub providers: Vec<ProviderConfig>,
    /// Resources in emission order
    pub resources: Vec<ResourceEntry>,
    /// Outputs in declaration order
    pub outputs: Vec<OutputValue>,
}

impl Document {
    /// Pretty JSON with a trailing newline
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }

    /// Resource addresses in emission order
    pub fn resource_order(&self) -> Vec<String> {
        self.resources.iter().map(ResourceEntry::address).collect()
    }

    pub fn resource(&self, address: &str) -> Option<&ResourceEntry> {
        self.resources.iter().find(|r| r.address() == address)
    }

    pub fn output(&self, name: &str) -> Option<&OutputValue> {
        self.outputs.iter().find(|o| o.name == name)
    }

    fn metadata(&self) -> Json {
        let mut metadata = Map::new();
        metadata.insert("stackName".to_string(), json!(self.stack));
        metadata.insert("version".to_string(), json!(VERSION));
        if let Some((kind, _)) = &self.backend {
            metadata.insert("backend".to_string(), json!(kind));
        }
        json!({ "metadata": metadata })
    }

    fn terraform_block(&self) -> Option<Json> {
        let mut block = Map::new();

        if let Some((kind, settings)) = &self.backend {
            block.insert("backend".to_string(), json!({ kind: settings }));
        }

        if !self.providers.is_empty() {
            let mut required = Map::new();
            for provider in &self.providers {
                required.entry(provider.name.clone()).or_insert_with(|| {
                    let mut entry = Map::new();
                    entry.insert("source".to_string(), json!(provider.source));
                    if let Some(version) = &provider.version {
                        entry.insert("version".to_string(), json!(version));
                    }
                    Json::Object(entry)
                });
            }
            block.insert("required_providers".to_string(), Json::Object(required));
        }

        (!block.is_empty()).then_some(Json::Object(block))
    }

    fn provider_block(&self) -> Json {
        let mut section = Map::new();
        for provider in &self.providers {
            let entry = section
                .entry(provider.name.clone())
                .or_insert_with(|| Json::Array(Vec::new()));
            if let Json::Array(items) = entry {
                items.push(Json::Object(provider.body.clone()));
            }
        }
        Json::Object(section)
    }
}

struct Resources<'a>(&'a [ResourceEntry]);

impl Serialize for Resources<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for entry in self.0 {
            seq.serialize_element(entry)?;
        }
        seq.end()
    }
}

struct Outputs<'a>(&'a [OutputValue]);

impl Serialize for Outputs<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for output in self.0 {
            map.serialize_entry(&output.name, &output.body())?;
        }
        map.end()
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("//", &self.metadata())?;

        if let Some(terraform) = self.terraform_block() {
            map.serialize_entry("terraform", &terraform)?;
        }
        if !self.providers.is_empty() {
            map.serialize_entry("provider", &self.provider_block())?;
        }
        if !self.resources.is_empty() {
            map.serialize_entry("resource", &Resources(&self.resources))?;
        }
        if !self.outputs.is_empty() {
            map.serialize_entry("output", &Outputs(&self.outputs))?;
        }

        map.end()
    }
}
