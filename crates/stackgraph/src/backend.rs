//! Remote-state backend descriptor
//!
//! The backend is never contacted here. It is only checked for structural
//! problems so a malformed descriptor fails at synthesis instead of reaching
//! the executor.

use crate::error::{Error, Result};
use crate::value::Value;
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Supported backend kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    S3,
    Gcs,
    AzureRm,
    Local,
    Http,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S3 => "s3",
            Self::Gcs => "gcs",
            Self::AzureRm => "azurerm",
            Self::Local => "local",
            Self::Http => "http",
        }
    }

    /// Settings that must be present and non-empty
    pub fn required_settings(&self) -> &'static [&'static str] {
        match self {
            Self::S3 => &["bucket", "key", "region"],
            Self::Gcs => &["bucket"],
            Self::AzureRm => &["storage_account_name", "container_name", "key"],
            Self::Local => &["path"],
            Self::Http => &["address"],
        }
    }

    /// Settings holding URLs whose scheme must be http(s)
    fn url_settings(&self) -> &'static [&'static str] {
        match self {
            Self::Http => &["address", "lock_address", "unlock_address"],
            Self::S3 => &["endpoint"],
            _ => &[],
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "s3" => Ok(Self::S3),
            "gcs" => Ok(Self::Gcs),
            "azurerm" => Ok(Self::AzureRm),
            "local" => Ok(Self::Local),
            "http" => Ok(Self::Http),
            other => Err(Error::InvalidBackendConfig {
                backend: other.to_string(),
                reason: "unsupported backend kind".to_string(),
            }),
        }
    }
}

/// Where the executor keeps state for one stack
#[derive(Debug, Clone, PartialEq)]
pub struct BackendDescriptor {
    kind: String,
    settings: BTreeMap<String, Value>,
}

impl BackendDescriptor {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            settings: BTreeMap::new(),
        }
    }

    /// S3 backend with its location and state key
    pub fn s3(bucket: &str, key: &str, region: &str) -> Self {
        Self::new("s3")
            .set("bucket", bucket)
            .set("key", key)
            .set("region", region)
    }

    pub fn local(path: &str) -> Self {
        Self::new("local").set("path", path)
    }

    pub fn set(mut self, setting: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(setting.into(), value.into());
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn settings(&self) -> &BTreeMap<String, Value> {
        &self.settings
    }

    /// Check kind, literal-only settings, required settings and URL schemes
    pub fn validate(&self) -> Result<BackendKind> {
        let kind: BackendKind = self.kind.parse()?;
        let invalid = |reason: String| Error::InvalidBackendConfig {
            backend: kind.to_string(),
            reason,
        };

        for (name, value) in &self.settings {
            if !value.is_literal() {
                return Err(invalid(format!(
                    "setting '{name}' must be a literal, backends cannot reference resources"
                )));
            }
        }

        for required in kind.required_settings() {
            match self.settings.get(*required).map(as_text) {
                None => return Err(invalid(format!("missing required setting '{required}'"))),
                Some(None) => {
                    return Err(invalid(format!("setting '{required}' must be a string")));
                }
                Some(Some(text)) if text.trim().is_empty() => {
                    return Err(invalid(format!("setting '{required}' must not be empty")));
                }
                Some(Some(_)) => {}
            }
        }

        for setting in kind.url_settings() {
            match self.settings.get(*setting).map(as_text) {
                None => {}
                Some(None) => {
                    return Err(invalid(format!("setting '{setting}' must be a string URL")));
                }
                Some(Some(url)) if !(url.starts_with("https://") || url.starts_with("http://")) => {
                    return Err(invalid(format!(
                        "setting '{setting}' must use the http or https scheme, got '{url}'"
                    )));
                }
                Some(Some(_)) => {}
            }
        }

        Ok(kind)
    }

    /// Settings as executor JSON; call after `validate`
    pub(crate) fn render(&self) -> serde_json::Map<String, Json> {
        self.settings
            .iter()
            .filter_map(|(name, value)| literal_json(value).map(|json| (name.clone(), json)))
            .collect()
    }
}

/// JSON of a reference-free value
fn literal_json(value: &Value) -> Option<Json> {
    match value {
        Value::Literal(json) => Some(json.clone()),
        Value::Deferred(_) => None,
        Value::List(items) => items
            .iter()
            .map(literal_json)
            .collect::<Option<Vec<_>>>()
            .map(Json::Array),
        Value::Map(entries) => entries
            .iter()
            .map(|(key, item)| literal_json(item).map(|json| (key.clone(), json)))
            .collect::<Option<serde_json::Map<_, _>>>()
            .map(Json::Object),
        Value::Interpolated(parts) => parts
            .iter()
            .map(|part| match literal_json(part)? {
                Json::String(text) => Some(text),
                other => Some(other.to_string()),
            })
            .collect::<Option<String>>()
            .map(Json::String),
    }
}

/// Text of a string literal; `None` for any other value
fn as_text(value: &Value) -> Option<&str> {
    match value {
        Value::Literal(Json::String(text)) => Some(text),
        _ => None,
    }
}
