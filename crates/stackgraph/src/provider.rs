//! Provider configuration blocks

use crate::error::{Error, Result, check_identifier};
use crate::node::Properties;
use crate::value::Value;

/// A provider the executor must load, e.g. `aws` from `hashicorp/aws`
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderBlock {
    pub name: String,
    pub source: String,
    pub version: Option<String>,
    pub alias: Option<String>,
    pub config: Properties,
}

impl ProviderBlock {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            version: None,
            alias: None,
            config: Properties::new(),
        }
    }

    pub fn version(mut self, constraint: impl Into<String>) -> Self {
        self.version = Some(constraint.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(field, value);
        self
    }

    /// `name` or `name.alias`, the form resources use to select a provider
    pub fn reference(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{}.{}", self.name, alias),
            None => self.name.clone(),
        }
    }

    pub(crate) fn check(&self) -> Result<()> {
        check_identifier("provider name", &self.name)?;

        let segments: Vec<&str> = self.source.split('/').collect();
        if segments.len() > 3
            || segments
                .iter()
                .any(|s| s.is_empty() || s.chars().any(char::is_whitespace))
        {
            return Err(Error::InvalidIdentifier {
                kind: "provider source",
                value: self.source.clone(),
                reason: "expected [hostname/]namespace/type",
            });
        }

        if let Some(alias) = &self.alias {
            check_identifier("provider alias", alias)?;
        }
        Ok(())
    }
}
