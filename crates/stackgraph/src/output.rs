//! Named outputs published after apply

use crate::error::{Error, Result, check_identifier};
use crate::value::Value;

/// One published value
#[derive(Debug, Clone, PartialEq)]
pub struct OutputEntry {
    pub name: String,
    pub value: Value,
    pub description: Option<String>,
    pub sensitive: bool,
}

impl OutputEntry {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            description: None,
            sensitive: false,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Ask the executor to redact the value in its own output
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// Outputs of one stack, in declaration order
#[derive(Debug, Clone, Default)]
pub struct OutputPublisher {
    entries: Vec<OutputEntry>,
}

impl OutputPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name`; references are checked at synthesis
    pub fn declare(
        &mut self,
        name: &str,
        value: impl Into<Value>,
        description: Option<&str>,
    ) -> Result<()> {
        let mut entry = OutputEntry::new(name, value);
        entry.description = description.map(str::to_string);
        self.declare_entry(entry)
    }

    pub fn declare_entry(&mut self, entry: OutputEntry) -> Result<()> {
        check_identifier("output name", &entry.name)?;

        if self.get(&entry.name).is_some() {
            return Err(Error::DuplicateOutputName { name: entry.name });
        }

        self.entries.push(entry);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&OutputEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn entries(&self) -> &[OutputEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AttributeRef;

    #[test]
    fn test_declare_preserves_order() {
        let mut outputs = OutputPublisher::new();
        outputs
            .declare("zeta", AttributeRef::new("a", "id"), None)
            .unwrap();
        outputs
            .declare("alpha", AttributeRef::new("b", "id"), Some("first"))
            .unwrap();

        let names: Vec<&str> = outputs.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(
            outputs.get("alpha").unwrap().description.as_deref(),
            Some("first")
        );
    }

    #[test]
    fn test_duplicate_name_fails() {
        let mut outputs = OutputPublisher::new();
        outputs.declare("apiUrl", "x", None).unwrap();

        let err = outputs.declare("apiUrl", "y", None).unwrap_err();
        assert!(matches!(err, Error::DuplicateOutputName { ref name } if name == "apiUrl"));
        assert_eq!(outputs.len(), 1);
    }

    #[test]
    fn test_invalid_name_fails() {
        let mut outputs = OutputPublisher::new();
        assert!(outputs.declare("api url", "x", None).is_err());
    }

    #[test]
    fn test_sensitive_entry() {
        let mut outputs = OutputPublisher::new();
        outputs
            .declare_entry(OutputEntry::new("secret", "s").sensitive())
            .unwrap();
        assert!(outputs.get("secret").unwrap().sensitive);
    }
}
