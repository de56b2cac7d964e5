//! Error types for graph construction, validation and synthesis
//!
//! Every error is a logical problem in the declared graph. None of them are
//! retryable: they abort the current synthesis run and carry enough detail
//! (offending ids, the full cycle path) to fix the declaration.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building or synthesizing a stack
#[derive(Error, Debug)]
pub enum Error {
    /// An id is already taken in the scope it was registered in
    #[error("duplicate id '{id}' in scope '{scope}'")]
    DuplicateId { scope: String, id: String },

    /// An output name was declared twice in the same stack
    #[error("duplicate output name '{name}'")]
    DuplicateOutputName { name: String },

    /// A reference points at an unknown node or a malformed attribute path
    #[error("invalid reference to '{node}.{attribute}' from {from}: {reason}")]
    InvalidReference {
        from: String,
        node: String,
        attribute: String,
        reason: String,
    },

    /// A graph edge targets a node that was never registered
    #[error("'{from}' depends on '{to}', which is not registered")]
    DanglingReference { from: String, to: String },

    /// The graph contains a cycle; `path` starts and ends with the same id
    #[error("cyclic dependency: {}", .path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    /// The backend descriptor is malformed
    #[error("invalid {backend} backend: {reason}")]
    InvalidBackendConfig { backend: String, reason: String },

    /// An id or name does not match `[A-Za-z_][A-Za-z0-9_-]*`
    #[error("invalid {kind} '{value}': {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
        reason: &'static str,
    },

    /// A scope handle does not belong to this stack
    #[error("unknown scope #{0}")]
    UnknownScope(usize),

    /// Failed to hash an asset source
    #[error("asset '{id}' at {}: {source}", .path.display())]
    Asset {
        id: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize a synthesized document
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for stackgraph operations
pub type Result<T> = std::result::Result<T, Error>;

/// Check an id or name against the identifier grammar the executor accepts
pub(crate) fn check_identifier(kind: &'static str, value: &str) -> Result<()> {
    let invalid = |reason| {
        Err(Error::InvalidIdentifier {
            kind,
            value: value.to_string(),
            reason,
        })
    };

    let mut chars = value.chars();
    match chars.next() {
        None => return invalid("must not be empty"),
        Some(c) if !(c.is_ascii_alphabetic() || c == '_') => {
            return invalid("must start with a letter or underscore");
        }
        Some(_) => {}
    }

    if chars.any(|c| !(c.is_ascii_alphanumeric() || c == '_' || c == '-')) {
        return invalid("may only contain letters, digits, '_' and '-'");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_accepts_terraform_names() {
        assert!(check_identifier("id", "lambda-exec-role").is_ok());
        assert!(check_identifier("id", "_private").is_ok());
        assert!(check_identifier("id", "restApi").is_ok());
    }

    #[test]
    fn test_identifier_rejects_bad_names() {
        assert!(check_identifier("id", "").is_err());
        assert!(check_identifier("id", "1bucket").is_err());
        assert!(check_identifier("id", "a.b").is_err());
        assert!(check_identifier("id", "a b").is_err());
    }

    #[test]
    fn test_cycle_message_shows_path() {
        let err = Error::CyclicDependency {
            path: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(err.to_string(), "cyclic dependency: A -> B -> A");
    }
}
