//! Deployable asset descriptors
//!
//! Packaging is left to external tooling. An asset here only fixes the
//! content hash of its source and the names derived from it, which are
//! known before apply and therefore synthesize as literals.

use crate::error::{Error, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// How the source is shipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// A single file, shipped as is
    File,
    /// A directory, shipped as a directory
    Directory,
    /// A directory zipped into `archive.zip`
    Archive,
}

/// A hashed asset source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Asset {
    id: String,
    source: PathBuf,
    kind: AssetKind,
    hash: String,
}

impl Asset {
    /// Hash `source` and build the descriptor
    pub fn new(id: impl Into<String>, source: impl Into<PathBuf>, kind: AssetKind) -> Result<Self> {
        let id = id.into();
        let source = source.into();

        let hash = hash_source(&source).map_err(|e| Error::Asset {
            id: id.clone(),
            path: source.clone(),
            source: e,
        })?;

        log::debug!("Hashed asset {id} ({}): {hash}", source.display());
        Ok(Self {
            id,
            source,
            kind,
            hash,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    /// Upper-case hex blake3 digest of the source contents
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Name of the shipped file or directory
    pub fn file_name(&self) -> String {
        match self.kind {
            AssetKind::Archive => "archive.zip".to_string(),
            AssetKind::File | AssetKind::Directory => self
                .source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "asset".to_string()),
        }
    }

    /// Path the packager stages the asset at, relative to the stack output
    pub fn staged_path(&self) -> String {
        format!("assets/{}/{}/{}", self.id, self.hash, self.file_name())
    }

    pub fn file_name_value(&self) -> Value {
        Value::from(self.file_name())
    }

    pub fn path_value(&self) -> Value {
        Value::from(self.staged_path())
    }
}

/// Hash a file, or every file under a directory in sorted path order so the
/// digest is stable across filesystems
fn hash_source(source: &Path) -> io::Result<String> {
    let mut hasher = blake3::Hasher::new();
    let metadata = fs::metadata(source)?;

    if metadata.is_file() {
        hasher.update(&fs::read(source)?);
    } else {
        for entry in WalkDir::new(source).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(source)
                .unwrap_or_else(|_| entry.path());
            let name: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();

            hasher.update(name.join("/").as_bytes());
            hasher.update(&[0]);
            hasher.update(&fs::read(entry.path())?);
            hasher.update(&[0]);
        }
    }

    Ok(hasher.finalize().to_hex().to_uppercase())
}
