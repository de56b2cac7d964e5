use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Project file looked up in the current directory
pub const CONFIG_FILE: &str = "stackcraft.toml";

// ============================================================================
// Project Config Schema
// ============================================================================

/// The stackcraft project configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProjectConfig {
    /// Name of the stack to define
    pub stack: String,

    /// Directory synthesized documents are written to
    pub output: String,

    /// AWS provider settings
    pub provider: ProviderConfig,

    /// Remote state backend; omitted when the `[backend]` table is absent
    #[serde(default)]
    pub backend: Option<BackendConfig>,

    /// Lambda function settings
    pub function: FunctionConfig,

    /// HTTP gateway in front of the function; omitted when the `[api]`
    /// table is absent
    #[serde(default)]
    pub api: Option<ApiConfig>,

    /// Directory the config was loaded from; relative paths resolve here
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            stack: "cdk-terraform".to_string(),
            output: "cdktf.out".to_string(),
            provider: ProviderConfig::default(),
            backend: Some(BackendConfig::default()),
            function: FunctionConfig::default(),
            api: Some(ApiConfig::default()),
            base_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    pub region: String,
    pub allowed_account_ids: Vec<String>,
    /// Version constraint for `hashicorp/aws`
    pub version: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            allowed_account_ids: Vec::new(),
            version: None,
        }
    }
}

/// Backend kind plus its settings, e.g. `kind = "s3"`, `bucket = "..."`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    pub kind: String,
    #[serde(flatten)]
    pub settings: BTreeMap<String, toml::Value>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        let settings = [
            ("bucket", "cdk-terraform-backend"),
            ("key", "backend"),
            ("region", "us-east-1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), toml::Value::String(v.to_string())))
        .collect();

        Self {
            kind: "s3".to_string(),
            settings,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FunctionConfig {
    pub name: String,
    pub runtime: String,
    pub handler: String,
    /// Directory holding the function code, archived as an asset
    pub source: String,
    pub role_name: String,
    pub bucket_prefix: String,
    /// Key prefix of the uploaded archive
    pub key_prefix: String,
}

impl Default for FunctionConfig {
    fn default() -> Self {
        Self {
            name: "cdktf-lambda-function".to_string(),
            runtime: "nodejs20.x".to_string(),
            handler: "index.handler".to_string(),
            source: "lambda".to_string(),
            role_name: "cdk-tf-role".to_string(),
            bucket_prefix: "cdktf-bucket".to_string(),
            key_prefix: "v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub name: String,
    pub description: String,
    pub path_part: String,
    pub http_method: String,
    pub stage: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            name: "my-rest-api".to_string(),
            description: "my-rest-api".to_string(),
            path_part: "hello".to_string(),
            http_method: "GET".to_string(),
            stage: "v1".to_string(),
        }
    }
}

impl ProjectConfig {
    /// Load from `path`, or from `./stackcraft.toml` when no path is given
    ///
    /// An explicit path must exist; a missing default file yields the
    /// default configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (expand(&p.to_string_lossy()), true),
            None => (PathBuf::from(CONFIG_FILE), false),
        };

        if !path.exists() {
            if required {
                bail!("Config file not found: {}", path.display());
            }
            log::debug!("No {CONFIG_FILE} found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        let mut config = Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        config.base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Invalid TOML format")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.stack.trim().is_empty() {
            bail!("'stack' must not be empty");
        }
        if self.output.trim().is_empty() {
            bail!("'output' must not be empty");
        }
        if self.function.source.trim().is_empty() {
            bail!("'function.source' must not be empty");
        }
        if let Some(backend) = &self.backend
            && backend.kind.trim().is_empty()
        {
            bail!("'backend.kind' must not be empty");
        }
        Ok(())
    }

    /// Output directory, resolved against the config location
    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.output)
    }

    /// Function source directory, resolved against the config location
    pub fn function_source(&self) -> PathBuf {
        self.resolve(&self.function.source)
    }

    fn resolve(&self, raw: &str) -> PathBuf {
        let path = expand(raw);
        if path.is_absolute() {
            path
        } else {
            self.base_dir.join(path)
        }
    }
}

/// Expand `~` and environment variables in a path
fn expand(raw: &str) -> PathBuf {
    let expanded = shellexpand::full(raw).map_or_else(
        |_| shellexpand::tilde(raw).into_owned(),
        std::borrow::Cow::into_owned,
    );
    PathBuf::from(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_reference_stack() {
        let config = ProjectConfig::default();
        assert_eq!(config.stack, "cdk-terraform");
        assert_eq!(config.provider.region, "us-east-1");
        assert_eq!(config.function.runtime, "nodejs20.x");

        let backend = config.backend.unwrap();
        assert_eq!(backend.kind, "s3");
        assert_eq!(
            backend.settings["bucket"],
            toml::Value::String("cdk-terraform-backend".into())
        );
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
stack = "orders"
output = "out"

[provider]
region = "eu-west-1"
allowed_account_ids = ["123456789012"]
version = "~> 5.0"

[backend]
kind = "s3"
bucket = "state"
key = "orders"
region = "eu-west-1"
encrypt = true

[function]
name = "orders-fn"
source = "functions/orders"

[api]
path_part = "orders"
http_method = "POST"
"#;

        let config = ProjectConfig::parse(toml).unwrap();
        assert_eq!(config.stack, "orders");
        assert_eq!(config.provider.allowed_account_ids, vec!["123456789012"]);
        assert_eq!(config.provider.version.as_deref(), Some("~> 5.0"));

        let backend = config.backend.unwrap();
        assert_eq!(backend.settings.len(), 4);
        assert_eq!(backend.settings["encrypt"], toml::Value::Boolean(true));

        assert_eq!(config.function.name, "orders-fn");
        assert_eq!(config.function.handler, "index.handler");

        let api = config.api.unwrap();
        assert_eq!(api.path_part, "orders");
        assert_eq!(api.stage, "v1");
    }

    #[test]
    fn test_missing_tables_disable_api_and_backend() {
        let config = ProjectConfig::parse("stack = \"s\"\n[function]\nname = \"f\"\n").unwrap();
        assert!(config.api.is_none());
        assert!(config.backend.is_none());
        assert_eq!(config.function.name, "f");
        assert_eq!(config.provider.region, "us-east-1");
    }

    #[test]
    fn test_empty_stack_name_rejected() {
        assert!(ProjectConfig::parse("stack = \"\"").is_err());
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = ProjectConfig::load(Some(dir.path().join("nope.toml").as_path())).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_paths_resolve_against_config_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "output = \"build\"\n[function]\nsource = \"code\"\n").unwrap();

        let config = ProjectConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(config.output_dir(), dir.path().join("build"));
        assert_eq!(config.function_source(), dir.path().join("code"));
    }
}
