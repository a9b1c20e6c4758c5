//! Loading and validating OpenAPI documents

use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{CompileError, CompileResult};
use crate::types::RawOpenApiSpec;

/// A validated OpenAPI 3.x document.
///
/// Keeps the raw JSON tree for `$ref` walking alongside the typed view the
/// compiler iterates over. Read-only once constructed.
#[derive(Debug, Clone)]
pub struct OpenApiDocument {
    raw: Value,
    spec: RawOpenApiSpec,
}

impl OpenApiDocument {
    /// Parse a document from a string (auto-detects JSON/YAML)
    pub fn parse(content: &str) -> CompileResult<Self> {
        if content.trim_start().starts_with('{') {
            Self::parse_json(content)
        } else {
            Self::parse_yaml(content)
        }
    }

    /// Parse a document from JSON
    pub fn parse_json(content: &str) -> CompileResult<Self> {
        let raw: Value = serde_json::from_str(content)?;
        Self::from_value(raw)
    }

    /// Parse a document from YAML
    pub fn parse_yaml(content: &str) -> CompileResult<Self> {
        // Go through serde_yaml's own value so integer keys like `200:` survive
        let yaml: serde_yaml::Value = serde_yaml::from_str(content)?;
        let raw = serde_json::to_value(yaml)?;
        Self::from_value(raw)
    }

    /// Load a document from disk, choosing the format by extension
    pub fn from_file(path: impl AsRef<Path>) -> CompileResult<Self> {
        let path = path.as_ref();
        info!("Loading OpenAPI spec from: {}", path.display());

        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::parse_yaml(&content),
            Some("json") => Self::parse_json(&content),
            _ => Self::parse(&content),
        }
    }

    /// Fetch and parse a document from a URL
    pub async fn fetch(url: &str) -> CompileResult<Self> {
        info!("Fetching OpenAPI spec from: {}", url);

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| CompileError::Fetch(e.to_string()))?;

        let response = client
            .get(url)
            .header("Accept", "application/json, application/yaml, text/yaml")
            .send()
            .await
            .map_err(|e| CompileError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CompileError::Fetch(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let is_yaml = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("yaml"))
            .unwrap_or(false)
            || url.ends_with(".yaml")
            || url.ends_with(".yml");

        let content = response
            .text()
            .await
            .map_err(|e| CompileError::Fetch(e.to_string()))?;

        if is_yaml {
            Self::parse_yaml(&content)
        } else {
            Self::parse(&content)
        }
    }

    /// Validate a raw JSON tree and build the typed view
    pub fn from_value(raw: Value) -> CompileResult<Self> {
        Self::validate(&raw)?;
        let spec: RawOpenApiSpec = serde_json::from_value(raw.clone())
            .map_err(|e| CompileError::InvalidSpec(e.to_string()))?;

        debug!(
            "Parsed OpenAPI {} spec '{}' with {} paths",
            spec.openapi,
            spec.info.title,
            spec.paths.len()
        );

        Ok(Self { raw, spec })
    }

    fn validate(raw: &Value) -> CompileResult<()> {
        let root = raw
            .as_object()
            .ok_or_else(|| CompileError::InvalidSpec("document root must be an object".into()))?;

        let version = root
            .get("openapi")
            .ok_or_else(|| CompileError::MissingField("openapi".into()))?
            .as_str()
            .ok_or_else(|| CompileError::InvalidSpec("`openapi` must be a string".into()))?;
        if !version.starts_with("3.") {
            return Err(CompileError::UnsupportedVersion(version.to_string()));
        }

        let paths = root
            .get("paths")
            .ok_or_else(|| CompileError::MissingField("paths".into()))?
            .as_object()
            .ok_or_else(|| CompileError::InvalidSpec("`paths` must be an object".into()))?;
        if paths.is_empty() {
            return Err(CompileError::InvalidSpec(
                "`paths` must declare at least one path".into(),
            ));
        }

        Ok(())
    }

    /// The raw JSON tree, used for `$ref` resolution
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Typed view of the document
    pub fn spec(&self) -> &RawOpenApiSpec {
        &self.spec
    }

    pub fn title(&self) -> &str {
        &self.spec.info.title
    }

    pub fn version(&self) -> &str {
        &self.spec.info.version
    }

    /// First declared server URL, if any
    pub fn default_server_url(&self) -> Option<&str> {
        self.spec.servers.first().map(|s| s.url.as_str())
    }
}
