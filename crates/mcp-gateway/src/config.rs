//! Gateway configuration
//!
//! Read from an optional camelCase JSON file, then overridden field by field
//! from the command line or environment.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use openapi_tools::{CompileError, CompileOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use token_cache::{AuthError, ClientCredentials};
use tracing::debug;

use crate::error::DispatchError;
use crate::http::TransportError;

pub const DEFAULT_AUTH_PATH: &str = "/auth/token";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid URL for {field}: {message}")]
    InvalidUrl { field: &'static str, message: String },

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Load(#[from] DispatchError),

    #[error("Auth client setup failed: {0}")]
    Auth(#[from] AuthError),

    #[error("HTTP client setup failed: {0}")]
    Transport(#[from] TransportError),
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayConfig {
    pub spec_path: Option<PathBuf>,
    /// Falls back to the document's first server URL
    pub api_base_url: Option<String>,
    /// Falls back to the API base URL
    pub auth_base_url: Option<String>,
    pub auth_path: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub name_prefix: String,
    pub include_only: Vec<String>,
    pub exclude: Vec<String>,
    pub request_timeout_secs: Option<u64>,
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("spec_path", &self.spec_path)
            .field("api_base_url", &self.api_base_url)
            .field("auth_base_url", &self.auth_base_url)
            .field("auth_path", &self.auth_path)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("name_prefix", &self.name_prefix)
            .field("include_only", &self.include_only)
            .field("exclude", &self.exclude)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl GatewayConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)?;
        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Check everything that does not need the document
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.spec_path.is_none() {
            return Err(ConfigError::Missing("specPath"));
        }
        if self.client_id.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::Missing("clientId"));
        }
        if self.client_secret.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::Missing("clientSecret"));
        }
        if let Some(url) = &self.api_base_url {
            check_url("apiBaseUrl", url)?;
        }
        if let Some(url) = &self.auth_base_url {
            check_url("authBaseUrl", url)?;
        }
        Ok(())
    }

    /// API base URL, taking the document's server when none is configured
    pub fn resolve_api_base_url(&self, document_default: Option<&str>) -> Result<String, ConfigError> {
        let url = self
            .api_base_url
            .as_deref()
            .or(document_default)
            .ok_or(ConfigError::Missing("apiBaseUrl"))?;
        check_url("apiBaseUrl", url)?;
        Ok(url.to_string())
    }

    pub fn auth_path(&self) -> &str {
        self.auth_path.as_deref().unwrap_or(DEFAULT_AUTH_PATH)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions::new()
            .with_prefix(self.name_prefix.clone())
            .include_only(self.include_only.iter().cloned())
            .exclude(self.exclude.iter().cloned())
    }

    pub fn credentials(&self) -> Result<ClientCredentials, ConfigError> {
        let client_id = self.client_id.clone().ok_or(ConfigError::Missing("clientId"))?;
        let client_secret = self
            .client_secret
            .clone()
            .ok_or(ConfigError::Missing("clientSecret"))?;
        Ok(ClientCredentials::new(client_id, client_secret))
    }
}

fn check_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidUrl {
            field,
            message: format!("{} ({})", e, value),
        })
}
