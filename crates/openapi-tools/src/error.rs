//! Error types for document loading and tool compilation

use thiserror::Error;

/// Result type alias for compiler operations
pub type CompileResult<T> = std::result::Result<T, CompileError>;

/// Compiler error types
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Invalid OpenAPI spec: {0}")]
    InvalidSpec(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Unsupported OpenAPI version: {0}")]
    UnsupportedVersion(String),

    #[error("Unresolvable schema reference: {0}")]
    UnresolvableRef(String),

    #[error("Cyclic schema reference: {0}")]
    CyclicRef(String),

    #[error("Failed to fetch OpenAPI spec: {0}")]
    Fetch(String),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompileError {
    /// Whether this error means the document itself is malformed or incomplete
    pub fn is_spec_invalid(&self) -> bool {
        matches!(
            self,
            CompileError::InvalidSpec(_)
                | CompileError::MissingField(_)
                | CompileError::UnsupportedVersion(_)
                | CompileError::Yaml(_)
                | CompileError::Json(_)
        )
    }
}
