//! Error types for tool dispatch

use openapi_tools::CompileError;
use thiserror::Error;
use token_cache::AuthError;

/// Result type alias for dispatch operations
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;

/// Everything that can fail between a tool call and its result
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Tool not found: {0}")]
    UnknownTool(String),

    #[error("Tool {0} has no handler or endpoint")]
    NoHandlerOrEndpoint(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Missing path parameter: {0}")]
    MissingPathParameter(String),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Network error after {attempts} attempts: {message}")]
    TransientNetwork { attempts: u32, message: String },

    #[error("Unauthorized after re-authentication: {body}")]
    Unauthorized { body: String },

    #[error("HTTP {status} {reason}: {body}")]
    Upstream {
        status: u16,
        reason: String,
        body: String,
    },

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("Tool handler failed: {0}")]
    Handler(String),

    #[error("Failed to compile OpenAPI spec: {0}")]
    Compile(#[from] CompileError),
}
