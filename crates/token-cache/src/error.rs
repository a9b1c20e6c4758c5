//! Error types for token acquisition

use thiserror::Error;

/// Result type alias for authentication operations
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Authentication error types
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authentication failed with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Authentication response did not contain a token")]
    MissingToken,

    #[error("Invalid authentication response: {0}")]
    InvalidResponse(String),

    #[error("Authentication request failed: {0}")]
    Request(#[from] reqwest::Error),
}
