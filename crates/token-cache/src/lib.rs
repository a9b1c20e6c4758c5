//! # token-cache
//!
//! Client-credential authentication for the MCP gateway:
//! - Credential exchange against the configured auth endpoint
//! - One cached bearer token per service key, refreshed 30s before expiry
//! - Zeroize-on-drop handling of secrets and tokens

mod cache;
mod credential;
mod error;
mod exchange;
mod secret;

pub use cache::{TokenCache, DEFAULT_SERVICE, EXPIRY_BUFFER};
pub use credential::{CachedCredential, ClientCredentials, DEFAULT_EXPIRES_IN_SECS, MAX_EXPIRES_IN_SECS};
pub use error::{AuthError, AuthResult};
pub use exchange::{CredentialExchange, HttpCredentialExchange};
pub use secret::SecretString;
