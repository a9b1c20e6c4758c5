//! Client credentials and cached bearer tokens

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;

use crate::error::{AuthError, AuthResult};
use crate::secret::SecretString;

/// Lifetime assumed when the auth endpoint omits `expires_in`
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Longer lifetimes are capped to this (one year)
pub const MAX_EXPIRES_IN_SECS: u64 = 365 * 24 * 3600;

/// Client id/secret pair sent to the auth endpoint
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret),
        }
    }

    /// JSON body of the credential-exchange request
    pub(crate) fn request_body(&self) -> ExchangeRequest<'_> {
        ExchangeRequest {
            client_id: &self.client_id,
            client_secret: self.client_secret.expose(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExchangeRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
}

/// A bearer token with its absolute expiry. Replaced wholesale on refresh.
#[derive(Debug)]
pub struct CachedCredential {
    token: SecretString,
    token_type: String,
    expires_at: Instant,
}

impl CachedCredential {
    /// Build a credential from a token response body.
    ///
    /// `access_token` wins over the legacy `token` field; a body with neither
    /// (or only empty ones) is rejected.
    pub fn from_response(body: &Value, now: Instant) -> AuthResult<Self> {
        let token = ["access_token", "token"]
            .iter()
            .find_map(|field| body.get(*field).and_then(Value::as_str))
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let token_type = body
            .get("token_type")
            .and_then(Value::as_str)
            .unwrap_or("Bearer")
            .to_string();

        let expires_in = body
            .get("expires_in")
            .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f.max(0.0) as u64)))
            .unwrap_or(DEFAULT_EXPIRES_IN_SECS)
            .min(MAX_EXPIRES_IN_SECS);
        let expires_at = now
            .checked_add(Duration::from_secs(expires_in))
            .ok_or_else(|| AuthError::InvalidResponse(format!("expires_in out of range: {}", expires_in)))?;

        Ok(Self {
            token: SecretString::new(token),
            token_type,
            expires_at,
        })
    }

    pub fn token(&self) -> &str {
        self.token.expose()
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// `now < expires_at - buffer`
    pub fn is_valid_at(&self, now: Instant, buffer: Duration) -> bool {
        match self.expires_at.checked_sub(buffer) {
            Some(deadline) => now < deadline,
            None => false,
        }
    }
}
