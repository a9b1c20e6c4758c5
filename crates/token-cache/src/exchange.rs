//! Credential exchange against the auth endpoint

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::credential::ClientCredentials;
use crate::error::{AuthError, AuthResult};

/// Exchanges client credentials for a token response body
#[async_trait]
pub trait CredentialExchange: Send + Sync {
    /// Issue one credential-exchange request and return the decoded JSON body.
    ///
    /// Non-success statuses are errors. Implementations never retry.
    async fn exchange(&self) -> AuthResult<Value>;
}

/// `POST {auth_base_url}{auth_path}` with a `{clientId, clientSecret}` JSON body
pub struct HttpCredentialExchange {
    client: Client,
    url: String,
    credentials: ClientCredentials,
}

impl HttpCredentialExchange {
    pub fn new(auth_base_url: &str, auth_path: &str, credentials: ClientCredentials) -> AuthResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self::with_client(client, auth_base_url, auth_path, credentials))
    }

    pub fn with_client(
        client: Client,
        auth_base_url: &str,
        auth_path: &str,
        credentials: ClientCredentials,
    ) -> Self {
        Self {
            client,
            url: format!("{}{}", auth_base_url.trim_end_matches('/'), auth_path),
            credentials,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CredentialExchange for HttpCredentialExchange {
    async fn exchange(&self) -> AuthResult<Value> {
        debug!("Requesting token from {}", self.url);

        let response = self
            .client
            .post(&self.url)
            .json(&self.credentials.request_body())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("Token request failed with status {}", status);
            return Err(AuthError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| AuthError::InvalidResponse(e.to_string()))
    }
}
