//! Authenticated access to the backing API

use std::sync::Arc;
use std::time::Duration;

use openapi_tools::HttpMethod;
use serde_json::Value;
use token_cache::{TokenCache, DEFAULT_SERVICE};
use tracing::{error, warn};

use crate::error::{DispatchError, DispatchResult};
use crate::http::{ApiRequest, ApiResponse, HttpClient};

/// Exponential backoff for connection-level failures
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based): 1s, 2s, 4s, capped
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Handle for bearer-authenticated calls against the API base URL.
///
/// Applies the retry policy to connection failures and re-authenticates
/// exactly once when the API answers 401. Direct tool handlers receive it
/// so they can reach the API without touching the token cache themselves.
pub struct ApiClient {
    http: Arc<dyn HttpClient>,
    tokens: Arc<TokenCache>,
    base_url: String,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(http: Arc<dyn HttpClient>, tokens: Arc<TokenCache>, base_url: &str) -> Self {
        Self {
            http,
            tokens,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn tokens(&self) -> &Arc<TokenCache> {
        &self.tokens
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Start a request for a path relative to the API base URL
    pub fn request(&self, method: HttpMethod, path: &str) -> ApiRequest {
        ApiRequest::new(method, format!("{}{}", self.base_url, path))
    }

    /// Send with a bearer token, replaying once on 401, and decode the body
    pub async fn send(&self, mut request: ApiRequest) -> DispatchResult<Value> {
        request.bearer = Some(self.tokens.get_valid_token(DEFAULT_SERVICE).await?);
        let mut response = self.send_with_retry(&request).await?;

        if response.status == 401 {
            warn!("401 from {} {}, re-authenticating", request.method, request.url);
            let rejected = request.bearer.take().unwrap_or_default();
            request.bearer = Some(self.tokens.refresh_rejected(DEFAULT_SERVICE, &rejected).await?);
            response = self.send_with_retry(&request).await?;

            if response.status == 401 {
                error!("Still unauthorized after re-authentication: {}", request.url);
                return Err(DispatchError::Unauthorized {
                    body: response.body,
                });
            }
        }

        Self::decode(response)
    }

    /// Send without any auth handling, retrying connection failures only
    pub async fn send_with_retry(&self, request: &ApiRequest) -> DispatchResult<ApiResponse> {
        let mut attempt = 1;
        loop {
            match self.http.execute(request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                        attempt, self.retry.max_attempts, request.url, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    return Err(DispatchError::TransientNetwork {
                        attempts: attempt,
                        message: e.to_string(),
                    })
                }
                Err(e) => return Err(DispatchError::Transport(e.to_string())),
            }
        }
    }

    /// JSON when the response says so, raw text otherwise
    fn decode(response: ApiResponse) -> DispatchResult<Value> {
        if !response.is_success() {
            return Err(DispatchError::Upstream {
                status: response.status,
                reason: response.reason,
                body: response.body,
            });
        }

        if response.is_json() {
            if response.body.trim().is_empty() {
                return Ok(Value::Null);
            }
            return Ok(serde_json::from_str(&response.body).unwrap_or(Value::String(response.body)));
        }
        Ok(Value::String(response.body))
    }
}
