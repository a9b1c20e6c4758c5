//! Outbound HTTP requests to the backing API

use std::time::Duration;

use async_trait::async_trait;
use openapi_tools::{ContentType, HttpMethod};
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Failure below the HTTP status level
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The connection was never established, so nothing reached the server
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Other(String),
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Connect(_))
    }
}

/// Request payload
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// Form fields sent with the given form encoding
    Form {
        encoding: ContentType,
        fields: Vec<(String, String)>,
    },
}

/// A fully resolved request, replayable as-is
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub url: String,
    /// Query pairs in order; array arguments appear as repeated keys
    pub query: Vec<(String, String)>,
    pub bearer: Option<String>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            bearer: None,
            body: RequestBody::Empty,
        }
    }
}

/// Status, headers of interest and body text of a response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub reason: String,
    pub content_type: Option<String>,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.contains("json"))
            .unwrap_or(false)
    }
}

/// Sends one request, with no retry or auth policy of its own
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// reqwest-backed client. Each call builds an independent request.
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

/// Only connect failures (connect timeouts included) are retryable. A
/// timeout after the request went out may already have been applied.
fn classify_send(error: reqwest::Error) -> TransportError {
    if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), &request.url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Form {
                encoding: ContentType::Multipart,
                fields,
            } => {
                let form = fields
                    .iter()
                    .fold(reqwest::multipart::Form::new(), |form, (name, value)| {
                        form.text(name.clone(), value.clone())
                    });
                builder.multipart(form)
            }
            RequestBody::Form { fields, .. } => builder.form(fields),
        };

        debug!("{} {}", request.method, request.url);
        let response = builder.send().await.map_err(classify_send)?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Other(format!("reading response body: {}", e)))?;

        Ok(ApiResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            content_type,
            body,
        })
    }
}
