//! Routes a tool invocation to a handler or an authenticated HTTP call

use std::sync::Arc;

use openapi_tools::{path_placeholders, ContentType, EndpointMetadata, HttpMethod};
use serde_json::{Map, Value};
use token_cache::{CredentialExchange, DEFAULT_SERVICE};
use tracing::{debug, info};

use crate::client::ApiClient;
use crate::error::{DispatchError, DispatchResult};
use crate::http::{ApiRequest, RequestBody};
use crate::registry::RegisteredTool;

/// Whole normalized tool names (prefix removed) of token-issuing operations
const AUTH_TOOL_NAMES: [&str; 9] = [
    "authenticate",
    "login",
    "token",
    "authtoken",
    "gettoken",
    "accesstoken",
    "getaccesstoken",
    "oauthtoken",
    "issuetoken",
];

pub struct AuthenticatedDispatcher {
    client: Arc<ApiClient>,
    /// Exchange used when a tool is itself the token endpoint
    auth_exchange: Arc<dyn CredentialExchange>,
    auth_path: String,
    /// Tool name prefix, ignored when matching auth tool names
    name_prefix: String,
}

impl AuthenticatedDispatcher {
    pub fn new(client: Arc<ApiClient>, auth_path: impl Into<String>) -> Self {
        let auth_exchange = client.tokens().exchange_for(DEFAULT_SERVICE);
        Self {
            client,
            auth_exchange,
            auth_path: auth_path.into(),
            name_prefix: String::new(),
        }
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    /// Run a tool with the given JSON arguments (`null` means no arguments)
    pub async fn dispatch(&self, tool: &RegisteredTool, args: Value) -> DispatchResult<Value> {
        let name = &tool.definition.name;
        let args = match args {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(DispatchError::InvalidArguments(format!(
                    "arguments for {} must be an object, got {}",
                    name, other
                )))
            }
        };

        if let Some(handler) = &tool.handler {
            debug!("Invoking direct handler for {}", name);
            return handler.call(args, &self.client).await;
        }

        let endpoint = tool
            .definition
            .endpoint
            .as_ref()
            .ok_or_else(|| DispatchError::NoHandlerOrEndpoint(name.clone()))?;

        let (path, remaining) = substitute_path(&endpoint.endpoint_template, args)?;

        if self.is_auth_operation(name, endpoint, &path) {
            info!("{} targets the auth endpoint, exchanging credentials directly", name);
            return Ok(self.auth_exchange.exchange().await?);
        }

        let mut request = self.client.request(endpoint.http_method, &path);
        let (query, body) = partition_arguments(endpoint, remaining);
        request.query = query;
        request.body = build_body(endpoint, body);

        self.client.send(request).await
    }

    /// The configured auth path, or a placeholder-free POST whose whole
    /// name is a token-issuing name
    fn is_auth_operation(&self, name: &str, endpoint: &EndpointMetadata, path: &str) -> bool {
        if path == self.auth_path {
            return true;
        }
        if endpoint.http_method != HttpMethod::Post
            || !path_placeholders(&endpoint.endpoint_template).is_empty()
        {
            return false;
        }
        let normalized: String = name
            .strip_prefix(self.name_prefix.as_str())
            .unwrap_or(name)
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        AUTH_TOOL_NAMES.contains(&normalized.as_str())
    }
}

/// Replace each `{name}` with its percent-encoded argument, removing the
/// argument so it cannot also land in the query or body.
fn substitute_path(template: &str, mut args: Map<String, Value>) -> DispatchResult<(String, Map<String, Value>)> {
    let mut path = template.to_string();

    for name in path_placeholders(template) {
        let placeholder = format!("{{{}}}", name);
        if !path.contains(&placeholder) {
            continue;
        }
        let value = args
            .remove(&name)
            .ok_or_else(|| DispatchError::MissingPathParameter(name.clone()))?;
        path = path.replace(&placeholder, &urlencoding::encode(&scalar_to_string(&value)));
    }

    Ok((path, args))
}

/// Split arguments into query pairs and body fields.
///
/// GET sends everything as query. Other methods send declared query params
/// as query and declared body params as body; when no body params are
/// declared at all, every remaining argument goes to the body.
fn partition_arguments(
    endpoint: &EndpointMetadata,
    args: Map<String, Value>,
) -> (Vec<(String, String)>, Map<String, Value>) {
    let is_get = endpoint.http_method == HttpMethod::Get;
    let mut query = Vec::new();
    let mut body = Map::new();

    for (key, value) in args {
        if is_get || endpoint.query_params.contains(&key) {
            push_query(&mut query, &key, &value);
        } else if endpoint.body_params.is_empty() || endpoint.body_params.contains(&key) {
            body.insert(key, parse_json_like(value));
        } else {
            debug!("Dropping undeclared argument {}", key);
        }
    }

    (query, body)
}

fn push_query(query: &mut Vec<(String, String)>, key: &str, value: &Value) {
    match value {
        Value::Null => {}
        Value::Array(items) => {
            for item in items {
                push_query(query, key, item);
            }
        }
        other => query.push((key.to_string(), scalar_to_string(other))),
    }
}

/// Best-effort convenience: a string argument that starts with `[` or `{`
/// is sent as the structured JSON it spells. If it does not parse, the
/// original string is sent unchanged. A genuine string field whose value
/// happens to be valid JSON is therefore sent as structured data.
fn parse_json_like(value: Value) -> Value {
    match value {
        Value::String(text) => {
            let trimmed = text.trim_start();
            if trimmed.starts_with('[') || trimmed.starts_with('{') {
                match serde_json::from_str(&text) {
                    Ok(parsed) => parsed,
                    Err(_) => Value::String(text),
                }
            } else {
                Value::String(text)
            }
        }
        other => other,
    }
}

fn build_body(endpoint: &EndpointMetadata, body: Map<String, Value>) -> RequestBody {
    if body.is_empty() {
        return RequestBody::Empty;
    }

    match endpoint.effective_content_type() {
        ContentType::Json => RequestBody::Json(Value::Object(body)),
        encoding => RequestBody::Form {
            encoding,
            fields: body
                .into_iter()
                .map(|(key, value)| {
                    let text = scalar_to_string(&value);
                    (key, text)
                })
                .collect(),
        },
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
