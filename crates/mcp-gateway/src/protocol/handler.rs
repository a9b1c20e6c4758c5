//! MCP request handler

use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

use super::types::*;
use crate::registry::ToolRegistry;

/// Handler for MCP requests
pub struct RequestHandler {
    registry: Arc<ToolRegistry>,
    server_name: String,
    server_version: String,
    initialized: AtomicBool,
}

impl RequestHandler {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            server_name: "OpenAPI MCP Gateway".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Handle an incoming message; notifications and stray responses yield `None`
    pub async fn handle(&self, message: McpMessage) -> Option<McpMessage> {
        match (message.method.as_deref(), message.id.clone()) {
            (Some(method), Some(id)) => {
                debug!("Handling request: {}", method);

                let result = match method {
                    "initialize" => self.handle_initialize(message.params),
                    "ping" => Ok(serde_json::json!({})),
                    "tools/list" => self.handle_tools_list().await,
                    "tools/call" => self.handle_tools_call(message.params).await,
                    _ => Err(McpError::method_not_found()),
                };

                Some(match result {
                    Ok(result) => McpMessage::response(id, result),
                    Err(error) => McpMessage::error_response(Some(id), error),
                })
            }
            (Some(method), None) => {
                match method {
                    "notifications/initialized" | "initialized" => info!("Client initialized"),
                    "notifications/cancelled" => debug!("Request cancelled"),
                    _ => debug!("Unknown notification: {}", method),
                }
                None
            }
            (None, _) => {
                debug!("Received unexpected response");
                None
            }
        }
    }

    fn handle_initialize(&self, params: Option<Value>) -> Result<Value, McpError> {
        let params: InitializeParams = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| McpError::invalid_params(e.to_string()))?
            .ok_or_else(|| McpError::invalid_params("Missing params"))?;

        info!(
            "Initializing session with client: {} v{}",
            params.client_info.name, params.client_info.version
        );
        self.initialized.store(true, Ordering::SeqCst);

        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: ServerCapabilities::with_tools(),
            server_info: PeerInfo {
                name: self.server_name.clone(),
                version: self.server_version.clone(),
            },
        };

        serde_json::to_value(result).map_err(|e| McpError::internal_error(e.to_string()))
    }

    async fn handle_tools_list(&self) -> Result<Value, McpError> {
        let result = ToolsListResult {
            tools: self.registry.list().await,
        };
        serde_json::to_value(result).map_err(|e| McpError::internal_error(e.to_string()))
    }

    /// Invocation failures become `isError` results, never protocol errors
    async fn handle_tools_call(&self, params: Option<Value>) -> Result<Value, McpError> {
        let params: ToolCallParams = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| McpError::invalid_params(e.to_string()))?
            .ok_or_else(|| McpError::invalid_params("Missing params"))?;

        debug!("Calling tool: {}", params.name);

        let result = match self
            .registry
            .invoke(&params.name, params.arguments.unwrap_or(Value::Null))
            .await
        {
            Ok(value) => ToolCallResult::from_value(&value),
            Err(e) => {
                error!("Tool {} failed: {}", params.name, e);
                ToolCallResult::error(e.to_string())
            }
        };

        serde_json::to_value(result).map_err(|e| McpError::internal_error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiClient;
    use crate::dispatcher::AuthenticatedDispatcher;
    use crate::error::DispatchResult;
    use crate::http::{ApiRequest, ApiResponse, HttpClient, TransportError};
    use crate::registry::{RegisteredTool, ToolHandler};
    use async_trait::async_trait;
    use openapi_tools::{InputSchema, ToolDefinition};
    use serde_json::{json, Map};
    use token_cache::{AuthResult, CredentialExchange, TokenCache};

    struct StaticExchange;

    #[async_trait]
    impl CredentialExchange for StaticExchange {
        async fn exchange(&self) -> AuthResult<Value> {
            Ok(json!({"access_token": "tok"}))
        }
    }

    struct NotFoundHttp;

    #[async_trait]
    impl HttpClient for NotFoundHttp {
        async fn execute(&self, _request: &ApiRequest) -> Result<ApiResponse, TransportError> {
            Ok(ApiResponse {
                status: 404,
                reason: "Not Found".into(),
                content_type: None,
                body: "gone".into(),
            })
        }
    }

    struct Answer;

    #[async_trait]
    impl ToolHandler for Answer {
        async fn call(&self, args: Map<String, Value>, _client: &ApiClient) -> DispatchResult<Value> {
            Ok(json!({"echo": args}))
        }
    }

    async fn handler() -> RequestHandler {
        let tokens = Arc::new(TokenCache::new(Arc::new(StaticExchange)));
        let client = Arc::new(ApiClient::new(Arc::new(NotFoundHttp), tokens, "https://api.test"));
        let registry = Arc::new(ToolRegistry::new(AuthenticatedDispatcher::new(client, "/auth/token")));

        registry
            .register(RegisteredTool::direct(
                ToolDefinition::new("answer", "Echo", InputSchema::default()),
                Arc::new(Answer),
            ))
            .await;
        registry
            .register(RegisteredTool::api(
                ToolDefinition::new("gone", "", InputSchema::default()).with_endpoint(
                    openapi_tools::EndpointMetadata::new("/gone", openapi_tools::HttpMethod::Get),
                ),
            ))
            .await;

        RequestHandler::new(registry)
    }

    async fn call(handler: &RequestHandler, method: &str, params: Option<Value>) -> McpMessage {
        handler
            .handle(McpMessage::request(1, method, params))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_initialize() {
        let handler = handler().await;
        let response = call(
            &handler,
            "initialize",
            Some(json!({
                "protocolVersion": MCP_VERSION,
                "capabilities": {},
                "clientInfo": {"name": "test", "version": "1.0"}
            })),
        )
        .await;

        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], MCP_VERSION);
        assert!(result["capabilities"]["tools"].is_object());
        assert!(handler.is_initialized());
    }

    #[tokio::test]
    async fn test_tools_list() {
        let handler = handler().await;
        let result = call(&handler, "tools/list", None).await.result.unwrap();

        let names: Vec<_> = result["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["answer", "gone"]);
        assert!(result["tools"][1].get("endpoint").is_none());
    }

    #[tokio::test]
    async fn test_tools_call_success_is_pretty_json() {
        let handler = handler().await;
        let result = call(
            &handler,
            "tools/call",
            Some(json!({"name": "answer", "arguments": {"x": 1}})),
        )
        .await
        .result
        .unwrap();

        assert!(result.get("isError").is_none());
        let text = result["content"][0]["text"].as_str().unwrap();
        assert_eq!(serde_json::from_str::<Value>(text).unwrap(), json!({"echo": {"x": 1}}));
    }

    #[tokio::test]
    async fn test_tool_failures_are_error_results() {
        let handler = handler().await;

        let upstream = call(&handler, "tools/call", Some(json!({"name": "gone"})))
            .await
            .result
            .unwrap();
        assert_eq!(upstream["isError"], true);
        assert_eq!(upstream["content"][0]["text"], "HTTP 404 Not Found: gone");

        let unknown = call(&handler, "tools/call", Some(json!({"name": "nope"})))
            .await
            .result
            .unwrap();
        assert_eq!(unknown["isError"], true);
        assert_eq!(unknown["content"][0]["text"], "Tool not found: nope");
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let handler = handler().await;

        let unknown = call(&handler, "resources/list", None).await;
        assert_eq!(unknown.error.unwrap().code, -32601);

        let missing = call(&handler, "tools/call", None).await;
        assert_eq!(missing.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn test_notifications_get_no_reply() {
        let handler = handler().await;
        let reply = handler
            .handle(McpMessage::notification("notifications/initialized", None))
            .await;
        assert!(reply.is_none());
    }
}
