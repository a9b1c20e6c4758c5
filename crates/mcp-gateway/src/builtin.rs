//! In-process tools that inspect the loaded document

use async_trait::async_trait;
use openapi_tools::{InputSchema, ToolDefinition};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::client::ApiClient;
use crate::error::{DispatchError, DispatchResult};
use crate::registry::{RegisteredTool, SharedDocument, ToolHandler};

pub const DESCRIBE_API_TOOL: &str = "describe_api";

/// Summarizes the loaded OpenAPI document: title, version, servers, endpoints
pub struct DescribeApi {
    document: SharedDocument,
}

impl DescribeApi {
    pub fn new(document: SharedDocument) -> Self {
        Self { document }
    }

    pub fn tool(document: SharedDocument) -> RegisteredTool {
        RegisteredTool::direct(
            ToolDefinition::new(
                DESCRIBE_API_TOOL,
                "Describe the loaded API: title, version, servers and available endpoints",
                InputSchema::default(),
            ),
            Arc::new(Self::new(document)),
        )
    }
}

#[async_trait]
impl ToolHandler for DescribeApi {
    async fn call(&self, _args: Map<String, Value>, _client: &ApiClient) -> DispatchResult<Value> {
        let document = self
            .document
            .read()
            .await
            .clone()
            .ok_or_else(|| DispatchError::Handler("No OpenAPI document loaded".into()))?;
        let spec = document.spec();

        let servers: Vec<&str> = spec.servers.iter().map(|s| s.url.as_str()).collect();
        let mut endpoints = Vec::new();
        for (path, item) in &spec.paths {
            for (method, operation) in item.operations() {
                let mut endpoint = json!({
                    "method": method.as_str(),
                    "path": path,
                });
                if let Some(id) = &operation.operation_id {
                    endpoint["operationId"] = json!(id);
                }
                if let Some(summary) = &operation.summary {
                    endpoint["summary"] = json!(summary);
                }
                endpoints.push(endpoint);
            }
        }

        Ok(json!({
            "title": document.title(),
            "version": document.version(),
            "description": spec.info.description,
            "servers": servers,
            "endpoints": endpoints,
        }))
    }
}
