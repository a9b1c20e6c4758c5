//! JSON-RPC envelope and the MCP payloads the gateway speaks

use openapi_tools::InputSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol revision advertised in `initialize`
pub const MCP_VERSION: &str = "2024-11-05";

/// One JSON-RPC frame: request, notification or response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpMessage {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

impl McpMessage {
    fn frame(id: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: None,
            params: None,
            result: None,
            error: None,
        }
    }

    pub fn request(id: impl Into<Value>, method: &str, params: Option<Value>) -> Self {
        Self {
            method: Some(method.to_string()),
            params,
            ..Self::frame(Some(id.into()))
        }
    }

    pub fn notification(method: &str, params: Option<Value>) -> Self {
        Self {
            method: Some(method.to_string()),
            params,
            ..Self::frame(None)
        }
    }

    pub fn response(id: Value, result: Value) -> Self {
        Self {
            result: Some(result),
            ..Self::frame(Some(id))
        }
    }

    /// `id` is `None` when the offending request could not be read
    pub fn error_response(id: Option<Value>, error: McpError) -> Self {
        Self {
            error: Some(error),
            ..Self::frame(id)
        }
    }

    pub fn is_request(&self) -> bool {
        self.method.is_some() && self.id.is_some()
    }

    pub fn is_notification(&self) -> bool {
        self.method.is_some() && self.id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl McpError {
    pub const PARSE_ERROR: i32 = -32700;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error() -> Self {
        Self::new(Self::PARSE_ERROR, "Parse error")
    }

    pub fn method_not_found() -> Self {
        Self::new(Self::METHOD_NOT_FOUND, "Method not found")
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_PARAMS, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(Self::INTERNAL_ERROR, message)
    }
}

/// Public view of a tool as listed to clients.
///
/// `extra` carries any additional public fields a direct tool declares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: InputSchema,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `tools/call` result; failures are results too, flagged with `isError`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub content: Vec<ToolContent>,
    #[serde(default, rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolCallResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_error: Some(true),
            ..Self::text(message)
        }
    }

    /// Strings pass through verbatim, anything else is pretty-printed JSON
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(text) => Self::text(text.clone()),
            other => Self::text(serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text { text: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: Value,
    pub client_info: PeerInfo,
}

/// Name and version of either side of the session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: PeerInfo,
}

/// The gateway only offers tools
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
}

impl ServerCapabilities {
    pub fn with_tools() -> Self {
        Self {
            tools: Some(ToolsCapability::default()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    /// The tool set is fixed after load, so this stays unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsListResult {
    pub tools: Vec<McpTool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_serializes_extra_fields_flat() {
        let mut extra = Map::new();
        extra.insert("category".into(), json!("inspection"));
        let tool = McpTool {
            name: "describe_api".into(),
            description: None,
            input_schema: InputSchema::default(),
            extra,
        };

        assert_eq!(
            serde_json::to_value(&tool).unwrap(),
            json!({
                "name": "describe_api",
                "inputSchema": {"type": "object", "properties": {}, "required": []},
                "category": "inspection"
            })
        );
    }

    #[test]
    fn test_call_result_wrapping() {
        let text = ToolCallResult::from_value(&json!("plain body"));
        assert!(matches!(&text.content[0], ToolContent::Text { text } if text == "plain body"));

        let structured = ToolCallResult::from_value(&json!({"a": 1}));
        assert!(matches!(&structured.content[0], ToolContent::Text { text } if text == "{\n  \"a\": 1\n}"));

        let error = serde_json::to_value(ToolCallResult::error("boom")).unwrap();
        assert_eq!(error["isError"], true);
        assert_eq!(error["content"][0]["type"], "text");
    }

    #[test]
    fn test_message_kinds() {
        assert!(McpMessage::request(1, "ping", None).is_request());
        assert!(McpMessage::notification("notifications/initialized", None).is_notification());

        let parsed: McpMessage =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":"a","method":"tools/list"}"#).unwrap();
        assert!(parsed.is_request());
        assert_eq!(parsed.id, Some(json!("a")));

        let reply = serde_json::to_value(McpMessage::error_response(None, McpError::parse_error())).unwrap();
        assert_eq!(reply, json!({"jsonrpc": "2.0", "error": {"code": -32700, "message": "Parse error"}}));
    }
}
