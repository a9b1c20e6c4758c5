//! Compiled tool definitions

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{ContentType, HttpMethod};

/// JSON Schema exposed for a tool's arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl Default for InputSchema {
    fn default() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: Map::new(),
            required: Vec::new(),
        }
    }
}

impl InputSchema {
    /// Add or replace a property, optionally marking it required
    pub fn insert_property(&mut self, name: &str, schema: Value, required: bool) {
        self.properties.insert(name.to_string(), schema);
        if required {
            self.mark_required(name);
        }
    }

    /// Mark a name as required; `required` is kept free of duplicates
    pub fn mark_required(&mut self, name: &str) {
        if !self.required.iter().any(|r| r == name) {
            self.required.push(name.to_string());
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "type": self.schema_type,
            "properties": self.properties,
            "required": self.required,
        })
    }
}

/// Internal dispatch metadata for an API-backed tool. Never listed publicly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointMetadata {
    /// URL path with `{param}` placeholders
    pub endpoint_template: String,
    pub http_method: HttpMethod,
    /// Explicit request encoding; `None` means JSON
    pub content_type: Option<ContentType>,
    pub path_params: Vec<String>,
    pub query_params: Vec<String>,
    pub body_params: Vec<String>,
}

impl EndpointMetadata {
    pub fn new(endpoint_template: impl Into<String>, http_method: HttpMethod) -> Self {
        Self {
            endpoint_template: endpoint_template.into(),
            http_method,
            content_type: None,
            path_params: Vec::new(),
            query_params: Vec::new(),
            body_params: Vec::new(),
        }
    }

    /// Request encoding with the JSON default applied
    pub fn effective_content_type(&self) -> ContentType {
        self.content_type.unwrap_or(ContentType::Json)
    }
}

/// A named, schema-described unit of invocable functionality
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
    /// Present for tools compiled from an OpenAPI operation
    pub endpoint: Option<EndpointMetadata>,
}

impl ToolDefinition {
    /// A tool without endpoint metadata, e.g. one served by a direct handler
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: InputSchema) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            endpoint: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: EndpointMetadata) -> Self {
        self.endpoint = Some(endpoint);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_input_schema_is_empty_object() {
        let schema = InputSchema::default();
        assert_eq!(
            schema.to_value(),
            json!({"type": "object", "properties": {}, "required": []})
        );
    }

    #[test]
    fn test_mark_required_is_idempotent() {
        let mut schema = InputSchema::default();
        schema.insert_property("id", json!({"type": "string"}), true);
        schema.mark_required("id");
        schema.insert_property("id", json!({"type": "integer"}), false);

        assert_eq!(schema.required, vec!["id".to_string()]);
        assert_eq!(schema.properties["id"]["type"], "integer");
    }

    #[test]
    fn test_effective_content_type_defaults_to_json() {
        let mut endpoint = EndpointMetadata::new("/upload", HttpMethod::Post);
        assert_eq!(endpoint.effective_content_type(), ContentType::Json);

        endpoint.content_type = Some(ContentType::Multipart);
        assert!(endpoint.effective_content_type().is_form());
    }
}
