//! Type definitions for OpenAPI documents

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP methods the compiler turns into tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Lowercase form, as used for synthesized tool names
    pub fn as_lower(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Patch => "patch",
            HttpMethod::Delete => "delete",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parameter location in HTTP request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "path" => Some(ParameterLocation::Path),
            "query" => Some(ParameterLocation::Query),
            "header" => Some(ParameterLocation::Header),
            "cookie" => Some(ParameterLocation::Cookie),
            _ => None,
        }
    }
}

/// Request body encoding recorded on a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    #[serde(rename = "application/json")]
    Json,
    #[serde(rename = "application/x-www-form-urlencoded")]
    FormUrlEncoded,
    #[serde(rename = "multipart/form-data")]
    Multipart,
}

impl ContentType {
    pub fn mime(&self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::FormUrlEncoded => "application/x-www-form-urlencoded",
            ContentType::Multipart => "multipart/form-data",
        }
    }

    /// Whether the body is sent as form fields rather than a JSON document
    pub fn is_form(&self) -> bool {
        !matches!(self, ContentType::Json)
    }
}

// --- Raw OpenAPI 3.x structures for parsing ---

/// Raw OpenAPI document structure
#[derive(Debug, Clone, Deserialize)]
pub struct RawOpenApiSpec {
    pub openapi: String,
    #[serde(default)]
    pub info: RawInfo,
    #[serde(default)]
    pub servers: Vec<RawServer>,
    #[serde(default)]
    pub paths: IndexMap<String, RawPathItem>,
    #[serde(default)]
    pub components: Option<RawComponents>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawInfo {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawServer {
    pub url: String,
    pub description: Option<String>,
}

/// One entry of `paths`. Methods outside the supported five are not read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPathItem {
    pub get: Option<RawOperation>,
    pub post: Option<RawOperation>,
    pub put: Option<RawOperation>,
    pub patch: Option<RawOperation>,
    pub delete: Option<RawOperation>,
    #[serde(default)]
    pub parameters: Vec<RawParameter>,
}

impl RawPathItem {
    /// Declared operations in method order
    pub fn operations(&self) -> impl Iterator<Item = (HttpMethod, &RawOperation)> {
        [
            (HttpMethod::Get, &self.get),
            (HttpMethod::Post, &self.post),
            (HttpMethod::Put, &self.put),
            (HttpMethod::Patch, &self.patch),
            (HttpMethod::Delete, &self.delete),
        ]
        .into_iter()
        .filter_map(|(method, op)| op.as_ref().map(|op| (method, op)))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOperation {
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub parameters: Vec<RawParameter>,
    pub request_body: Option<RawRequestBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawParameter {
    /// Parameter name (optional when $ref is used)
    #[serde(default)]
    pub name: String,
    /// Parameter location (optional when $ref is used)
    #[serde(rename = "in", default)]
    pub location: String,
    #[serde(default)]
    pub required: bool,
    pub description: Option<String>,
    pub schema: Option<Value>,
    /// Reference to a parameter in components/parameters
    #[serde(rename = "$ref")]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRequestBody {
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub content: IndexMap<String, RawMediaType>,
    /// Reference to a body in components/requestBodies
    #[serde(rename = "$ref")]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMediaType {
    pub schema: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawComponents {
    #[serde(default)]
    pub schemas: IndexMap<String, Value>,
}
