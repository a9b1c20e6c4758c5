//! # openapi-tools
//!
//! OpenAPI 3.x compiler for the MCP gateway.
//! Loads and validates documents, flattens `$ref`/`allOf` schemas, and emits
//! one invocable tool definition per HTTP operation.

mod compiler;
mod document;
mod error;
mod resolver;
mod tool;
mod types;

pub use compiler::{path_placeholders, CompileOptions, ToolCompiler};
pub use document::OpenApiDocument;
pub use error::{CompileError, CompileResult};
pub use resolver::{SchemaNode, SchemaResolver};
pub use tool::{EndpointMetadata, InputSchema, ToolDefinition};
pub use types::*;
