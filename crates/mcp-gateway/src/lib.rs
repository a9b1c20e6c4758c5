//! # mcp-gateway
//!
//! Serves the operations of an OpenAPI document as MCP tools.
//! Tool calls become bearer-authenticated HTTP requests against the backing
//! API, over stdio or HTTP transports.

mod bootstrap;
pub mod builtin;
mod client;
pub mod config;
mod dispatcher;
mod error;
pub mod http;
pub mod protocol;
mod registry;
mod server;
pub mod transport;

pub use bootstrap::build_registry;
pub use client::{ApiClient, RetryPolicy};
pub use config::{ConfigError, GatewayConfig};
pub use dispatcher::AuthenticatedDispatcher;
pub use error::{DispatchError, DispatchResult};
pub use http::{ApiRequest, ApiResponse, HttpClient, ReqwestClient, RequestBody, TransportError};
pub use protocol::{McpError, McpMessage, McpTool, RequestHandler};
pub use registry::{RegisteredTool, SharedDocument, ToolHandler, ToolRegistry};
pub use server::{McpServer, ServerMode};
pub use transport::{HttpTransport, StdioTransport};
