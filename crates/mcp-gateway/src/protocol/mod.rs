//! MCP over JSON-RPC 2.0

mod handler;
mod types;

pub use handler::RequestHandler;
pub use types::*;
