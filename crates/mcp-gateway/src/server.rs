//! Main MCP server orchestration

use std::sync::Arc;
use tracing::info;

use crate::protocol::RequestHandler;
use crate::registry::ToolRegistry;
use crate::transport::{HttpTransport, StdioTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerMode {
    /// Newline-delimited JSON-RPC on stdin/stdout
    #[default]
    Stdio,
    Http { port: u16 },
}

pub struct McpServer {
    handler: Arc<RequestHandler>,
    mode: ServerMode,
}

impl McpServer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            handler: Arc::new(RequestHandler::new(registry)),
            mode: ServerMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: ServerMode) -> Self {
        self.mode = mode;
        self
    }

    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        match self.mode {
            ServerMode::Stdio => {
                info!("Starting MCP server in stdio mode");
                StdioTransport::new(self.handler.clone()).run().await
            }
            ServerMode::Http { port } => {
                info!("Starting MCP server in HTTP mode on port {}", port);
                HttpTransport::new(self.handler.clone(), port).run().await
            }
        }
    }
}
