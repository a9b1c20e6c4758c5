//! Newline-delimited JSON-RPC over stdin/stdout

use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use crate::protocol::{McpError, McpMessage, RequestHandler};

pub struct StdioTransport {
    handler: Arc<RequestHandler>,
}

impl StdioTransport {
    pub fn new(handler: Arc<RequestHandler>) -> Self {
        Self { handler }
    }

    /// Serve stdin until EOF
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Starting MCP server on stdio");
        let reader = BufReader::new(tokio::io::stdin());
        self.serve(reader, tokio::io::stdout()).await
    }

    /// Serve any line-oriented stream pair
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<(), Box<dyn std::error::Error>>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = String::new();

        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                info!("EOF received, shutting down");
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            debug!("Received: {}", trimmed);

            let response = match serde_json::from_str::<McpMessage>(trimmed) {
                Ok(message) => self.handler.handle(message).await,
                Err(e) => {
                    error!("Failed to parse message: {}", e);
                    Some(McpMessage::error_response(None, McpError::parse_error()))
                }
            };

            if let Some(response) = response {
                let response_line = serde_json::to_string(&response)?;
                debug!("Sending: {}", response_line);
                writer.write_all(response_line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiClient;
    use crate::dispatcher::AuthenticatedDispatcher;
    use crate::http::ReqwestClient;
    use crate::registry::ToolRegistry;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::time::Duration;
    use token_cache::{AuthError, AuthResult, CredentialExchange, TokenCache};

    struct NoExchange;

    #[async_trait]
    impl CredentialExchange for NoExchange {
        async fn exchange(&self) -> AuthResult<Value> {
            Err(AuthError::MissingToken)
        }
    }

    #[tokio::test]
    async fn test_serve_lines() {
        let tokens = Arc::new(TokenCache::new(Arc::new(NoExchange)));
        let http = Arc::new(ReqwestClient::new(Duration::from_secs(1)).unwrap());
        let client = Arc::new(ApiClient::new(http, tokens, "http://localhost"));
        let registry = Arc::new(ToolRegistry::new(AuthenticatedDispatcher::new(client, "/auth/token")));
        registry.register_builtin_tools().await;
        let transport = StdioTransport::new(Arc::new(RequestHandler::new(registry)));

        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            "not json\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
        );
        let mut output = Vec::new();
        transport.serve(input.as_bytes(), &mut output).await.unwrap();

        let replies: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(replies.len(), 3);
        assert_eq!(replies[0], json!({"jsonrpc": "2.0", "id": 1, "result": {}}));
        assert_eq!(replies[1]["error"]["code"], -32700);
        assert_eq!(replies[2]["result"]["tools"][0]["name"], "describe_api");
    }
}
