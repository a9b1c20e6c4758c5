//! HTTP transport for MCP

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{extract::State, routing::get, routing::post, Json, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::protocol::{McpMessage, RequestHandler};

pub struct HttpTransport {
    handler: Arc<RequestHandler>,
    port: u16,
}

impl HttpTransport {
    pub fn new(handler: Arc<RequestHandler>, port: u16) -> Self {
        Self { handler, port }
    }

    /// Routes: `GET /`, `GET /health`, `POST /mcp`
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/", get(health))
            .route("/health", get(health))
            .route("/mcp", post(handle_mcp_request))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.handler.clone())
    }

    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let addr = format!("0.0.0.0:{}", self.port);
        info!("Starting MCP HTTP server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn handle_mcp_request(
    State(handler): State<Arc<RequestHandler>>,
    Json(message): Json<McpMessage>,
) -> Response {
    debug!("HTTP request: {:?}", message.method);

    match handler.handle(message).await {
        Some(response) => Json(response).into_response(),
        // Notifications and stray responses get no JSON-RPC reply
        None => StatusCode::ACCEPTED.into_response(),
    }
}
