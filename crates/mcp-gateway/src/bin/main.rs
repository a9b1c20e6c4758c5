//! OpenAPI MCP Gateway - serves an OpenAPI-described API as MCP tools
//!
//! Settings come from an optional JSON config file; every flag below also
//! reads its environment variable and overrides the file.

use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use mcp_gateway::{build_registry, GatewayConfig, McpServer, ServerMode};

#[derive(Parser, Debug)]
#[command(name = "openapi-mcp-gateway")]
#[command(author = "Symbia Labs")]
#[command(version)]
#[command(about = "Expose an OpenAPI-described REST API as authenticated MCP tools")]
struct Args {
    /// JSON config file
    #[arg(long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// OpenAPI document (JSON or YAML)
    #[arg(long, env = "OPENAPI_SPEC_PATH")]
    spec: Option<PathBuf>,

    #[arg(long, env = "API_BASE_URL")]
    api_base_url: Option<String>,

    /// Defaults to the API base URL
    #[arg(long, env = "AUTH_BASE_URL")]
    auth_base_url: Option<String>,

    #[arg(long, env = "AUTH_PATH")]
    auth_path: Option<String>,

    #[arg(long, env = "CLIENT_ID")]
    client_id: Option<String>,

    #[arg(long, env = "CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Prepended to every generated tool name
    #[arg(long, env = "TOOL_PREFIX")]
    prefix: Option<String>,

    /// Only expose these tools (comma separated)
    #[arg(long, value_delimiter = ',')]
    include: Vec<String>,

    /// Never expose these tools (comma separated)
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Run in HTTP mode instead of stdio
    #[arg(long)]
    http: bool,

    /// Port for HTTP mode
    #[arg(long, default_value = "3000")]
    port: u16,
}

impl Args {
    fn into_config(self) -> Result<(GatewayConfig, ServerMode), Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => GatewayConfig::load(path)?,
            None => GatewayConfig::default(),
        };

        if self.spec.is_some() {
            config.spec_path = self.spec;
        }
        if self.api_base_url.is_some() {
            config.api_base_url = self.api_base_url;
        }
        if self.auth_base_url.is_some() {
            config.auth_base_url = self.auth_base_url;
        }
        if self.auth_path.is_some() {
            config.auth_path = self.auth_path;
        }
        if self.client_id.is_some() {
            config.client_id = self.client_id;
        }
        if self.client_secret.is_some() {
            config.client_secret = self.client_secret;
        }
        if let Some(prefix) = self.prefix {
            config.name_prefix = prefix;
        }
        if !self.include.is_empty() {
            config.include_only = self.include;
        }
        if !self.exclude.is_empty() {
            config.exclude = self.exclude;
        }
        if self.timeout.is_some() {
            config.request_timeout_secs = self.timeout;
        }

        let mode = if self.http {
            ServerMode::Http { port: self.port }
        } else {
            ServerMode::Stdio
        };
        Ok((config, mode))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stderr keeps stdout free for the stdio protocol stream
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let (config, mode) = Args::parse().into_config()?;
    info!("Starting with {:?}", config);

    let registry = build_registry(&config).await?;
    McpServer::new(registry).with_mode(mode).run().await?;

    Ok(())
}
