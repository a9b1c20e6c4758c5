//! Assembles a ready-to-serve registry from configuration

use std::sync::Arc;

use openapi_tools::OpenApiDocument;
use token_cache::{HttpCredentialExchange, TokenCache};
use tracing::info;

use crate::client::ApiClient;
use crate::config::{ConfigError, GatewayConfig};
use crate::dispatcher::AuthenticatedDispatcher;
use crate::http::ReqwestClient;
use crate::registry::ToolRegistry;

/// Load the document, wire auth and HTTP, and register every tool
pub async fn build_registry(config: &GatewayConfig) -> Result<Arc<ToolRegistry>, ConfigError> {
    config.validate()?;

    let spec_path = config.spec_path.as_ref().ok_or(ConfigError::Missing("specPath"))?;
    let document = OpenApiDocument::from_file(spec_path)?;

    let api_base_url = config.resolve_api_base_url(document.default_server_url())?;
    let auth_base_url = config.auth_base_url.as_deref().unwrap_or(&api_base_url);
    info!("API base URL: {}", api_base_url);

    let exchange = HttpCredentialExchange::new(auth_base_url, config.auth_path(), config.credentials()?)?;
    info!("Token endpoint: {}", exchange.url());
    let tokens = Arc::new(TokenCache::new(Arc::new(exchange)));

    let http = Arc::new(ReqwestClient::new(config.request_timeout())?);
    let client = Arc::new(ApiClient::new(http, tokens, &api_base_url));
    let dispatcher =
        AuthenticatedDispatcher::new(client, config.auth_path()).with_name_prefix(config.name_prefix.clone());
    let registry = Arc::new(ToolRegistry::new(dispatcher));

    registry.register_builtin_tools().await;
    registry.load_document(document, &config.compile_options()).await?;
    info!("Registry ready with {} tools", registry.len().await);

    Ok(registry)
}
