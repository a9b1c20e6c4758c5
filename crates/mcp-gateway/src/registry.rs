//! Tool registry: compiled API tools and direct handler tools by name

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use openapi_tools::{CompileOptions, OpenApiDocument, ToolCompiler, ToolDefinition};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::builtin::DescribeApi;
use crate::client::ApiClient;
use crate::dispatcher::AuthenticatedDispatcher;
use crate::error::{DispatchError, DispatchResult};
use crate::protocol::McpTool;

/// Document slot shared between the registry and tools that inspect it
pub type SharedDocument = Arc<RwLock<Option<Arc<OpenApiDocument>>>>;

/// Keys reserved for the public tool shape
const RESERVED_FIELDS: [&str; 3] = ["name", "description", "inputSchema"];

/// A tool served in-process instead of by an HTTP call
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: Map<String, Value>, client: &ApiClient) -> DispatchResult<Value>;
}

/// A registry entry
pub struct RegisteredTool {
    pub definition: ToolDefinition,
    pub handler: Option<Arc<dyn ToolHandler>>,
    /// Additional fields; keys starting with `_` are internal and never listed
    pub fields: Map<String, Value>,
}

impl RegisteredTool {
    /// A tool dispatched over HTTP through its endpoint metadata
    pub fn api(definition: ToolDefinition) -> Self {
        Self {
            definition,
            handler: None,
            fields: Map::new(),
        }
    }

    pub fn direct(definition: ToolDefinition, handler: Arc<dyn ToolHandler>) -> Self {
        Self {
            definition,
            handler: Some(handler),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// `{name, description, inputSchema}` plus public custom fields
    pub fn public_view(&self) -> McpTool {
        let extra = self
            .fields
            .iter()
            .filter(|(key, _)| !key.starts_with('_') && !RESERVED_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let description = &self.definition.description;
        McpTool {
            name: self.definition.name.clone(),
            description: (!description.is_empty()).then(|| description.clone()),
            input_schema: self.definition.input_schema.clone(),
            extra,
        }
    }
}

/// In-memory name → tool mapping with last-write-wins registration
pub struct ToolRegistry {
    tools: RwLock<IndexMap<String, Arc<RegisteredTool>>>,
    dispatcher: AuthenticatedDispatcher,
    document: SharedDocument,
}

impl ToolRegistry {
    pub fn new(dispatcher: AuthenticatedDispatcher) -> Self {
        Self {
            tools: RwLock::new(IndexMap::new()),
            dispatcher,
            document: Arc::new(RwLock::new(None)),
        }
    }

    /// Register under the definition's name, replacing any previous tool
    pub async fn register(&self, tool: RegisteredTool) {
        let name = tool.definition.name.clone();
        if self.tools.write().await.insert(name.clone(), Arc::new(tool)).is_some() {
            warn!("Tool {} re-registered, replacing previous definition", name);
        }
    }

    pub async fn get(&self, name: &str) -> Option<Arc<RegisteredTool>> {
        self.tools.read().await.get(name).cloned()
    }

    /// Public views in registration order
    pub async fn list(&self) -> Vec<McpTool> {
        self.tools
            .read()
            .await
            .values()
            .map(|tool| tool.public_view())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.tools.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tools.read().await.is_empty()
    }

    pub async fn invoke(&self, name: &str, args: Value) -> DispatchResult<Value> {
        let tool = self
            .get(name)
            .await
            .ok_or_else(|| DispatchError::UnknownTool(name.to_string()))?;

        debug!("Invoking tool {}", name);
        self.dispatcher.dispatch(&tool, args).await
    }

    /// Compile a document and register every resulting tool.
    ///
    /// Compilation runs to completion before anything is registered, so a
    /// failing document leaves the registry unchanged. Returns the number of
    /// tools registered.
    pub async fn load_document(&self, document: OpenApiDocument, options: &CompileOptions) -> DispatchResult<usize> {
        let definitions = ToolCompiler::compile(&document, options)?;
        let count = definitions.len();

        {
            let mut tools = self.tools.write().await;
            for definition in definitions {
                let name = definition.name.clone();
                if tools.insert(name.clone(), Arc::new(RegisteredTool::api(definition))).is_some() {
                    warn!("Tool {} re-registered, replacing previous definition", name);
                }
            }
        }

        info!(
            "Loaded {} tools from {} v{}",
            count,
            document.title(),
            document.version()
        );
        *self.document.write().await = Some(Arc::new(document));
        Ok(count)
    }

    pub async fn load_file(&self, path: impl AsRef<Path>, options: &CompileOptions) -> DispatchResult<usize> {
        let document = OpenApiDocument::from_file(path)?;
        self.load_document(document, options).await
    }

    /// The most recently loaded document
    pub async fn loaded_document(&self) -> Option<Arc<OpenApiDocument>> {
        self.document.read().await.clone()
    }

    /// Register the in-process inspection tools
    pub async fn register_builtin_tools(&self) {
        self.register(DescribeApi::tool(self.document.clone())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiClient;
    use crate::http::{ApiRequest, ApiResponse, HttpClient, TransportError};
    use openapi_tools::InputSchema;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use token_cache::{AuthResult, CredentialExchange, TokenCache};

    const SPEC: &str = r#"
openapi: 3.0.3
info:
  title: Inventory
  version: "2.1"
paths:
  /items:
    get:
      operationId: listItems
      summary: List items
  /items/{id}:
    get:
      operationId: getItem
"#;

    struct StaticExchange;

    #[async_trait]
    impl CredentialExchange for StaticExchange {
        async fn exchange(&self) -> AuthResult<Value> {
            Ok(json!({"access_token": "tok"}))
        }
    }

    /// Answers every request with its own URL
    struct EchoHttp {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HttpClient for EchoHttp {
        async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ApiResponse {
                status: 200,
                reason: "OK".into(),
                content_type: Some("text/plain".into()),
                body: request.url.clone(),
            })
        }
    }

    fn registry() -> (ToolRegistry, Arc<EchoHttp>) {
        let http = Arc::new(EchoHttp {
            calls: AtomicUsize::new(0),
        });
        let tokens = Arc::new(TokenCache::new(Arc::new(StaticExchange)));
        let client = Arc::new(ApiClient::new(http.clone(), tokens, "https://api.test"));
        (ToolRegistry::new(AuthenticatedDispatcher::new(client, "/auth/token")), http)
    }

    struct Fixed(Value);

    #[async_trait]
    impl ToolHandler for Fixed {
        async fn call(&self, _args: Map<String, Value>, _client: &ApiClient) -> DispatchResult<Value> {
            Ok(self.0.clone())
        }
    }

    fn direct(name: &str, value: Value) -> RegisteredTool {
        RegisteredTool::direct(
            ToolDefinition::new(name, "fixed answer", InputSchema::default()),
            Arc::new(Fixed(value)),
        )
    }

    #[tokio::test]
    async fn test_load_and_invoke() {
        let (registry, http) = registry();
        let document = OpenApiDocument::parse(SPEC).unwrap();

        let count = registry.load_document(document, &CompileOptions::new()).await.unwrap();
        assert_eq!(count, 2);
        assert!(registry.get("getItem").await.is_some());

        let result = registry.invoke("getItem", json!({"id": "7"})).await.unwrap();
        assert_eq!(result, json!("https://api.test/items/7"));
        assert_eq!(http.calls.load(Ordering::SeqCst), 1);

        let document = registry.loaded_document().await.unwrap();
        assert_eq!(document.title(), "Inventory");
    }

    #[tokio::test]
    async fn test_list_hides_dispatch_metadata() {
        let (registry, _) = registry();
        registry
            .load_document(OpenApiDocument::parse(SPEC).unwrap(), &CompileOptions::new())
            .await
            .unwrap();

        let listed = serde_json::to_value(registry.list().await).unwrap();
        let first = listed[0].as_object().unwrap();
        let mut keys: Vec<_> = first.keys().cloned().collect();
        keys.sort();

        assert_eq!(keys, vec!["description", "inputSchema", "name"]);
        assert_eq!(first["name"], "listItems");
    }

    #[tokio::test]
    async fn test_custom_public_fields_listed_internal_stripped() {
        let (registry, _) = registry();
        registry
            .register(
                direct("status", json!("up"))
                    .with_field("category", json!("ops"))
                    .with_field("_owner", json!("internal"))
                    .with_field("name", json!("shadow")),
            )
            .await;

        let listed = registry.list().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "status");
        assert_eq!(listed[0].extra.get("category"), Some(&json!("ops")));
        assert!(!listed[0].extra.contains_key("_owner"));
        assert!(!listed[0].extra.contains_key("name"));
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let (registry, _) = registry();
        registry.register(direct("status", json!("first"))).await;
        registry.register(direct("status", json!("second"))).await;

        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.invoke("status", Value::Null).await.unwrap(), json!("second"));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (registry, _) = registry();
        let err = registry.invoke("missing", Value::Null).await.unwrap_err();
        assert!(matches!(err, DispatchError::UnknownTool(ref name) if name == "missing"));
    }

    #[tokio::test]
    async fn test_failed_load_registers_nothing() {
        let (registry, _) = registry();
        let broken = OpenApiDocument::parse(
            r#"
openapi: 3.0.0
info: {title: Broken, version: "1"}
paths:
  /a:
    get:
      operationId: ok
  /b:
    post:
      operationId: bad
      requestBody:
        content:
          application/json:
            schema:
              $ref: '#/components/schemas/Missing'
"#,
        )
        .unwrap();

        let err = registry
            .load_document(broken, &CompileOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Compile(_)));
        assert!(registry.is_empty().await);
        assert!(registry.loaded_document().await.is_none());
    }

    #[tokio::test]
    async fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.yaml");
        std::fs::write(&path, SPEC).unwrap();

        let (registry, _) = registry();
        let count = registry
            .load_file(&path, &CompileOptions::new().with_prefix("inv_"))
            .await
            .unwrap();

        assert_eq!(count, 2);
        assert!(registry.get("inv_listItems").await.is_some());
    }

    #[tokio::test]
    async fn test_registries_are_independent() {
        let (first, _) = registry();
        let (second, _) = registry();
        first
            .load_document(OpenApiDocument::parse(SPEC).unwrap(), &CompileOptions::new())
            .await
            .unwrap();

        assert!(second.loaded_document().await.is_none());
        assert!(second.is_empty().await);
    }
}
