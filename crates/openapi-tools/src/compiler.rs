//! Compiles OpenAPI operations into tool definitions

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::document::OpenApiDocument;
use crate::error::{CompileError, CompileResult};
use crate::resolver::SchemaResolver;
use crate::tool::{EndpointMetadata, InputSchema, ToolDefinition};
use crate::types::*;

const MULTIPART: &str = "multipart/form-data";
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Naming and filtering options for a compilation
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Prepended to every tool name
    pub name_prefix: String,
    /// When non-empty, only these (prefixed) names are emitted
    pub include_only: HashSet<String>,
    /// Prefixed names that are never emitted
    pub exclude: HashSet<String>,
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    pub fn include_only<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_only = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = names.into_iter().map(Into::into).collect();
        self
    }

    /// Whether a fully prefixed tool name passes the filters
    pub fn allows(&self, name: &str) -> bool {
        if self.exclude.contains(name) {
            return false;
        }
        self.include_only.is_empty() || self.include_only.contains(name)
    }
}

/// A parameter after `$ref` resolution
struct Parameter {
    name: String,
    location: ParameterLocation,
    required: bool,
    description: Option<String>,
    schema: Option<Value>,
}

/// Turns an OpenAPI document into one tool per supported HTTP operation
pub struct ToolCompiler;

impl ToolCompiler {
    /// Compile every operation that passes the option filters.
    ///
    /// Any unresolvable or cyclic reference aborts the whole compilation so
    /// that a document never yields a partial tool set.
    pub fn compile(
        document: &OpenApiDocument,
        options: &CompileOptions,
    ) -> CompileResult<Vec<ToolDefinition>> {
        let resolver = SchemaResolver::new(document.raw());
        let mut tools = Vec::new();

        for (path, path_item) in &document.spec().paths {
            for (method, operation) in path_item.operations() {
                let name = format!(
                    "{}{}",
                    options.name_prefix,
                    Self::base_name(path, method, operation)
                );

                if !options.allows(&name) {
                    debug!("Skipping filtered tool: {}", name);
                    continue;
                }

                let tool = Self::compile_operation(name, path, method, path_item, operation, &resolver)?;
                tools.push(tool);
            }
        }

        info!(
            "Compiled {} tools from '{}'",
            tools.len(),
            document.title()
        );
        Ok(tools)
    }

    fn compile_operation(
        name: String,
        path: &str,
        method: HttpMethod,
        path_item: &RawPathItem,
        operation: &RawOperation,
        resolver: &SchemaResolver,
    ) -> CompileResult<ToolDefinition> {
        let mut input_schema = InputSchema::default();
        let mut endpoint = EndpointMetadata::new(path, method);

        // Path-level parameters first, then operation-level ones
        for raw in path_item.parameters.iter().chain(&operation.parameters) {
            let Some(param) = Self::resolve_parameter(raw, resolver)? else {
                continue;
            };
            match param.location {
                ParameterLocation::Path => {
                    let schema = Self::parameter_schema(&param, resolver)?;
                    input_schema.insert_property(&param.name, schema, true);
                    endpoint.path_params.push(param.name);
                }
                ParameterLocation::Query => {
                    let schema = Self::parameter_schema(&param, resolver)?;
                    input_schema.insert_property(&param.name, schema, param.required);
                    endpoint.query_params.push(param.name);
                }
                ParameterLocation::Header | ParameterLocation::Cookie => {
                    debug!("{}: ignoring {:?} parameter {}", name, param.location, param.name);
                }
            }
        }

        // Placeholders the document forgot to declare
        for placeholder in path_placeholders(path) {
            if !endpoint.path_params.contains(&placeholder) {
                debug!("{}: synthesizing path parameter {}", name, placeholder);
                input_schema.insert_property(&placeholder, json!({"type": "string"}), true);
                endpoint.path_params.push(placeholder);
            }
        }

        if let Some(body) = Self::resolve_request_body(operation, resolver)? {
            endpoint.content_type = Self::detect_content_type(&body);

            if let Some(schema) = Self::body_schema(&body) {
                let resolved = resolver.resolve(schema)?;
                if let Some(properties) = resolved.get("properties").and_then(Value::as_object) {
                    for (prop_name, prop_schema) in properties {
                        let prop_schema = resolver.resolve(prop_schema)?;
                        input_schema.insert_property(prop_name, prop_schema, false);
                        endpoint.body_params.push(prop_name.clone());
                    }
                }
                if let Some(required) = resolved.get("required").and_then(Value::as_array) {
                    for prop_name in required.iter().filter_map(Value::as_str) {
                        input_schema.mark_required(prop_name);
                    }
                }
            }
        }

        Ok(ToolDefinition {
            name,
            description: Self::build_description(path, method, operation),
            input_schema,
            endpoint: Some(endpoint),
        })
    }

    /// `operationId` when present, else `{method}_{lastStaticSegment}`
    fn base_name(path: &str, method: HttpMethod, operation: &RawOperation) -> String {
        match operation.operation_id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Self::synthesize_name(path, method),
        }
    }

    fn synthesize_name(path: &str, method: HttpMethod) -> String {
        let segment = path
            .split('/')
            .filter(|s| !s.is_empty() && !s.contains('{'))
            .last()
            .unwrap_or("resource");
        format!("{}_{}", method.as_lower(), segment)
    }

    /// Follow a parameter `$ref`; parameters with an unknown location are skipped
    fn resolve_parameter(
        raw: &RawParameter,
        resolver: &SchemaResolver,
    ) -> CompileResult<Option<Parameter>> {
        let resolved;
        let raw = match &raw.reference {
            Some(reference) => {
                let target = resolver.lookup(reference)?;
                resolved = serde_json::from_value::<RawParameter>(target.clone()).map_err(|e| {
                    CompileError::InvalidSpec(format!("parameter {}: {}", reference, e))
                })?;
                &resolved
            }
            None => raw,
        };

        let Some(location) = ParameterLocation::parse(&raw.location) else {
            debug!("Skipping parameter {} with location '{}'", raw.name, raw.location);
            return Ok(None);
        };

        Ok(Some(Parameter {
            name: raw.name.clone(),
            location,
            required: raw.required || location == ParameterLocation::Path,
            description: raw.description.clone(),
            schema: raw.schema.clone(),
        }))
    }

    fn parameter_schema(param: &Parameter, resolver: &SchemaResolver) -> CompileResult<Value> {
        let mut schema = match &param.schema {
            Some(schema) => resolver.resolve(schema)?,
            None => json!({"type": "string"}),
        };

        if let Some(obj) = schema.as_object_mut() {
            obj.entry("type")
                .or_insert_with(|| Value::String("string".into()));
            if let Some(desc) = &param.description {
                obj.insert("description".into(), Value::String(desc.clone()));
            }
        }
        Ok(schema)
    }

    fn resolve_request_body(
        operation: &RawOperation,
        resolver: &SchemaResolver,
    ) -> CompileResult<Option<RawRequestBody>> {
        let Some(body) = &operation.request_body else {
            return Ok(None);
        };
        match &body.reference {
            Some(reference) => {
                let target = resolver.lookup(reference)?;
                let resolved = serde_json::from_value(target.clone()).map_err(|e| {
                    CompileError::InvalidSpec(format!("request body {}: {}", reference, e))
                })?;
                Ok(Some(resolved))
            }
            None => Ok(Some(body.clone())),
        }
    }

    /// Form encodings are recorded explicitly; JSON is the implied default
    fn detect_content_type(body: &RawRequestBody) -> Option<ContentType> {
        if body.content.contains_key(MULTIPART) {
            Some(ContentType::Multipart)
        } else if body.content.contains_key(FORM_URLENCODED) {
            Some(ContentType::FormUrlEncoded)
        } else {
            None
        }
    }

    /// JSON schema when declared, otherwise the form schema
    fn body_schema(body: &RawRequestBody) -> Option<&Value> {
        let json = body
            .content
            .iter()
            .find(|(ct, _)| ct.contains("json"))
            .and_then(|(_, media)| media.schema.as_ref());

        json.or_else(|| {
            [MULTIPART, FORM_URLENCODED]
                .iter()
                .find_map(|ct| body.content.get(*ct).and_then(|media| media.schema.as_ref()))
        })
    }

    fn build_description(path: &str, method: HttpMethod, operation: &RawOperation) -> String {
        let mut parts = Vec::new();

        if let Some(summary) = &operation.summary {
            parts.push(summary.clone());
        }
        if let Some(desc) = &operation.description {
            if operation.summary.as_ref() != Some(desc) {
                parts.push(desc.clone());
            }
        }
        parts.push(format!("[{} {}]", method, path));
        if operation.deprecated {
            parts.push("(DEPRECATED)".to_string());
        }

        parts.join("\n\n")
    }
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([^{}]+)\}").expect("placeholder pattern is valid"))
}

/// Names of the `{name}` placeholders in an endpoint template, in order
pub fn path_placeholders(template: &str) -> Vec<String> {
    placeholder_pattern()
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_SPEC: &str = r#"
openapi: "3.0.0"
info:
  title: Store API
  version: "1.0.0"
paths:
  /items:
    get:
      operationId: listItems
      summary: List items
      parameters:
        - name: limit
          in: query
          schema:
            type: integer
        - name: tags
          in: query
          required: true
          schema:
            type: array
            items:
              type: string
        - name: X-Trace
          in: header
          schema:
            type: string
    post:
      summary: Create an item
      requestBody:
        required: true
        content:
          application/json:
            schema:
              $ref: '#/components/schemas/NewItem'
  /items/{id}:
    parameters:
      - $ref: '#/components/parameters/ItemId'
    get:
      operationId: getItem
      description: Fetch one item
      deprecated: true
    delete: {}
  /stores/{storeId}/items/{itemId}:
    put:
      operationId: updateStoreItem
      requestBody:
        content:
          application/json:
            schema:
              allOf:
                - $ref: '#/components/schemas/NewItem'
                - type: object
                  properties:
                    quantity:
                      type: integer
                  required: [quantity]
  /{id}:
    get: {}
  /uploads:
    post:
      operationId: uploadFile
      requestBody:
        content:
          multipart/form-data:
            schema:
              type: object
              properties:
                file:
                  type: string
                  format: binary
  /forms:
    post:
      operationId: submitForm
      requestBody:
        content:
          application/json:
            schema:
              type: object
              properties:
                a:
                  type: string
          application/x-www-form-urlencoded:
            schema:
              type: object
    head:
      operationId: headForms
components:
  parameters:
    ItemId:
      name: id
      in: path
      description: Item identifier
      schema:
        type: string
  schemas:
    NewItem:
      type: object
      properties:
        name:
          type: string
        price:
          $ref: '#/components/schemas/Money'
      required: [name]
    Money:
      type: number
      minimum: 0
"#;

    fn compile(options: &CompileOptions) -> Vec<ToolDefinition> {
        let doc = OpenApiDocument::parse(SAMPLE_SPEC).unwrap();
        ToolCompiler::compile(&doc, options).unwrap()
    }

    fn find<'a>(tools: &'a [ToolDefinition], name: &str) -> &'a ToolDefinition {
        tools
            .iter()
            .find(|t| t.name == name)
            .unwrap_or_else(|| panic!("tool {} not compiled", name))
    }

    #[test]
    fn test_one_tool_per_supported_operation() {
        let tools = compile(&CompileOptions::new());
        let mut names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        names.sort();

        assert_eq!(
            names,
            vec![
                "delete_items",
                "getItem",
                "get_resource",
                "listItems",
                "post_items",
                "submitForm",
                "updateStoreItem",
                "uploadFile",
            ]
        );
    }

    #[test]
    fn test_synthesize_name() {
        assert_eq!(ToolCompiler::synthesize_name("/users", HttpMethod::Get), "get_users");
        assert_eq!(
            ToolCompiler::synthesize_name("/users/{id}/posts/{postId}", HttpMethod::Patch),
            "patch_posts"
        );
        assert_eq!(ToolCompiler::synthesize_name("/{id}", HttpMethod::Get), "get_resource");
        assert_eq!(ToolCompiler::synthesize_name("/", HttpMethod::Post), "post_resource");
    }

    #[test]
    fn test_query_parameters() {
        let tools = compile(&CompileOptions::new());
        let tool = find(&tools, "listItems");
        let endpoint = tool.endpoint.as_ref().unwrap();

        assert_eq!(endpoint.http_method, HttpMethod::Get);
        assert_eq!(endpoint.query_params, vec!["limit", "tags"]);
        assert!(endpoint.path_params.is_empty());
        assert!(endpoint.body_params.is_empty());
        assert_eq!(tool.input_schema.required, vec!["tags"]);
        assert_eq!(tool.input_schema.properties["limit"]["type"], "integer");
        assert!(!tool.input_schema.properties.contains_key("X-Trace"));
    }

    #[test]
    fn test_path_level_parameter_ref() {
        let tools = compile(&CompileOptions::new());
        let tool = find(&tools, "getItem");
        let endpoint = tool.endpoint.as_ref().unwrap();

        assert_eq!(endpoint.path_params, vec!["id"]);
        assert_eq!(tool.input_schema.required, vec!["id"]);
        assert_eq!(
            tool.input_schema.properties["id"]["description"],
            "Item identifier"
        );
        assert!(tool.description.contains("Fetch one item"));
        assert!(tool.description.contains("[GET /items/{id}]"));
        assert!(tool.description.contains("(DEPRECATED)"));
    }

    #[test]
    fn test_undeclared_placeholders_are_synthesized() {
        let tools = compile(&CompileOptions::new());
        let tool = find(&tools, "updateStoreItem");
        let endpoint = tool.endpoint.as_ref().unwrap();

        assert_eq!(endpoint.path_params, vec!["storeId", "itemId"]);
        assert_eq!(tool.input_schema.properties["storeId"], json!({"type": "string"}));
        assert!(tool.input_schema.required.contains(&"itemId".to_string()));
    }

    #[test]
    fn test_json_body_ref_is_flattened() {
        let tools = compile(&CompileOptions::new());
        let tool = find(&tools, "post_items");
        let endpoint = tool.endpoint.as_ref().unwrap();

        assert_eq!(endpoint.content_type, None);
        assert_eq!(endpoint.body_params, vec!["name", "price"]);
        assert_eq!(tool.input_schema.required, vec!["name"]);
        assert_eq!(tool.input_schema.properties["price"]["type"], "number");
        assert!(tool.description.starts_with("Create an item"));
    }

    #[test]
    fn test_allof_body() {
        let tools = compile(&CompileOptions::new());
        let tool = find(&tools, "updateStoreItem");
        let endpoint = tool.endpoint.as_ref().unwrap();

        assert_eq!(endpoint.http_method, HttpMethod::Put);
        assert_eq!(endpoint.body_params.len(), 3);
        assert!(endpoint.body_params.contains(&"quantity".to_string()));
        assert_eq!(
            tool.input_schema.required,
            vec!["storeId", "itemId", "name", "quantity"]
        );
    }

    #[test]
    fn test_form_content_types() {
        let tools = compile(&CompileOptions::new());

        let upload = find(&tools, "uploadFile").endpoint.as_ref().unwrap();
        assert_eq!(upload.content_type, Some(ContentType::Multipart));
        assert_eq!(upload.body_params, vec!["file"]);

        // Form encoding is recorded while the JSON schema still supplies properties
        let form = find(&tools, "submitForm").endpoint.as_ref().unwrap();
        assert_eq!(form.content_type, Some(ContentType::FormUrlEncoded));
        assert_eq!(form.body_params, vec!["a"]);
    }

    #[test]
    fn test_operation_without_inputs_has_empty_schema() {
        let tools = compile(&CompileOptions::new());
        let tool = find(&tools, "delete_items");

        // Inherits the path-level id parameter, nothing else
        assert_eq!(tool.input_schema.properties.len(), 1);

        let doc = OpenApiDocument::parse_json(
            r#"{"openapi": "3.0.0", "paths": {"/health": {"get": {}}}}"#,
        )
        .unwrap();
        let tools = ToolCompiler::compile(&doc, &CompileOptions::new()).unwrap();
        assert_eq!(tools[0].name, "get_health");
        assert_eq!(
            tools[0].input_schema.to_value(),
            json!({"type": "object", "properties": {}, "required": []})
        );
    }

    #[test]
    fn test_prefix_and_filters() {
        let options = CompileOptions::new()
            .with_prefix("store_")
            .include_only(["store_listItems", "store_getItem", "store_uploadFile"])
            .exclude(["store_uploadFile"]);
        let tools = compile(&options);

        let mut names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["store_getItem", "store_listItems"]);
    }

    #[test]
    fn test_compile_is_deterministic() {
        let options = CompileOptions::new().with_prefix("x_");
        let first = compile(&options);
        let second = compile(&options);

        assert_eq!(first, second);
    }

    #[test]
    fn test_dangling_ref_aborts_compilation() {
        let doc = OpenApiDocument::parse_json(
            r##"{
                "openapi": "3.0.0",
                "paths": {
                    "/ok": {"get": {}},
                    "/broken": {"post": {"requestBody": {"content": {"application/json": {
                        "schema": {"$ref": "#/components/schemas/Nope"}
                    }}}}}
                }
            }"##,
        )
        .unwrap();

        let err = ToolCompiler::compile(&doc, &CompileOptions::new()).unwrap_err();
        assert!(matches!(err, CompileError::UnresolvableRef(_)));
    }

    #[test]
    fn test_path_placeholders() {
        assert_eq!(
            path_placeholders("/stores/{storeId}/items/{itemId}"),
            vec!["storeId", "itemId"]
        );
        assert!(path_placeholders("/items").is_empty());
    }
}
