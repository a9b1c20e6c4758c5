//! `$ref` and `allOf` resolution for OpenAPI schemas

use serde_json::{Map, Value};

use crate::error::{CompileError, CompileResult};

/// Structural classification of a schema node
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SchemaNode<'a> {
    /// `{"$ref": "#/components/schemas/Name"}`
    Reference(&'a str),
    /// `{"allOf": [...]}`
    Composite(&'a [Value]),
    /// A schema with `properties` or `type: object`
    Object(&'a Map<String, Value>),
    /// Anything else: scalars, arrays, enums, free-form values
    Primitive(&'a Value),
}

impl<'a> SchemaNode<'a> {
    pub fn classify(schema: &'a Value) -> Self {
        if let Value::Object(obj) = schema {
            if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
                return SchemaNode::Reference(reference);
            }
            if let Some(members) = obj.get("allOf").and_then(Value::as_array) {
                return SchemaNode::Composite(members);
            }
            if obj.contains_key("properties")
                || obj.get("type").and_then(Value::as_str) == Some("object")
            {
                return SchemaNode::Object(obj);
            }
        }
        SchemaNode::Primitive(schema)
    }
}

/// Flattens `$ref` and `allOf` against a document.
///
/// Resolution only reads the document, so the same resolver can be used
/// any number of times and always yields the same output for the same input.
pub struct SchemaResolver<'a> {
    document: &'a Value,
    /// Maximum reference depth before the chain is treated as cyclic
    max_depth: usize,
}

impl<'a> SchemaResolver<'a> {
    /// Create a new resolver over a raw document tree
    pub fn new(document: &'a Value) -> Self {
        Self {
            document,
            max_depth: 32,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Resolve a schema to a flat object schema.
    ///
    /// References are followed, `allOf` members are merged, anything else is
    /// returned unchanged. Nested property schemas are left as they are.
    pub fn resolve(&self, schema: &Value) -> CompileResult<Value> {
        let mut chain = Vec::new();
        self.resolve_in_chain(schema, &mut chain)
    }

    fn resolve_in_chain(&self, schema: &Value, chain: &mut Vec<String>) -> CompileResult<Value> {
        match SchemaNode::classify(schema) {
            SchemaNode::Reference(reference) => {
                if chain.iter().any(|seen| seen == reference) || chain.len() >= self.max_depth {
                    chain.push(reference.to_string());
                    return Err(CompileError::CyclicRef(chain.join(" -> ")));
                }
                let target = self.lookup(reference)?;
                chain.push(reference.to_string());
                let resolved = self.resolve_in_chain(target, chain);
                chain.pop();
                resolved
            }
            SchemaNode::Composite(members) => self.merge_all_of(schema, members, chain),
            SchemaNode::Object(_) | SchemaNode::Primitive(_) => Ok(schema.clone()),
        }
    }

    /// Merge `allOf` members: later property definitions win, `required`
    /// lists are concatenated in member order.
    fn merge_all_of(
        &self,
        schema: &Value,
        members: &[Value],
        chain: &mut Vec<String>,
    ) -> CompileResult<Value> {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for member in members {
            let resolved = self.resolve_in_chain(member, chain)?;
            collect_object_parts(&resolved, &mut properties, &mut required);
        }

        // Siblings of `allOf` apply on top of the merged members
        collect_object_parts(schema, &mut properties, &mut required);

        let mut merged = Map::new();
        if let Some(obj) = schema.as_object() {
            for (key, value) in obj {
                if !matches!(key.as_str(), "allOf" | "properties" | "required") {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
        merged
            .entry("type")
            .or_insert_with(|| Value::String("object".into()));
        merged.insert("properties".into(), Value::Object(properties));
        merged.insert("required".into(), Value::Array(required));

        Ok(Value::Object(merged))
    }

    /// Walk a local reference (`#/a/b/c`) through the document
    pub fn lookup(&self, reference: &str) -> CompileResult<&'a Value> {
        let mut segments = reference.split('/');
        if !matches!(segments.next(), Some("#") | Some("")) {
            return Err(CompileError::UnresolvableRef(format!(
                "{} (only local references are supported)",
                reference
            )));
        }

        let mut node = self.document;
        for segment in segments {
            let key = segment.replace("~1", "/").replace("~0", "~");
            let next = match node {
                Value::Object(obj) => obj.get(&key),
                Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            node = next.ok_or_else(|| CompileError::UnresolvableRef(reference.to_string()))?;
        }

        Ok(node)
    }
}

fn collect_object_parts(schema: &Value, properties: &mut Map<String, Value>, required: &mut Vec<Value>) {
    if let Some(props) = schema.get("properties").and_then(Value::as_object) {
        for (name, prop) in props {
            properties.insert(name.clone(), prop.clone());
        }
    }
    if let Some(names) = schema.get("required").and_then(Value::as_array) {
        required.extend(names.iter().cloned());
    }
}
