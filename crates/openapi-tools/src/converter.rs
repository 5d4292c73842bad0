//! OpenAPI document → function signature conversion.

use crate::error::SchemaError;
use crate::types::{ConvertedSchema, FunctionSignature, HttpMethod, Route, RouteMethod};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

/// Longest chain of `$ref`s pointing directly at other `$ref`s.
const MAX_REF_DEPTH: usize = 32;

/// Upper bound on schema nodes produced while inlining one document.
const MAX_INLINED_NODES: usize = 20_000;

/// Turns a raw OpenAPI document into routes and model-callable functions.
pub trait SchemaConverter: Send + Sync {
    fn convert(&self, raw: &str) -> Result<ConvertedSchema, SchemaError>;
}

/// Converter for JSON OpenAPI 3.x documents.
///
/// Each operation becomes one function named after its `operationId`. Its
/// parameters are flattened into a single object schema: operation and
/// path-level parameters by name, plus the properties of an
/// `application/json` request body.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenApiConverter;

impl SchemaConverter for OpenApiConverter {
    fn convert(&self, raw: &str) -> Result<ConvertedSchema, SchemaError> {
        let doc: Value = serde_json::from_str(raw)?;

        let info = doc
            .get("info")
            .ok_or_else(|| invalid("missing info object"))?;
        let title = required_str(info, "title", "info.title")?;
        let description = required_str(info, "description", "info.description")?;
        let url = doc
            .get("servers")
            .and_then(Value::as_array)
            .and_then(|servers| servers.first())
            .and_then(|server| server.get("url"))
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("missing servers[0].url"))?
            .trim_end_matches('/')
            .to_string();
        let paths = doc
            .get("paths")
            .and_then(Value::as_object)
            .ok_or_else(|| invalid("missing paths object"))?;

        let mut routes = Vec::with_capacity(paths.len());
        let mut functions = Vec::new();
        let mut inliner = Inliner::new(&doc);

        for (path, item) in paths {
            let item = resolve_ref(&doc, item, 0)?
                .as_object()
                .ok_or_else(|| invalid(format!("path item {} is not an object", path)))?;
            let shared_params = item.get("parameters");

            let mut methods = Vec::new();
            for (key, operation) in item {
                let Some(method) = HttpMethod::from_key(key) else {
                    continue;
                };
                let operation = resolve_ref(&doc, operation, 0)?;
                let operation_id = operation
                    .get("operationId")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        invalid(format!("operation {} {} has no operationId", method, path))
                    })?;

                functions.push(function_signature(
                    &mut inliner,
                    operation_id,
                    operation,
                    shared_params,
                )?);
                methods.push(RouteMethod {
                    method,
                    operation_id: operation_id.to_string(),
                });
            }

            routes.push(Route {
                path: path.clone(),
                methods,
            });
        }

        debug!(
            title = %title,
            routes = routes.len(),
            functions = functions.len(),
            "Converted OpenAPI document"
        );

        Ok(ConvertedSchema {
            title,
            description,
            url,
            routes,
            functions,
        })
    }
}

fn function_signature<'a>(
    inliner: &mut Inliner<'a>,
    operation_id: &str,
    operation: &'a Value,
    shared_params: Option<&'a Value>,
) -> Result<FunctionSignature, SchemaError> {
    let doc = inliner.doc;
    let description = operation
        .get("description")
        .or_else(|| operation.get("summary"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let mut properties = Map::new();
    let mut required: Vec<Value> = Vec::new();

    // Operation-level parameters override path-level ones with the same name.
    let params = [shared_params, operation.get("parameters")];
    for list in params.into_iter().flatten() {
        let Some(list) = list.as_array() else {
            continue;
        };
        for param in list {
            let param = resolve_ref(doc, param, 0)?;
            let (Some(name), Some(schema)) = (
                param.get("name").and_then(Value::as_str),
                param.get("schema"),
            ) else {
                continue;
            };

            let mut schema = inliner.inline(schema)?;
            if let (Some(obj), Some(desc)) = (schema.as_object_mut(), param.get("description")) {
                obj.entry("description").or_insert_with(|| desc.clone());
            }
            properties.insert(name.to_string(), schema);

            let is_required = param.get("required").and_then(Value::as_bool) == Some(true);
            let name_value = Value::String(name.to_string());
            if is_required && !required.contains(&name_value) {
                required.push(name_value);
            }
        }
    }

    if let Some(body) = operation.get("requestBody") {
        let body = resolve_ref(doc, body, 0)?;
        if let Some(schema) = body.pointer("/content/application~1json/schema") {
            let schema = inliner.inline(schema)?;
            match schema.get("properties").and_then(Value::as_object) {
                Some(body_props) => {
                    for (name, prop) in body_props {
                        properties.insert(name.clone(), prop.clone());
                    }
                    let body_required = schema.get("required").and_then(Value::as_array);
                    for name in body_required.into_iter().flatten() {
                        if !required.contains(name) {
                            required.push(name.clone());
                        }
                    }
                }
                None => {
                    properties.insert("requestBody".to_string(), schema);
                }
            }
        }
    }

    let mut parameters = Map::new();
    parameters.insert("type".into(), Value::String("object".into()));
    parameters.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        parameters.insert("required".into(), Value::Array(required));
    }

    Ok(FunctionSignature {
        name: operation_id.to_string(),
        description,
        parameters: Value::Object(parameters),
    })
}

/// Follow a chain of local `$ref`s until a concrete value is reached.
fn resolve_ref<'a>(doc: &'a Value, value: &'a Value, depth: usize) -> Result<&'a Value, SchemaError> {
    let Some(reference) = value.get("$ref").and_then(Value::as_str) else {
        return Ok(value);
    };
    if depth >= MAX_REF_DEPTH {
        return Err(invalid(format!("reference {} is nested too deeply", reference)));
    }
    let pointer = reference
        .strip_prefix('#')
        .ok_or_else(|| invalid(format!("external reference {} is not supported", reference)))?;
    let target = doc
        .pointer(pointer)
        .ok_or_else(|| invalid(format!("unresolved reference {}", reference)))?;
    resolve_ref(doc, target, depth + 1)
}

/// Copies schemas with every local `$ref` replaced by its target.
///
/// A reference met again while its own target is being expanded is cut off
/// with a placeholder. Expansions without such a cut are cached per reference.
/// Output is bounded by [`MAX_INLINED_NODES`] across the whole document.
struct Inliner<'a> {
    doc: &'a Value,
    expanding: Vec<&'a str>,
    cache: HashMap<&'a str, (Value, usize)>,
    cuts: usize,
    remaining: usize,
}

impl<'a> Inliner<'a> {
    fn new(doc: &'a Value) -> Self {
        Self {
            doc,
            expanding: Vec::new(),
            cache: HashMap::new(),
            cuts: 0,
            remaining: MAX_INLINED_NODES,
        }
    }

    fn inline(&mut self, value: &'a Value) -> Result<Value, SchemaError> {
        match value {
            Value::Object(obj) => {
                if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
                    return self.expand(reference, value);
                }
                self.charge(1)?;
                let mut out = Map::with_capacity(obj.len());
                for (key, child) in obj {
                    out.insert(key.clone(), self.inline(child)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => {
                self.charge(1)?;
                items
                    .iter()
                    .map(|item| self.inline(item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            other => {
                self.charge(1)?;
                Ok(other.clone())
            }
        }
    }

    fn expand(&mut self, reference: &'a str, value: &'a Value) -> Result<Value, SchemaError> {
        if let Some((cached, size)) = self.cache.get(reference).cloned() {
            self.charge(size)?;
            return Ok(cached);
        }

        let target = resolve_ref(self.doc, value, 0)?;
        if self.expanding.contains(&reference) {
            self.cuts += 1;
            self.charge(1)?;
            return Ok(cycle_placeholder(target));
        }

        let cuts = self.cuts;
        let before = self.remaining;
        self.expanding.push(reference);
        let expanded = self.inline(target);
        self.expanding.pop();
        let expanded = expanded?;

        if self.cuts == cuts {
            self.cache
                .insert(reference, (expanded.clone(), before - self.remaining));
        }
        Ok(expanded)
    }

    fn charge(&mut self, nodes: usize) -> Result<(), SchemaError> {
        self.remaining = self
            .remaining
            .checked_sub(nodes)
            .ok_or_else(|| invalid("schema is too large once references are expanded"))?;
        Ok(())
    }
}

/// Stand-in for a recursive reference: the target's type and description only.
fn cycle_placeholder(target: &Value) -> Value {
    let mut placeholder = Map::new();
    let kind = target.get("type").cloned().unwrap_or_else(|| Value::String("object".into()));
    placeholder.insert("type".into(), kind);
    if let Some(description) = target.get("description") {
        placeholder.insert("description".into(), description.clone());
    }
    Value::Object(placeholder)
}

fn required_str(parent: &Value, key: &str, label: &str) -> Result<String, SchemaError> {
    parent
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| invalid(format!("missing {}", label)))
}

fn invalid(message: impl Into<String>) -> SchemaError {
    SchemaError::Invalid(message.into())
}
