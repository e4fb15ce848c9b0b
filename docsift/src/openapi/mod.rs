//! OpenAPI / Swagger specification parsing
//!
//! A [`SpecFile`] turns one specification into [`OperationRecord`]s, feeding
//! every schema it meets into a run-scoped [`SchemaRegistry`]. Supports
//! OpenAPI 3.x (`components.schemas`, `requestBody`, `content`) and Swagger
//! 2.0 (`definitions`, `in: body`, `responses.*.schema`).

pub mod registry;
pub mod resolve;

pub use registry::{DedupKey, SchemaRegistry};

use crate::error::{Error, Result};
use crate::parser::SpecFormat;
use crate::records::{OperationRecord, SchemaRecord, UsageRef};
use resolve::Resolved;
use serde_json::{Map, Value};

const METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// A parsed, reference-validated specification
#[derive(Debug, Clone)]
pub struct SpecFile {
    file_path: String,
    file_name: String,
    root: Value,
}

impl SpecFile {
    /// Parse a candidate file. Returns `Ok(None)` when the document is valid
    /// JSON/YAML but not an API specification.
    pub fn from_bytes(
        file_path: impl Into<String>,
        file_name: impl Into<String>,
        format: SpecFormat,
        bytes: &[u8],
    ) -> Result<Option<Self>> {
        let file_path = file_path.into();

        let root: Value = match format {
            SpecFormat::Json => {
                serde_json::from_slice(bytes).map_err(|e| Error::parse(file_path.clone(), e))?
            }
            SpecFormat::Yaml => {
                let yaml: serde_yaml::Value =
                    serde_yaml::from_slice(bytes).map_err(|e| Error::parse(file_path.clone(), e))?;
                serde_json::to_value(yaml).map_err(|e| Error::parse(file_path.clone(), e))?
            }
        };

        let is_spec = root
            .as_object()
            .is_some_and(|o| o.contains_key("openapi") || o.contains_key("swagger"));
        if !is_spec {
            return Ok(None);
        }

        let external = resolve::validate(&root).map_err(|p| Error::parse(file_path.clone(), p))?;
        if external > 0 {
            tracing::debug!("{}: {} external references left unresolved", file_path, external);
        }

        Ok(Some(SpecFile {
            file_path,
            file_name: file_name.into(),
            root,
        }))
    }

    /// Extract operations and feed schemas into `registry`
    pub fn extract(&self, registry: &mut SchemaRegistry) -> Vec<OperationRecord> {
        self.extract_components(registry);

        let mut operations = Vec::new();
        let Some(paths) = self.root.get("paths").and_then(Value::as_object) else {
            return operations;
        };

        for (api_path, item) in paths {
            let Some(item) = self.resolve(item).and_then(|r| r.value.as_object()) else {
                continue;
            };
            let shared_params = item.get("parameters");

            for method in METHODS {
                let Some(operation) = item.get(*method).and_then(Value::as_object) else {
                    continue;
                };
                let parameters = self.merge_parameters(shared_params, operation.get("parameters"));
                let record = self.operation_record(api_path, method, operation, &parameters);

                let usage = UsageRef {
                    api_path: api_path.clone(),
                    method: record.method.clone(),
                    operation_id: record.operation_id.clone(),
                };
                for schema in self.operation_schemas(operation, &parameters) {
                    self.observe(registry, schema, Some(usage.clone()));
                }

                operations.push(record);
            }
        }

        operations
    }

    fn resolve<'a>(&'a self, value: &'a Value) -> Option<Resolved<'a>> {
        resolve::resolve(&self.root, value)
    }

    /// Named top-level schemas, extracted once without usage context
    fn extract_components(&self, registry: &mut SchemaRegistry) {
        let components = self
            .root
            .pointer("/components/schemas")
            .or_else(|| self.root.get("definitions"))
            .and_then(Value::as_object);

        let Some(components) = components else {
            return;
        };

        let prefix = if self.root.pointer("/components/schemas").is_some() {
            "#/components/schemas/"
        } else {
            "#/definitions/"
        };

        for (name, schema) in components {
            let origin = format!("{}{}", prefix, name);
            let key = DedupKey::Name(name.clone());
            registry.observe(key, None, || {
                self.schema_record(Some(name.as_str()), schema, Some(&origin))
            });
        }
    }

    fn observe(&self, registry: &mut SchemaRegistry, schema: &Value, usage: Option<UsageRef>) {
        let Some(candidate) = self.schema_candidate(schema) else {
            return;
        };

        let name = candidate.via.and_then(resolve::schema_name);
        if name.is_none() && is_primitive(candidate.value) {
            return;
        }

        match name {
            Some(name) => {
                let key = DedupKey::Name(name.to_string());
                registry.observe(key, usage, || {
                    self.schema_record(Some(name), candidate.value, candidate.via)
                });
            }
            None => {
                let record = self.schema_record(None, candidate.value, candidate.via);
                let key = DedupKey::Hash(resolve::structural_hash(&record.schema_definition));
                registry.observe(key, usage, || record);
            }
        }
    }

    /// The schema to record for a usage site. Arrays of a named schema
    /// contribute the item schema.
    fn schema_candidate<'a>(&'a self, schema: &'a Value) -> Option<Resolved<'a>> {
        let resolved = self.resolve(schema)?;

        if resolved.via.and_then(resolve::schema_name).is_none() {
            if let Some(items) = resolved.value.get("items") {
                if let Some(item) = self.resolve(items) {
                    if item.via.and_then(resolve::schema_name).is_some() {
                        return Some(item);
                    }
                }
            }
        }

        Some(resolved)
    }

    fn schema_record(&self, name: Option<&str>, schema: &Value, via: Option<&str>) -> SchemaRecord {
        let inlined = resolve::inline(&self.root, schema, via);
        let schema_definition = inlined.to_string();

        let title = text_field(&inlined, "title");
        let description = text_field(&inlined, "description");
        let content = schema_content(name, title.as_deref(), description.as_deref(), &inlined);

        SchemaRecord {
            file_path: self.file_path.clone(),
            file_name: self.file_name.clone(),
            schema_name: name.map(str::to_string),
            title,
            description,
            content,
            schema_definition,
            used_by: Vec::new(),
        }
    }

    /// Path-level parameters overlaid by operation-level ones (`name` + `in`)
    fn merge_parameters<'a>(
        &'a self,
        shared: Option<&'a Value>,
        own: Option<&'a Value>,
    ) -> Vec<&'a Map<String, Value>> {
        let mut merged: Vec<&Map<String, Value>> = Vec::new();

        for list in [shared, own].into_iter().flatten() {
            let Some(items) = list.as_array() else {
                continue;
            };
            for param in items {
                let Some(param) = self.resolve(param).and_then(|r| r.value.as_object()) else {
                    continue;
                };
                let identity = (param.get("name"), param.get("in"));
                merged.retain(|p| (p.get("name"), p.get("in")) != identity);
                merged.push(param);
            }
        }

        merged
    }

    fn operation_record(
        &self,
        api_path: &str,
        method: &str,
        operation: &Map<String, Value>,
        parameters: &[&Map<String, Value>],
    ) -> OperationRecord {
        let summary = str_field(operation, "summary");
        let description = str_field(operation, "description");
        let operation_id = str_field(operation, "operationId");

        let mut lines: Vec<String> = Vec::new();
        lines.extend(summary.clone());
        lines.extend(description.clone());

        let tags: Vec<&str> = operation
            .get("tags")
            .and_then(Value::as_array)
            .map(|t| t.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        if !tags.is_empty() {
            lines.push(format!("tags: {}", tags.join(", ")));
        }
        if let Some(id) = &operation_id {
            lines.push(format!("operationId: {}", id));
        }
        if !parameters.is_empty() {
            lines.push("parameters:".to_string());
            for param in parameters {
                let name = param.get("name").and_then(Value::as_str).unwrap_or("");
                let location = param.get("in").and_then(Value::as_str).unwrap_or("");
                match param.get("description").and_then(Value::as_str) {
                    Some(desc) => lines.push(format!("  {} ({}): {}", name, location, desc.trim())),
                    None => lines.push(format!("  {} ({})", name, location)),
                }
            }
        }

        OperationRecord {
            file_path: self.file_path.clone(),
            file_name: self.file_name.clone(),
            api_path: api_path.to_string(),
            method: method.to_uppercase(),
            operation_id,
            summary,
            description,
            content: lines.join("\n"),
        }
    }

    /// Schemas referenced from the request body, responses, and parameters
    fn operation_schemas<'a>(
        &'a self,
        operation: &'a Map<String, Value>,
        parameters: &[&'a Map<String, Value>],
    ) -> Vec<&'a Value> {
        let mut schemas = Vec::new();

        if let Some(body) = operation.get("requestBody").and_then(|b| self.resolve(b)) {
            schemas.extend(media_schemas(body.value));
        }

        if let Some(responses) = operation.get("responses").and_then(Value::as_object) {
            for response in responses.values() {
                let Some(response) = self.resolve(response) else {
                    continue;
                };
                schemas.extend(media_schemas(response.value));
                // Swagger 2.0
                schemas.extend(response.value.get("schema"));
            }
        }

        for param in parameters {
            schemas.extend(param.get("schema"));
            schemas.extend(param.get("content").map(media_schemas).into_iter().flatten());
        }

        schemas
    }
}

/// `content.<media type>.schema` values of a request body or response
fn media_schemas(value: &Value) -> Vec<&Value> {
    let content = value.get("content").and_then(Value::as_object);
    content
        .into_iter()
        .flat_map(|media| media.values())
        .filter_map(|m| m.get("schema"))
        .collect()
}

fn is_primitive(schema: &Value) -> bool {
    const STRUCTURAL: &[&str] = &[
        "properties",
        "items",
        "allOf",
        "oneOf",
        "anyOf",
        "enum",
        "additionalProperties",
    ];
    match schema.as_object() {
        Some(map) => !STRUCTURAL.iter().any(|k| map.contains_key(*k)),
        None => true,
    }
}

fn str_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn text_field(value: &Value, key: &str) -> Option<String> {
    value.as_object().and_then(|m| str_field(m, key))
}

/// Line-oriented searchable text for a schema
fn schema_content(
    name: Option<&str>,
    title: Option<&str>,
    description: Option<&str>,
    inlined: &Value,
) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.extend(name.map(str::to_string));
    if let Some(title) = title {
        lines.push(format!("title: {}", title));
    }
    if let Some(description) = description {
        lines.push(format!("description: {}", description));
    }

    let properties = collect_properties(inlined);
    if !properties.is_empty() {
        lines.push("properties:".to_string());
        for (prop, desc) in properties {
            match desc {
                Some(desc) => lines.push(format!("  {}: {}", prop, desc)),
                None => lines.push(format!("  {}", prop)),
            }
        }
    }

    lines.join("\n")
}

/// Property names and descriptions from the schema and its composition members
fn collect_properties(inlined: &Value) -> Vec<(String, Option<String>)> {
    let mut found = Vec::new();
    let mut stack = vec![inlined];

    while let Some(schema) = stack.pop() {
        if let Some(props) = schema.get("properties").and_then(Value::as_object) {
            for (prop, body) in props {
                let desc = text_field(body, "description").map(|d| d.replace('\n', " "));
                found.push((prop.clone(), desc));
            }
        }
        for composite in ["allOf", "oneOf", "anyOf"] {
            if let Some(members) = schema.get(composite).and_then(Value::as_array) {
                stack.extend(members.iter().rev());
            }
        }
    }

    found
}
