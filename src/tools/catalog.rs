//! Tool catalog — typed metadata, argument validation, schema generation.
//!
//! Owns tool *metadata* (not implementations — the router keeps the async
//! handlers). Arguments are validated against typed parameter definitions
//! before dispatch, and the same definitions render the JSON Schema that
//! `tools/list` advertises.

use crate::types::Error;
use serde_json::{json, Value};
use std::collections::HashMap;

// =============================================================================
// Parameter types
// =============================================================================

/// Parameter type for tool inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    String,
    Int,
    Bool,
    IntList,
    Enum(Vec<String>),
    /// Opaque JSON object, schema-checked by the handler (tenant context).
    Object,
    Optional(Box<ParamType>),
}

impl ParamType {
    /// Validate a JSON value against this parameter type.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        match self {
            ParamType::String => {
                if value.is_string() {
                    Ok(())
                } else {
                    Err(format!("expected string, got {}", value_type_name(value)))
                }
            }
            ParamType::Int => {
                if value.is_i64() || value.is_u64() {
                    Ok(())
                } else {
                    Err(format!("expected integer, got {}", value_type_name(value)))
                }
            }
            ParamType::Bool => {
                if value.is_boolean() {
                    Ok(())
                } else {
                    Err(format!("expected boolean, got {}", value_type_name(value)))
                }
            }
            ParamType::IntList => {
                if let Some(arr) = value.as_array() {
                    for (i, item) in arr.iter().enumerate() {
                        if !item.is_i64() && !item.is_u64() {
                            return Err(format!(
                                "expected integer at index {}, got {}",
                                i,
                                value_type_name(item)
                            ));
                        }
                    }
                    Ok(())
                } else {
                    Err(format!("expected array, got {}", value_type_name(value)))
                }
            }
            ParamType::Enum(variants) => {
                if let Some(s) = value.as_str() {
                    if variants.iter().any(|v| v == s) {
                        Ok(())
                    } else {
                        Err(format!(
                            "invalid enum value '{}', expected one of: {}",
                            s,
                            variants.join(", ")
                        ))
                    }
                } else {
                    Err(format!(
                        "expected string for enum, got {}",
                        value_type_name(value)
                    ))
                }
            }
            ParamType::Object => {
                if value.is_object() {
                    Ok(())
                } else {
                    Err(format!("expected object, got {}", value_type_name(value)))
                }
            }
            ParamType::Optional(inner) => {
                if value.is_null() {
                    Ok(())
                } else {
                    inner.validate(value)
                }
            }
        }
    }

    /// JSON Schema fragment for this parameter type.
    pub fn to_schema(&self) -> Value {
        match self {
            ParamType::String => json!({"type": "string"}),
            ParamType::Int => json!({"type": "integer"}),
            ParamType::Bool => json!({"type": "boolean"}),
            ParamType::IntList => json!({"type": "array", "items": {"type": "integer"}}),
            ParamType::Enum(variants) => json!({"type": "string", "enum": variants}),
            ParamType::Object => json!({"type": "object"}),
            ParamType::Optional(inner) => inner.to_schema(),
        }
    }
}

fn value_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Parameter and tool definitions
// =============================================================================

/// A single parameter definition for a tool.
#[derive(Debug, Clone)]
pub struct ParamDef {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    pub default: Option<Value>,
}

impl ParamDef {
    pub fn required(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            default: None,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: ParamType::Optional(Box::new(param_type)),
            description: description.into(),
            default: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none() && !matches!(self.param_type, ParamType::Optional(_))
    }
}

/// Complete tool metadata entry.
#[derive(Debug, Clone)]
pub struct ToolEntry {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamDef>,
}

impl ToolEntry {
    /// Render the MCP `inputSchema` object for this tool.
    pub fn to_input_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for param in &self.parameters {
            let mut schema = param.param_type.to_schema();
            if let Some(obj) = schema.as_object_mut() {
                obj.insert("description".to_string(), json!(param.description));
                if let Some(default) = &param.default {
                    obj.insert("default".to_string(), default.clone());
                }
            }
            properties.insert(param.name.clone(), schema);
            if param.is_required() {
                required.push(json!(param.name));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

// =============================================================================
// Tool catalog
// =============================================================================

/// In-memory tool catalog. Owns metadata, not implementations.
#[derive(Debug, Default)]
pub struct ToolCatalog {
    entries: HashMap<String, ToolEntry>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a tool entry.
    pub fn register(&mut self, entry: ToolEntry) -> crate::types::Result<()> {
        if entry.name.is_empty() {
            return Err(Error::validation("Tool name cannot be empty"));
        }
        self.entries.insert(entry.name.clone(), entry);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolEntry> {
        self.entries.get(name)
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// List all entries, sorted by name for stable tools/list output.
    pub fn list_entries(&self) -> Vec<&ToolEntry> {
        let mut entries: Vec<&ToolEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// Validate arguments against a tool's parameter definitions.
    ///
    /// Returns a list of validation errors (empty = valid).
    pub fn validate_args(&self, name: &str, args: &Value) -> crate::types::Result<Vec<String>> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| Error::not_found(format!("Unknown tool: {}", name)))?;

        let arg_map = args
            .as_object()
            .ok_or_else(|| Error::validation("Arguments must be a JSON object"))?;

        let mut errors = Vec::new();

        for param in &entry.parameters {
            if param.is_required() && !arg_map.contains_key(&param.name) {
                errors.push(format!("Missing required argument: {}", param.name));
            }
        }

        let known: HashMap<&str, &ParamDef> = entry
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p))
            .collect();

        for (key, value) in arg_map {
            if let Some(param) = known.get(key.as_str()) {
                if let Err(e) = param.param_type.validate(value) {
                    errors.push(format!("Argument '{}': {}", key, e));
                }
            } else {
                errors.push(format!("Unknown argument: {}", key));
            }
        }

        Ok(errors)
    }

    /// Fill in default values for missing optional arguments.
    pub fn fill_defaults(&self, name: &str, args: &mut Value) -> crate::types::Result<()> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| Error::not_found(format!("Unknown tool: {}", name)))?;

        if let Some(map) = args.as_object_mut() {
            for param in &entry.parameters {
                if !map.contains_key(&param.name) {
                    if let Some(default) = &param.default {
                        map.insert(param.name.clone(), default.clone());
                    }
                }
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> ToolEntry {
        ToolEntry {
            name: "search_companies".to_string(),
            description: "Search companies by name".to_string(),
            parameters: vec![
                ParamDef::required("search", ParamType::String, "Name substring to match"),
                ParamDef::optional("limit", ParamType::Int, "Maximum results")
                    .with_default(json!(25)),
            ],
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut catalog = ToolCatalog::new();
        catalog.register(sample_entry()).unwrap();

        assert!(catalog.has_tool("search_companies"));
        assert!(!catalog.has_tool("nonexistent"));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_register_empty_name_fails() {
        let mut catalog = ToolCatalog::new();
        let mut entry = sample_entry();
        entry.name = String::new();
        assert!(catalog.register(entry).is_err());
    }

    #[test]
    fn test_validate_args_valid() {
        let mut catalog = ToolCatalog::new();
        catalog.register(sample_entry()).unwrap();

        let args = json!({"search": "Acme"});
        let errors = catalog.validate_args("search_companies", &args).unwrap();
        assert!(errors.is_empty(), "Expected no errors, got: {:?}", errors);
    }

    #[test]
    fn test_validate_args_missing_required() {
        let mut catalog = ToolCatalog::new();
        catalog.register(sample_entry()).unwrap();

        let errors = catalog
            .validate_args("search_companies", &json!({}))
            .unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Missing required argument: search"));
    }

    #[test]
    fn test_validate_args_wrong_type_and_unknown() {
        let mut catalog = ToolCatalog::new();
        catalog.register(sample_entry()).unwrap();

        let args = json!({"search": 42, "bogus": true});
        let errors = catalog.validate_args("search_companies", &args).unwrap();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.contains("expected string")));
        assert!(errors.iter().any(|e| e.contains("Unknown argument: bogus")));
    }

    #[test]
    fn test_fill_defaults_no_overwrite() {
        let mut catalog = ToolCatalog::new();
        catalog.register(sample_entry()).unwrap();

        let mut args = json!({"search": "Acme"});
        catalog.fill_defaults("search_companies", &mut args).unwrap();
        assert_eq!(args["limit"], 25);

        let mut args = json!({"search": "Acme", "limit": 5});
        catalog.fill_defaults("search_companies", &mut args).unwrap();
        assert_eq!(args["limit"], 5);
    }

    #[test]
    fn test_input_schema_shape() {
        let schema = sample_entry().to_input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["search"]["type"], "string");
        assert_eq!(schema["properties"]["limit"]["default"], 25);
        assert_eq!(schema["required"], json!(["search"]));
    }

    #[test]
    fn test_int_list_validation() {
        let pt = ParamType::IntList;
        assert!(pt.validate(&json!([1, 2])).is_ok());
        assert!(pt.validate(&json!(["a"])).is_err());
        assert!(pt.validate(&json!("not array")).is_err());
    }

    #[test]
    fn test_enum_validation() {
        let pt = ParamType::Enum(vec!["company".to_string(), "resource".to_string()]);
        assert!(pt.validate(&json!("company")).is_ok());
        assert!(pt.validate(&json!("ticket")).is_err());
        assert!(pt.validate(&json!(3)).is_err());
    }
}
