//! Tool descriptors, argument schemas and the tool-level error taxonomy.

pub use rmcp::model::{JsonObject, Tool};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::mcp::BackendError;
use crate::model::FailureKind;

/// Errors produced while handling one tool request.
///
/// None of these end a run: the registry turns them into failed tool results.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for `{tool}`: {reason}")]
    Validation { tool: String, reason: String },

    #[error("`{tool}` failed: {source}")]
    Execution {
        tool: String,
        #[source]
        source: BackendError,
    },
}

impl ToolError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ToolError::UnknownTool(_) => FailureKind::UnknownTool,
            ToolError::Validation { .. } => FailureKind::Validation,
            ToolError::Execution { .. } => FailureKind::Execution,
        }
    }
}

/// A catalog entry that could not be turned into a descriptor.
#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("tool has no name")]
    MissingName,
    #[error("input schema must describe an object, found type `{0}`")]
    NotAnObject(String),
    #[error("`properties` must be an object")]
    BadProperties,
    #[error("`required` must be an array of strings")]
    BadRequired,
    #[error("parameter `{param}` has unsupported type `{kind}`")]
    UnknownType { param: String, kind: String },
}

/// JSON type accepted by a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Null,
    /// No usable type information; anything goes.
    Any,
}

impl ParamKind {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "string" => ParamKind::String,
            "integer" => ParamKind::Integer,
            "number" => ParamKind::Number,
            "boolean" => ParamKind::Boolean,
            "array" => ParamKind::Array,
            "object" => ParamKind::Object,
            "null" => ParamKind::Null,
            _ => return None,
        })
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            ParamKind::Any => true,
            ParamKind::String => value.is_string(),
            // Whole floats such as `3.0` do not count.
            ParamKind::Integer => value.is_i64() || value.is_u64(),
            ParamKind::Number => value.is_number(),
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::Array => value.is_array(),
            ParamKind::Object => value.is_object(),
            ParamKind::Null => value.is_null(),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
            ParamKind::Array => "array",
            ParamKind::Object => "object",
            ParamKind::Null => "null",
            ParamKind::Any => "any",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub kinds: Vec<ParamKind>,
    pub required: bool,
    pub description: Option<String>,
}

/// The subset of a JSON schema the registry checks arguments against.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InputSchema {
    pub params: BTreeMap<String, ParamSpec>,
}

impl InputSchema {
    pub fn parse(schema: &JsonObject) -> Result<Self, SchemaError> {
        match schema.get("type") {
            None => {}
            Some(Value::String(kind)) if kind == "object" => {}
            Some(Value::String(kind)) => return Err(SchemaError::NotAnObject(kind.clone())),
            Some(other) => return Err(SchemaError::NotAnObject(other.to_string())),
        }

        let mut params = BTreeMap::new();
        match schema.get("properties") {
            None => {}
            Some(Value::Object(properties)) => {
                for (name, property) in properties {
                    params.insert(name.clone(), parse_property(name, property)?);
                }
            }
            Some(_) => return Err(SchemaError::BadProperties),
        }

        match schema.get("required") {
            None => {}
            Some(Value::Array(names)) => {
                for name in names {
                    let name = name.as_str().ok_or(SchemaError::BadRequired)?;
                    params
                        .entry(name.to_string())
                        .or_insert_with(|| ParamSpec {
                            kinds: vec![ParamKind::Any],
                            required: false,
                            description: None,
                        })
                        .required = true;
                }
            }
            Some(_) => return Err(SchemaError::BadRequired),
        }

        Ok(Self { params })
    }

    /// Check `arguments` and return them as an object ready to send to the back end.
    ///
    /// `null` stands for "no arguments". Keys the schema does not mention are passed through.
    pub fn validate(&self, arguments: &Value) -> Result<JsonObject, String> {
        let args = match arguments {
            Value::Null => JsonObject::new(),
            Value::Object(map) => map.clone(),
            Value::String(raw) => {
                return Err(format!("arguments are not a JSON object: {}", raw));
            }
            other => {
                return Err(format!(
                    "arguments must be a JSON object, got {}",
                    type_label(other)
                ));
            }
        };

        for (name, spec) in &self.params {
            match args.get(name) {
                None if spec.required => {
                    return Err(format!("missing required argument `{}`", name));
                }
                None => {}
                Some(Value::Null) if !spec.required => {}
                Some(value) => {
                    if !spec.kinds.iter().any(|kind| kind.accepts(value)) {
                        let expected = spec
                            .kinds
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(" or ");
                        return Err(format!(
                            "argument `{}` must be {}, got {}",
                            name,
                            expected,
                            type_label(value)
                        ));
                    }
                }
            }
        }

        Ok(args)
    }
}

fn parse_property(name: &str, property: &Value) -> Result<ParamSpec, SchemaError> {
    let property = match property {
        Value::Object(property) => property,
        // `true` is the schema that accepts anything.
        _ => {
            return Ok(ParamSpec {
                kinds: vec![ParamKind::Any],
                required: false,
                description: None,
            })
        }
    };

    let mut kinds = Vec::new();
    collect_kinds(name, property, &mut kinds)?;
    if kinds.is_empty() {
        kinds.push(ParamKind::Any);
    }

    Ok(ParamSpec {
        kinds,
        required: false,
        description: property
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn collect_kinds(
    name: &str,
    schema: &JsonObject,
    kinds: &mut Vec<ParamKind>,
) -> Result<(), SchemaError> {
    let mut push = |kind: &str| -> Result<(), SchemaError> {
        let parsed = ParamKind::parse(kind).ok_or_else(|| SchemaError::UnknownType {
            param: name.to_string(),
            kind: kind.to_string(),
        })?;
        if !kinds.contains(&parsed) {
            kinds.push(parsed);
        }
        Ok(())
    };

    match schema.get("type") {
        Some(Value::String(kind)) => push(kind)?,
        Some(Value::Array(list)) => {
            for kind in list {
                match kind.as_str() {
                    Some(kind) => push(kind)?,
                    None => {
                        return Err(SchemaError::UnknownType {
                            param: name.to_string(),
                            kind: kind.to_string(),
                        })
                    }
                }
            }
        }
        _ => {}
    }

    for key in ["anyOf", "oneOf"] {
        if let Some(Value::Array(variants)) = schema.get(key) {
            for variant in variants {
                let mut variant_kinds = Vec::new();
                if let Value::Object(variant) = variant {
                    collect_kinds(name, variant, &mut variant_kinds)?;
                }
                if variant_kinds.is_empty() {
                    variant_kinds.push(ParamKind::Any);
                }
                for kind in variant_kinds {
                    if !kinds.contains(&kind) {
                        kinds.push(kind);
                    }
                }
            }
        }
    }

    // A variant without its own type (e.g. a `$ref`) makes the whole union permissive.
    if kinds.contains(&ParamKind::Any) {
        kinds.clear();
        kinds.push(ParamKind::Any);
    }
    Ok(())
}

fn type_label(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
    .to_string()
}

/// A tool as advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
    /// The schema exactly as the back end reported it; forwarded to the model.
    pub parameters: JsonObject,
}

impl TryFrom<&Tool> for ToolDescriptor {
    type Error = SchemaError;

    fn try_from(tool: &Tool) -> Result<Self, Self::Error> {
        if tool.name.trim().is_empty() {
            return Err(SchemaError::MissingName);
        }
        let parameters = (*tool.input_schema).clone();
        Ok(Self {
            name: tool.name.to_string(),
            description: tool
                .description
                .as_ref()
                .map(|d| d.to_string())
                .unwrap_or_default(),
            input_schema: InputSchema::parse(&parameters)?,
            parameters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn object(value: Value) -> JsonObject {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn gmail_schema() -> InputSchema {
        InputSchema::parse(&object(json!({
            "type": "object",
            "properties": {
                "max_results": { "type": "integer", "default": 10 },
                "query": { "type": ["string", "null"] },
                "label": { "anyOf": [{ "type": "string" }, { "type": "null" }] }
            }
        })))
        .unwrap()
    }

    #[test]
    fn test_parse_collects_types_and_required() {
        let schema = InputSchema::parse(&object(json!({
            "type": "object",
            "properties": {
                "username": { "type": "string", "description": "Instagram handle" }
            },
            "required": ["username"]
        })))
        .unwrap();

        let username = &schema.params["username"];
        assert!(username.required);
        assert_eq!(username.kinds, vec![ParamKind::String]);
        assert_eq!(username.description.as_deref(), Some("Instagram handle"));

        let gmail = gmail_schema();
        assert_eq!(gmail.params["query"].kinds, vec![ParamKind::String, ParamKind::Null]);
        assert_eq!(gmail.params["label"].kinds, vec![ParamKind::String, ParamKind::Null]);
        assert!(!gmail.params["max_results"].required);
    }

    #[test]
    fn test_parse_rejects_malformed_schemas() {
        assert_eq!(
            InputSchema::parse(&object(json!({ "type": "string" }))),
            Err(SchemaError::NotAnObject("string".into()))
        );
        assert_eq!(
            InputSchema::parse(&object(json!({ "properties": [] }))),
            Err(SchemaError::BadProperties)
        );
        assert_eq!(
            InputSchema::parse(&object(json!({ "required": "username" }))),
            Err(SchemaError::BadRequired)
        );
        assert!(matches!(
            InputSchema::parse(&object(json!({ "properties": { "x": { "type": "datetime" } } }))),
            Err(SchemaError::UnknownType { .. })
        ));
    }

    #[test]
    fn test_untyped_property_accepts_anything() {
        let schema = InputSchema::parse(&object(json!({
            "properties": { "filter": { "$ref": "#/definitions/Filter" } }
        })))
        .unwrap();
        assert_eq!(schema.params["filter"].kinds, vec![ParamKind::Any]);
        assert!(schema.validate(&json!({ "filter": [1, 2] })).is_ok());
    }

    #[test]
    fn test_validate_accepts_matching_arguments() {
        let schema = gmail_schema();
        let args = schema
            .validate(&json!({ "max_results": 3, "query": null }))
            .unwrap();
        assert_eq!(args.get("max_results"), Some(&json!(3)));
        assert!(schema.validate(&json!({ "max_results": 3.0 })).is_err());
        assert!(schema.validate(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_validate_rejects_type_mismatch_and_missing_required() {
        let schema = gmail_schema();
        let err = schema.validate(&json!({ "max_results": "three" })).unwrap_err();
        assert!(err.contains("max_results"), "{}", err);
        assert!(schema.validate(&json!({ "max_results": 2.5 })).is_err());
        assert!(schema.validate(&json!("{not json")).is_err());
        assert!(schema.validate(&json!([1])).is_err());

        let profile = InputSchema::parse(&object(json!({
            "properties": { "username": { "type": "string" } },
            "required": ["username"]
        })))
        .unwrap();
        let err = profile.validate(&json!({})).unwrap_err();
        assert_eq!(err, "missing required argument `username`");
        assert!(profile.validate(&json!({ "username": null })).is_err());
    }

    #[test]
    fn test_descriptor_from_tool() {
        let tool = Tool::new(
            "get_instagram_profile",
            "Retrieve Instagram profile information.",
            Arc::new(object(json!({
                "type": "object",
                "properties": { "username": { "type": "string" } },
                "required": ["username"]
            }))),
        );
        let descriptor = ToolDescriptor::try_from(&tool).unwrap();
        assert_eq!(descriptor.name, "get_instagram_profile");
        assert!(descriptor.input_schema.params["username"].required);
        assert_eq!(descriptor.parameters, *tool.input_schema);

        let nameless = Tool::new("", "broken", Arc::new(JsonObject::new()));
        assert_eq!(
            ToolDescriptor::try_from(&nameless),
            Err(SchemaError::MissingName)
        );
    }
}
