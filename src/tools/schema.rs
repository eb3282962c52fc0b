//! Input schemas for tool arguments.
//!
//! Each tool enumerates the argument keys it accepts, their types, bounds,
//! and defaults. Validation happens once, at the dispatcher boundary, so
//! handlers work with an argument map that is complete (defaults applied)
//! and well-typed. The same schema renders to JSON Schema for `tools/list`.

use serde_json::{Map, Value};

/// Argument value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Boolean,
}

impl FieldKind {
    fn as_json_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
        }
    }
}

/// One accepted argument key.
#[derive(Debug, Clone)]
pub struct Field {
    name: &'static str,
    kind: FieldKind,
    description: &'static str,
    required: bool,
    default: Option<Value>,
    min: Option<i64>,
    max: Option<i64>,
    allowed: Option<&'static [&'static str]>,
}

impl Field {
    /// A string-valued argument.
    #[must_use]
    pub fn string(name: &'static str, description: &'static str) -> Self {
        Self::new(name, FieldKind::String, description)
    }

    /// An integer-valued argument.
    #[must_use]
    pub fn integer(name: &'static str, description: &'static str) -> Self {
        Self::new(name, FieldKind::Integer, description)
    }

    /// A boolean-valued argument.
    #[must_use]
    pub fn boolean(name: &'static str, description: &'static str) -> Self {
        Self::new(name, FieldKind::Boolean, description)
    }

    fn new(name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            required: false,
            default: None,
            min: None,
            max: None,
            allowed: None,
        }
    }

    /// Marks the argument as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the value applied when the caller omits the argument.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets inclusive integer bounds.
    #[must_use]
    pub fn bounds(mut self, min: i64, max: i64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Restricts a string argument to an enumerated set of values.
    #[must_use]
    pub fn one_of(mut self, allowed: &'static [&'static str]) -> Self {
        self.allowed = Some(allowed);
        self
    }

    /// Validates one provided value, returning a violation message on
    /// rejection.
    fn check(&self, value: &Value) -> Result<(), String> {
        match self.kind {
            FieldKind::String => {
                let Some(s) = value.as_str() else {
                    return Err(format!("{} must be a string", self.name));
                };
                if let Some(allowed) = self.allowed {
                    if !allowed.contains(&s) {
                        return Err(format!(
                            "{} must be one of: {}",
                            self.name,
                            allowed.join(", ")
                        ));
                    }
                }
                if s.is_empty() {
                    return Err(format!("{} must not be empty", self.name));
                }
            }
            FieldKind::Integer => {
                let Some(n) = value.as_i64() else {
                    return Err(format!("{} must be an integer", self.name));
                };
                if let Some(min) = self.min {
                    if n < min {
                        return Err(format!("{} must be at least {min}", self.name));
                    }
                }
                if let Some(max) = self.max {
                    if n > max {
                        return Err(format!("{} must be at most {max}", self.name));
                    }
                }
            }
            FieldKind::Boolean => {
                if !value.is_boolean() {
                    return Err(format!("{} must be a boolean", self.name));
                }
            }
        }
        Ok(())
    }

    fn to_json_schema(&self) -> Value {
        let mut spec = Map::new();
        spec.insert(
            "type".to_string(),
            Value::String(self.kind.as_json_type().to_string()),
        );
        spec.insert(
            "description".to_string(),
            Value::String(self.description.to_string()),
        );
        if let Some(default) = &self.default {
            spec.insert("default".to_string(), default.clone());
        }
        if let Some(min) = self.min {
            spec.insert("minimum".to_string(), Value::from(min));
        }
        if let Some(max) = self.max {
            spec.insert("maximum".to_string(), Value::from(max));
        }
        if let Some(allowed) = self.allowed {
            spec.insert(
                "enum".to_string(),
                Value::Array(allowed.iter().map(|v| Value::String((*v).to_string())).collect()),
            );
        }
        Value::Object(spec)
    }
}

/// Enumerated argument schema for one tool.
#[derive(Debug, Clone, Default)]
pub struct InputSchema {
    fields: Vec<Field>,
}

impl InputSchema {
    /// A schema accepting no arguments.
    #[must_use]
    pub fn empty() -> Self {
        Self { fields: Vec::new() }
    }

    /// Creates a schema from its fields.
    #[must_use]
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Validates an argument map against the schema.
    ///
    /// On success returns the map with defaults applied for omitted
    /// optional fields. On failure returns every violation, so the caller
    /// can enumerate them in one error report.
    pub fn validate(&self, args: &Map<String, Value>) -> Result<Map<String, Value>, Vec<String>> {
        let mut violations = Vec::new();
        let mut validated = Map::new();

        for (key, value) in args {
            match self.fields.iter().find(|f| f.name == key.as_str()) {
                Some(field) => {
                    if let Err(violation) = field.check(value) {
                        violations.push(violation);
                    } else {
                        validated.insert(key.clone(), value.clone());
                    }
                }
                None => violations.push(format!("{key} is not an accepted argument")),
            }
        }

        for field in &self.fields {
            if validated.contains_key(field.name) {
                continue;
            }
            if args.contains_key(field.name) {
                // Present but invalid; already reported.
                continue;
            }
            if field.required {
                violations.push(format!("{} is required", field.name));
            } else if let Some(default) = &field.default {
                validated.insert(field.name.to_string(), default.clone());
            }
        }

        if violations.is_empty() {
            Ok(validated)
        } else {
            Err(violations)
        }
    }

    /// Renders the schema as JSON Schema for tool discovery.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in &self.fields {
            properties.insert(field.name.to_string(), field.to_json_schema());
            if field.required {
                required.push(Value::String(field.name.to_string()));
            }
        }

        let mut schema = Map::new();
        schema.insert("type".to_string(), Value::String("object".to_string()));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), Value::Array(required));
        }
        schema.insert("additionalProperties".to_string(), Value::Bool(false));
        Value::Object(schema)
    }
}

/// Reads an optional string argument from a validated map.
#[must_use]
pub fn opt_str(args: &Map<String, Value>, name: &str) -> Option<String> {
    args.get(name).and_then(Value::as_str).map(str::to_string)
}

/// Reads an optional integer argument from a validated map.
#[must_use]
pub fn opt_i64(args: &Map<String, Value>, name: &str) -> Option<i64> {
    args.get(name).and_then(Value::as_i64)
}

/// Reads a required string argument. The schema guarantees presence; the
/// error is a backstop for handlers wired to the wrong schema.
pub fn req_str(args: &Map<String, Value>, name: &str) -> crate::error::GatewayResult<String> {
    opt_str(args, name)
        .ok_or_else(|| crate::error::GatewayError::schema(name, "is required".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn device_schema() -> InputSchema {
        InputSchema::new(vec![
            Field::string("device_serial", "Device serial number").required(),
            Field::integer("limit", "Maximum entries").default_value(50).bounds(1, 1000),
            Field::string("device_type", "Filter by device type")
                .one_of(&["ap", "switch", "gateway"]),
            Field::boolean("detailed", "Include per-radio detail"),
        ])
    }

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_valid_args_pass_with_defaults() {
        let schema = device_schema();
        let validated = schema
            .validate(&map(json!({"device_serial": "CN123"})))
            .unwrap();
        assert_eq!(validated["device_serial"], "CN123");
        assert_eq!(validated["limit"], 50);
        assert!(!validated.contains_key("detailed"));
    }

    #[test]
    fn test_explicit_value_overrides_default() {
        let schema = device_schema();
        let validated = schema
            .validate(&map(json!({"device_serial": "CN123", "limit": 10})))
            .unwrap();
        assert_eq!(validated["limit"], 10);
    }

    #[test]
    fn test_missing_required_rejected() {
        let schema = device_schema();
        let violations = schema.validate(&map(json!({}))).unwrap_err();
        assert_eq!(violations, vec!["device_serial is required"]);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let schema = device_schema();
        let violations = schema
            .validate(&map(json!({"device_serial": "CN123", "bogus": 1})))
            .unwrap_err();
        assert!(violations.iter().any(|v| v.contains("bogus")));
    }

    #[test]
    fn test_type_and_bound_violations_enumerated() {
        let schema = device_schema();
        let violations = schema
            .validate(&map(json!({
                "device_serial": 42,
                "limit": 5000,
                "device_type": "router",
            })))
            .unwrap_err();
        assert_eq!(violations.len(), 3);
        assert!(violations.iter().any(|v| v.contains("must be a string")));
        assert!(violations.iter().any(|v| v.contains("at most 1000")));
        assert!(violations.iter().any(|v| v.contains("one of")));
    }

    #[test]
    fn test_bounds_inclusive() {
        let schema = device_schema();
        assert!(schema
            .validate(&map(json!({"device_serial": "CN1", "limit": 1})))
            .is_ok());
        assert!(schema
            .validate(&map(json!({"device_serial": "CN1", "limit": 1000})))
            .is_ok());
        assert!(schema
            .validate(&map(json!({"device_serial": "CN1", "limit": 0})))
            .is_err());
    }

    #[test]
    fn test_json_schema_rendering() {
        let schema = device_schema().to_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["limit"]["type"], "integer");
        assert_eq!(schema["properties"]["limit"]["default"], 50);
        assert_eq!(schema["properties"]["limit"]["maximum"], 1000);
        assert_eq!(schema["properties"]["device_type"]["enum"][0], "ap");
        assert_eq!(schema["required"][0], "device_serial");
        assert_eq!(schema["additionalProperties"], false);
    }

    #[test]
    fn test_empty_schema_rejects_everything_but_empty() {
        let schema = InputSchema::empty();
        assert!(schema.validate(&map(json!({}))).is_ok());
        assert!(schema.validate(&map(json!({"x": 1}))).is_err());
    }
}
