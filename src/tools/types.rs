//! Tool parameter schemas and the declarations sent to the gateway.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// JSON Schema describing the arguments a tool accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolParameters {
    pub schema: Value,
}

impl ToolParameters {
    /// Wrap a raw JSON Schema value.
    pub fn from_schema(schema: Value) -> Self {
        Self { schema }
    }

    /// Schema for a tool that takes no arguments.
    pub fn empty() -> Self {
        Self::object().build()
    }

    /// Start an object schema.
    pub fn object() -> ParameterBuilder {
        ParameterBuilder::default()
    }
}

impl Default for ToolParameters {
    fn default() -> Self {
        Self::empty()
    }
}

/// Builder for object-shaped parameter schemas.
#[derive(Debug, Default)]
pub struct ParameterBuilder {
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl ParameterBuilder {
    fn property(mut self, name: impl Into<String>, schema: Value, required: bool) -> Self {
        let name = name.into();
        if required && !self.required.contains(&name) {
            self.required.push(name.clone());
        }
        self.properties.insert(name, schema);
        self
    }

    pub fn string(self, name: impl Into<String>, description: &str, required: bool) -> Self {
        self.property(name, json!({"type": "string", "description": description}), required)
    }

    pub fn integer(self, name: impl Into<String>, description: &str, required: bool) -> Self {
        self.property(name, json!({"type": "integer", "description": description}), required)
    }

    pub fn number(self, name: impl Into<String>, description: &str, required: bool) -> Self {
        self.property(name, json!({"type": "number", "description": description}), required)
    }

    pub fn boolean(self, name: impl Into<String>, description: &str, required: bool) -> Self {
        self.property(name, json!({"type": "boolean", "description": description}), required)
    }

    pub fn string_enum(
        self,
        name: impl Into<String>,
        description: &str,
        values: &[&str],
        required: bool,
    ) -> Self {
        self.property(
            name,
            json!({"type": "string", "description": description, "enum": values}),
            required,
        )
    }

    /// Add a property with a caller-supplied schema.
    pub fn custom(self, name: impl Into<String>, schema: Value, required: bool) -> Self {
        self.property(name, schema, required)
    }

    pub fn build(self) -> ToolParameters {
        ToolParameters {
            schema: json!({
                "type": "object",
                "properties": self.properties,
                "required": self.required,
            }),
        }
    }
}

/// Tool declaration sent to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_fields_are_listed_once() {
        let params = ToolParameters::object()
            .string("city", "City name", true)
            .string("city", "City name, again", true)
            .integer("days", "Forecast length", false)
            .build();
        assert_eq!(params.schema["required"], json!(["city"]));
        assert_eq!(params.schema["properties"]["days"]["type"], "integer");
    }

    #[test]
    fn empty_schema_is_an_object_without_properties() {
        let params = ToolParameters::empty();
        assert_eq!(params.schema["type"], "object");
        assert!(params.schema["properties"]
            .as_object()
            .is_some_and(|p| p.is_empty()));
    }
}
