//! Tool call arguments as produced by the model.

use std::borrow::Cow;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::SwarmError;

/// Opaque argument payload handed to a tool.
///
/// The registry never inspects it. Accessors here are conveniences for tool
/// authors; a JSON string payload (argument text the gateway could not parse)
/// is decoded on first typed access.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolArguments {
    raw: Value,
}

impl ToolArguments {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    /// The payload exactly as the model sent it.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    fn object(&self) -> Result<Value, SwarmError> {
        match &self.raw {
            Value::String(text) if text.trim().is_empty() => Ok(Value::Object(Default::default())),
            Value::String(text) => serde_json::from_str(text.trim()).map_err(|e| {
                SwarmError::InvalidArgument(format!("arguments are not valid JSON: {e}"))
            }),
            Value::Null => Ok(Value::Object(Default::default())),
            other => Ok(other.clone()),
        }
    }

    /// Deserialize the whole payload into `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, SwarmError> {
        serde_json::from_value(self.object()?)
            .map_err(|e| SwarmError::InvalidArgument(format!("failed to deserialize arguments: {e}")))
    }

    /// Deserialize a single field.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, SwarmError> {
        self.get_opt(key)?
            .ok_or_else(|| SwarmError::InvalidArgument(format!("missing argument '{key}'")))
    }

    /// Deserialize a single field if present and not null.
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SwarmError> {
        let object = self.object()?;
        match object.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
                SwarmError::InvalidArgument(format!("argument '{key}' has the wrong type: {e}"))
            }),
        }
    }

    /// A string field. Borrowed from object payloads; decoded and owned when
    /// the payload is unparsed argument text.
    pub fn get_str(&self, key: &str) -> Option<Cow<'_, str>> {
        if let Value::String(_) = self.raw {
            let object = self.object().ok()?;
            return object.get(key)?.as_str().map(|s| Cow::Owned(s.to_string()));
        }
        self.raw.get(key).and_then(Value::as_str).map(Cow::Borrowed)
    }
}

/// Parse model-emitted argument text. Blank text is an empty object; text that
/// is not valid JSON is kept as a JSON string so the tool can see it.
pub fn parse_argument_text(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

impl From<Value> for ToolArguments {
    fn from(raw: Value) -> Self {
        Self::new(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn typed_access_on_object_payload() {
        let args = ToolArguments::new(json!({"city": "Oslo", "days": 3}));
        assert_eq!(args.get::<String>("city").expect("city"), "Oslo");
        assert_eq!(args.get::<u32>("days").expect("days"), 3);
        assert_eq!(args.get_opt::<u32>("hours").expect("optional"), None);
        assert!(args.get::<u32>("city").is_err());
        assert_eq!(args.get_str("city").as_deref(), Some("Oslo"));
    }

    #[test]
    fn string_payload_is_decoded_lazily() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Params {
            query: String,
        }
        let args = ToolArguments::new(json!("{\"query\": \"rust\"}"));
        let params: Params = args.deserialize().expect("deserialize");
        assert_eq!(params.query, "rust");
        assert_eq!(args.get_str("query").as_deref(), Some("rust"));
        assert_eq!(args.raw(), &json!("{\"query\": \"rust\"}"));
    }

    #[test]
    fn blank_and_null_payloads_are_empty_objects() {
        let blank = ToolArguments::new(json!("  "));
        assert_eq!(blank.get_opt::<String>("x").expect("blank"), None);
        let null = ToolArguments::new(Value::Null);
        assert_eq!(null.get_opt::<String>("x").expect("null"), None);
    }

    #[test]
    fn argument_text_parsing_keeps_invalid_json_raw() {
        assert_eq!(parse_argument_text("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(parse_argument_text("{oops"), json!("{oops"));
        assert_eq!(parse_argument_text(""), json!({}));
    }

    #[test]
    fn malformed_text_is_an_invalid_argument() {
        let args = ToolArguments::new(json!("{not json"));
        let err = args.get::<String>("x").expect_err("must fail");
        assert!(matches!(err, SwarmError::InvalidArgument(_)));
    }
}
