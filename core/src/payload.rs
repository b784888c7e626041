//! Logical payload of a response body.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ClientError;

/// A response body after parsing.
///
/// An empty body is `Empty`, a body that parses as JSON is `Structured`, and
/// anything else is kept verbatim as `Text`. Parsing never fails.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Text(String),
    Structured(Value),
}

impl Payload {
    pub fn parse(body: &str) -> Self {
        if body.is_empty() {
            return Payload::Empty;
        }
        match serde_json::from_str(body) {
            Ok(value) => Payload::Structured(value),
            Err(_) => Payload::Text(body.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }

    /// JSON view: `Empty` is `null`, `Text` is a JSON string.
    pub fn as_value(&self) -> Value {
        match self {
            Payload::Empty => Value::Null,
            Payload::Text(text) => Value::String(text.clone()),
            Payload::Structured(value) => value.clone(),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Payload::Empty => Value::Null,
            Payload::Text(text) => Value::String(text),
            Payload::Structured(value) => value,
        }
    }

    /// Typed view of the payload.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        serde_json::from_value(self.as_value())
            .map_err(|e| ClientError::Deserialization(e.to_string()))
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Structured(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_body_is_empty() {
        assert_eq!(Payload::parse(""), Payload::Empty);
        assert!(Payload::parse("").is_empty());
    }

    #[test]
    fn json_body_is_structured() {
        assert_eq!(
            Payload::parse(r#"{"id":7,"completed":true}"#),
            Payload::Structured(json!({"id": 7, "completed": true}))
        );
        assert_eq!(Payload::parse("42"), Payload::Structured(json!(42)));
    }

    #[test]
    fn non_json_body_is_text() {
        assert_eq!(
            Payload::parse("Internal Server Error"),
            Payload::Text("Internal Server Error".to_string())
        );
        assert_eq!(
            Payload::parse("{\"truncated\": "),
            Payload::Text("{\"truncated\": ".to_string())
        );
    }

    #[test]
    fn whitespace_only_body_is_text() {
        assert_eq!(Payload::parse("  "), Payload::Text("  ".to_string()));
    }

    #[test]
    fn value_view() {
        assert_eq!(Payload::Empty.as_value(), Value::Null);
        assert_eq!(Payload::Text("hi".into()).into_value(), json!("hi"));
    }

    #[test]
    fn deserialize_empty_as_option() {
        let none: Option<Vec<u64>> = Payload::Empty.deserialize().unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn deserialize_mismatch_is_error() {
        let err = Payload::Text("nope".into())
            .deserialize::<Vec<u64>>()
            .unwrap_err();
        assert!(matches!(err, ClientError::Deserialization(_)));
    }
}
