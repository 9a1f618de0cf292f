//! Typed access to tool call arguments.

use crate::error::{ParleyError, Result};

/// Wrapper around tool call arguments providing typed extraction.
#[derive(Debug, Clone, Default)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    /// Get a required string argument.
    pub fn get_str(&self, key: &str) -> Result<&str> {
        self.get_str_opt(key)
            .ok_or_else(|| ParleyError::InvalidArgument(format!("Missing string argument: {key}")))
    }

    /// Get an optional string argument.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    /// Get an optional number argument. Numeric strings are accepted too,
    /// since some models quote numbers.
    pub fn get_f64_opt(&self, key: &str) -> Option<f64> {
        match self.value.get(key)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Get an optional non-negative integer argument.
    pub fn get_usize_opt(&self, key: &str) -> Option<usize> {
        self.get_f64_opt(key)
            .filter(|n| n.is_finite() && *n >= 0.0)
            .map(|n| n as usize)
    }

    /// Deserialize the entire arguments into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        let value = match &self.value {
            serde_json::Value::String(raw) if raw.trim().is_empty() => serde_json::json!({}),
            serde_json::Value::String(raw) => serde_json::from_str(raw.trim()).map_err(|e| {
                ParleyError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
            })?,
            other => other.clone(),
        };
        serde_json::from_value(value)
            .map_err(|e| ParleyError::InvalidArgument(format!("Failed to deserialize arguments: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn missing_string_is_an_invalid_argument() {
        let args = ToolArguments::new(serde_json::json!({"a": 1}));
        assert!(matches!(args.get_str("a"), Err(ParleyError::InvalidArgument(_))));
        assert_eq!(args.get_str_opt("b"), None);
    }

    #[test]
    fn numbers_accept_quoted_values() {
        let args = ToolArguments::new(serde_json::json!({"limit": "3", "threshold": 0.5}));
        assert_eq!(args.get_usize_opt("limit"), Some(3));
        assert_eq!(args.get_f64_opt("threshold"), Some(0.5));
        assert_eq!(args.get_usize_opt("missing"), None);
    }

    #[test]
    fn deserialize_accepts_stringified_json() {
        #[derive(Deserialize)]
        struct Query {
            query: String,
        }
        let args = ToolArguments::new(serde_json::json!("{\"query\": \"tea\"}"));
        let parsed: Query = args.deserialize().unwrap();
        assert_eq!(parsed.query, "tea");
    }
}
