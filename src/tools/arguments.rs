//! Typed access to tool call arguments.

use crate::error::SwitchyardError;

/// Tool call arguments with typed extraction helpers.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// Parse the raw argument text a model streamed. Blank text is `{}`.
    pub fn parse(raw: &str) -> Result<Self, SwitchyardError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::new(serde_json::json!({})));
        }
        serde_json::from_str(trimmed)
            .map(Self::new)
            .map_err(|e| SwitchyardError::InvalidArgument(format!("arguments are not valid JSON: {e}")))
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    pub fn into_value(self) -> serde_json::Value {
        self.value
    }

    pub fn get_str(&self, key: &str) -> Result<&str, SwitchyardError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| SwitchyardError::InvalidArgument(format!("Missing string argument: {key}")))
    }

    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    pub fn get_i64(&self, key: &str) -> Result<i64, SwitchyardError> {
        self.value
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| SwitchyardError::InvalidArgument(format!("Missing integer argument: {key}")))
    }

    pub fn get_bool_opt(&self, key: &str) -> Option<bool> {
        self.value.get(key).and_then(|v| v.as_bool())
    }

    /// Deserialize the whole argument object into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, SwitchyardError> {
        serde_json::from_value(self.value.clone()).map_err(|e| {
            SwitchyardError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_streamed_arguments_parse_to_empty_object() {
        let args = ToolArguments::parse("  ").unwrap();
        assert_eq!(args.raw(), &json!({}));
    }

    #[test]
    fn malformed_streamed_arguments_are_invalid() {
        let err = ToolArguments::parse("{\"a\":").unwrap_err();
        assert!(matches!(err, SwitchyardError::InvalidArgument(_)));
    }

    #[test]
    fn typed_getters_report_missing_keys() {
        let args = ToolArguments::new(json!({"city": "Oslo", "days": 3}));
        assert_eq!(args.get_str("city").unwrap(), "Oslo");
        assert_eq!(args.get_i64("days").unwrap(), 3);
        assert!(args.get_str("country").is_err());
        assert_eq!(args.get_bool_opt("metric"), None);
    }
}
