//! Tool trait and the types shared by every tool handler.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Errors a tool can return to its caller.
///
/// Each variant is a distinct outcome the caller can match on.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Caller-supplied parameters failed validation.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// The requested item does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The item is missing or in the wrong state for the requested change.
    #[error("Not applicable: {0}")]
    NotApplicable(String),

    /// Storage or other internal failure.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

/// Result of a successful tool call.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub result: serde_json::Value,
    pub duration: Duration,
}

impl ToolOutput {
    /// Structured JSON output.
    pub fn success(result: serde_json::Value, duration: Duration) -> Self {
        Self { result, duration }
    }
}

/// Name, description, and JSON Schema of a tool, as advertised to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A callable handler with a JSON parameter schema.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the `params` object.
    fn parameters_schema(&self) -> serde_json::Value;

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Extract a required string parameter.
pub fn require_str<'a>(params: &'a serde_json::Value, key: &str) -> Result<&'a str, ToolError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidParameters(format!("missing '{key}' parameter")))
}

/// Extract an optional string parameter. JSON `null` counts as absent.
pub fn optional_str<'a>(
    params: &'a serde_json::Value,
    key: &str,
) -> Result<Option<&'a str>, ToolError> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(ToolError::InvalidParameters(format!(
            "'{key}' must be a string"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn require_str_present_and_missing() {
        let params = json!({"post_id": "abc", "n": 3});
        assert_eq!(require_str(&params, "post_id").unwrap(), "abc");
        assert!(matches!(
            require_str(&params, "other"),
            Err(ToolError::InvalidParameters(_))
        ));
        assert!(require_str(&params, "n").is_err());
    }

    #[test]
    fn optional_str_handles_null_and_wrong_type() {
        let params = json!({"url": null, "visibility": "PUBLIC", "limit": 5});
        assert_eq!(optional_str(&params, "url").unwrap(), None);
        assert_eq!(optional_str(&params, "missing").unwrap(), None);
        assert_eq!(optional_str(&params, "visibility").unwrap(), Some("PUBLIC"));
        assert!(optional_str(&params, "limit").is_err());
    }
}
