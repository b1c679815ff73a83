use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tool invocation requested by a caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier correlating this call with its result.
    pub call_id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON arguments matching the tool's parameter schema.
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Creates a tool call with a fresh random call id.
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            call_id: Uuid::new_v4().to_string(),
            name: name.into(),
            arguments,
        }
    }
}

/// Static description of a tool exposed to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description for tool selection.
    pub description: String,
    /// JSON schema for accepted arguments.
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Creates a tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Result of one tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Call id this result answers.
    pub call_id: String,
    /// Name of the executed tool.
    pub tool_name: String,
    /// Rendered output payload (content or an error message).
    pub output: String,
    /// Whether this result represents a failure.
    pub is_error: bool,
}

impl ToolResult {
    /// Creates a successful result.
    pub fn success(call_id: &str, tool_name: &str, output: impl Into<String>) -> Self {
        Self {
            call_id: call_id.to_string(),
            tool_name: tool_name.to_string(),
            output: output.into(),
            is_error: false,
        }
    }

    /// Creates an error result.
    pub fn error(call_id: &str, tool_name: &str, error: impl Into<String>) -> Self {
        Self {
            call_id: call_id.to_string(),
            tool_name: tool_name.to_string(),
            output: error.into(),
            is_error: true,
        }
    }
}
