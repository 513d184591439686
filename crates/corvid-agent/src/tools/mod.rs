//! Tool dispatcher (C1): a flat name-keyed registry of built-in tools.

pub mod file_read;
pub mod file_write;
pub mod shell;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use corvid_provider::ToolDefinition;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: message.into(),
            is_error: true,
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> serde_json::Value;
    async fn execute(&self, input: serde_json::Value) -> ToolResult;
}

pub fn to_definitions(tools: &[Box<dyn Tool>]) -> Vec<ToolDefinition> {
    tools
        .iter()
        .map(|t| ToolDefinition {
            name: t.name().to_string(),
            description: t.description().to_string(),
            input_schema: t.input_schema(),
        })
        .collect()
}

/// Build the default registry of built-in tools, rooted at `workspace`.
pub fn default_tools(workspace: std::path::PathBuf) -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(shell::ShellTool::new(workspace.clone())),
        Box::new(file_read::ReadFileTool::new(workspace.clone())),
        Box::new(file_write::WriteFileTool::new(workspace)),
    ]
}

/// Execute a named tool call, parsing its JSON input string first. Matches
/// the error strings the turn loop and its tests expect verbatim:
/// unknown tool names and malformed input JSON each produce one fixed
/// message rather than bubbling up a generic parse error.
pub async fn dispatch(tools: &[Box<dyn Tool>], name: &str, input_json: &str) -> ToolResult {
    let Some(tool) = tools.iter().find(|t| t.name() == name) else {
        return ToolResult::error(format!("Unknown tool: {name}"));
    };

    let input: serde_json::Value = match serde_json::from_str(input_json) {
        Ok(v) => v,
        Err(_) => return ToolResult::error("Error: invalid JSON"),
    };

    tool.execute(input).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_tool_name_reports_fixed_message() {
        let tools: Vec<Box<dyn Tool>> = Vec::new();
        let result = dispatch(&tools, "nonexistent", "{}").await;
        assert!(result.is_error);
        assert_eq!(result.content, "Unknown tool: nonexistent");
    }

    #[tokio::test]
    async fn malformed_input_json_reports_fixed_message() {
        let workspace = std::env::temp_dir();
        let tools = default_tools(workspace);
        let result = dispatch(&tools, "file_read", "not json").await;
        assert!(result.is_error);
        assert_eq!(result.content, "Error: invalid JSON");
    }
}
