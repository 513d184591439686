use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;

use super::{Tool, ToolResult};

/// Captured output is drained up to this many bytes, matching the
/// fixed-size pipe buffer the original shell tool used.
const MAX_OUTPUT_BYTES: usize = 128 * 1024;

pub struct ShellTool {
    workspace: PathBuf,
}

impl ShellTool {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command via sh -c and return its combined stdout/stderr."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute via sh -c."
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let command = match input.get("command").and_then(|v| v.as_str()) {
            Some(c) => c,
            None => return ToolResult::error("Error: missing required parameter: command"),
        };

        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg(format!("{command} 2>&1"));
        if self.workspace.is_dir() {
            cmd.current_dir(&self.workspace);
        }

        match cmd.output().await {
            Ok(output) => {
                let mut captured = output.stdout;
                captured.truncate(MAX_OUTPUT_BYTES);
                let text = String::from_utf8_lossy(&captured);
                let exit_code = output.status.code().unwrap_or(-1);
                let body = format!("[exit {exit_code}]\n{text}");
                if exit_code == 0 {
                    ToolResult::success(body)
                } else {
                    ToolResult::error(body)
                }
            }
            Err(e) => ToolResult::error(format!("Error: failed to execute command: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_command_reports_exit_zero_and_output() {
        let tool = ShellTool::new(std::env::temp_dir());
        let result = tool.execute(serde_json::json!({"command": "echo hello"})).await;
        assert!(!result.is_error);
        assert_eq!(result.content, "[exit 0]\nhello\n");
    }

    #[tokio::test]
    async fn failing_command_reports_nonzero_exit() {
        let tool = ShellTool::new(std::env::temp_dir());
        let result = tool.execute(serde_json::json!({"command": "exit 7"})).await;
        assert!(result.is_error);
        assert!(result.content.starts_with("[exit 7]"));
    }

    #[tokio::test]
    async fn missing_command_parameter_is_an_error() {
        let tool = ShellTool::new(std::env::temp_dir());
        let result = tool.execute(serde_json::json!({})).await;
        assert!(result.is_error);
    }
}
