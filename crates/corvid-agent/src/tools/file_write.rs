use std::path::PathBuf;

use async_trait::async_trait;

use super::{Tool, ToolResult};

pub struct WriteFileTool {
    workspace: PathBuf,
}

impl WriteFileTool {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let p = PathBuf::from(path);
        if p.is_relative() {
            self.workspace.join(p)
        } else {
            p
        }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating missing parent directories, resolved against the workspace if relative."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "content": { "type": "string" }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let path = match input.get("path").and_then(|v| v.as_str()) {
            Some(p) => p,
            None => return ToolResult::error("Error: missing required parameter: path"),
        };
        let content = match input.get("content").and_then(|v| v.as_str()) {
            Some(c) => c,
            None => return ToolResult::error("Error: missing required parameter: content"),
        };

        let resolved = self.resolve(path);

        if let Some(parent) = resolved.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                return ToolResult::error(format!("Error: {e}"));
            }
        }

        let byte_len = content.len();
        if let Err(e) = std::fs::write(&resolved, content) {
            return ToolResult::error(format!("Error: {e}"));
        }

        ToolResult::success(format!("Wrote {byte_len} bytes to {path}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_file_and_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteFileTool::new(dir.path().to_path_buf());
        let result = tool
            .execute(serde_json::json!({"path": "nested/out.txt", "content": "hi"}))
            .await;
        assert!(!result.is_error);
        assert_eq!(result.content, "Wrote 2 bytes to nested/out.txt");
        assert_eq!(std::fs::read_to_string(dir.path().join("nested/out.txt")).unwrap(), "hi");
    }
}
