use std::path::PathBuf;

use async_trait::async_trait;

use super::{Tool, ToolResult};

const MAX_READ_BYTES: u64 = 512 * 1024;

pub struct ReadFileTool {
    workspace: PathBuf,
}

impl ReadFileTool {
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
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read the contents of a file, resolved against the workspace if the path is relative."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Path to read." }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let path = match input.get("path").and_then(|v| v.as_str()) {
            Some(p) => p,
            None => return ToolResult::error("Error: missing required parameter: path"),
        };

        let resolved = self.resolve(path);

        let metadata = match std::fs::metadata(&resolved) {
            Ok(m) => m,
            Err(e) => return ToolResult::error(format!("Error: {e}")),
        };

        if metadata.len() > MAX_READ_BYTES {
            match std::fs::read(&resolved) {
                Ok(bytes) => {
                    let truncated = &bytes[..MAX_READ_BYTES as usize];
                    ToolResult::success(String::from_utf8_lossy(truncated).to_string())
                }
                Err(e) => ToolResult::error(format!("Error: {e}")),
            }
        } else {
            match std::fs::read_to_string(&resolved) {
                Ok(content) => ToolResult::success(content),
                Err(e) => ToolResult::error(format!("Error: {e}")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_relative_path_against_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "world").unwrap();
        let tool = ReadFileTool::new(dir.path().to_path_buf());
        let result = tool.execute(serde_json::json!({"path": "hello.txt"})).await;
        assert!(!result.is_error);
        assert_eq!(result.content, "world");
    }

    #[tokio::test]
    async fn missing_file_reports_error_prefixed_string() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ReadFileTool::new(dir.path().to_path_buf());
        let result = tool.execute(serde_json::json!({"path": "nope.txt"})).await;
        assert!(result.is_error);
        assert!(result.content.starts_with("Error: "));
    }
}
