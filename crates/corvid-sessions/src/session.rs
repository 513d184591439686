use std::path::PathBuf;

use corvid_provider::{ContentBlock, Message, MessageContent, Role};
use serde_json::Value;
use tracing::debug;

use crate::error::Result;

/// One JSON document per session id, held in memory and written out on
/// `save`. A session with no id is purely in-memory and `save` is a no-op —
/// useful for one-shot queries that shouldn't leave files behind.
pub struct Session {
    pub id: Option<String>,
    pub messages: Vec<Message>,
    file_path: Option<PathBuf>,
}

impl Session {
    /// Load an existing session document if one exists on disk, otherwise
    /// start empty. `workspace` is the workspace root; sessions live under
    /// `<workspace>/.cclaw/sessions/<id>.json`.
    pub fn new(workspace: &std::path::Path, session_id: Option<&str>) -> Result<Self> {
        let file_path = session_id.map(|id| {
            workspace
                .join(corvid_core::SESSION_DIR)
                .join(format!("{id}.json"))
        });

        let messages = match &file_path {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(path)?;
                let messages: Vec<Message> = serde_json::from_str(&raw)?;
                debug!(session_id = ?session_id, count = messages.len(), "loaded session");
                messages
            }
            _ => Vec::new(),
        };

        Ok(Self {
            id: session_id.map(|s| s.to_string()),
            messages,
            file_path,
        })
    }

    pub fn add_user(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user_text(text));
    }

    pub fn add_assistant(&mut self, text: impl Into<String>) {
        self.messages.push(Message {
            role: Role::Assistant,
            content: MessageContent::Blocks(vec![ContentBlock::Text { text: text.into() }]),
        });
    }

    /// Append a tool_use block. Coalesces onto the previous assistant
    /// message's content array when the last message is already assistant;
    /// otherwise starts a new assistant message holding just this block.
    pub fn add_tool_use(&mut self, tool_id: impl Into<String>, name: impl Into<String>, input_json: &str) {
        let input: Value = serde_json::from_str(input_json).unwrap_or_else(|_| serde_json::json!({}));
        let block = ContentBlock::ToolUse {
            id: tool_id.into(),
            name: name.into(),
            input,
        };

        if let Some(last) = self.messages.last_mut() {
            if last.role == Role::Assistant {
                match &mut last.content {
                    MessageContent::Blocks(blocks) => {
                        blocks.push(block);
                        return;
                    }
                    MessageContent::Text(text) => {
                        let prior = std::mem::take(text);
                        last.content = MessageContent::Blocks(vec![
                            ContentBlock::Text { text: prior },
                            block,
                        ]);
                        return;
                    }
                }
            }
        }

        self.messages.push(Message {
            role: Role::Assistant,
            content: MessageContent::Blocks(vec![block]),
        });
    }

    pub fn add_tool_result(&mut self, tool_id: impl Into<String>, output: impl Into<String>) {
        self.messages.push(Message {
            role: Role::User,
            content: MessageContent::Blocks(vec![ContentBlock::ToolResult {
                tool_use_id: tool_id.into(),
                content: output.into(),
            }]),
        });
    }

    pub fn messages_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.messages)?)
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&self.messages)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tmp_workspace() -> TempDir {
        TempDir::new().unwrap()
    }

    #[test]
    fn new_session_without_id_is_not_persisted() {
        let ws = tmp_workspace();
        let mut s = Session::new(ws.path(), None).unwrap();
        s.add_user("hi");
        s.save().unwrap();
        assert!(!ws.path().join(".cclaw").exists());
    }

    #[test]
    fn save_then_reload_roundtrips_messages() {
        let ws = tmp_workspace();
        {
            let mut s = Session::new(ws.path(), Some("abc")).unwrap();
            s.add_user("hello");
            s.add_assistant("hi there");
            s.save().unwrap();
        }
        let reloaded = Session::new(ws.path(), Some("abc")).unwrap();
        assert_eq!(reloaded.messages.len(), 2);
    }

    #[test]
    fn tool_use_coalesces_onto_prior_assistant_message() {
        let ws = tmp_workspace();
        let mut s = Session::new(ws.path(), None).unwrap();
        s.add_assistant("let me check");
        s.add_tool_use("t1", "shell", r#"{"cmd":"ls"}"#);
        assert_eq!(s.messages.len(), 1);
        match &s.messages[0].content {
            MessageContent::Blocks(blocks) => assert_eq!(blocks.len(), 2),
            _ => panic!("expected blocks"),
        }
    }

    #[test]
    fn tool_use_after_tool_result_starts_new_assistant_message() {
        let ws = tmp_workspace();
        let mut s = Session::new(ws.path(), None).unwrap();
        s.add_assistant("checking");
        s.add_tool_use("t1", "shell", "{}");
        s.add_tool_result("t1", "[exit 0]\n");
        s.add_tool_use("t2", "shell", "{}");
        assert_eq!(s.messages.len(), 3);
        assert_eq!(s.messages[2].role, Role::Assistant);
    }
}
