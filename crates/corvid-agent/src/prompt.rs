//! System-prompt builder (C8).

use std::path::Path;

const MAX_FILE_BYTES: u64 = 64 * 1024;

const IDENTITY_FILES: &[&str] = &[
    "AGENTS.md",
    "SOUL.md",
    "TOOLS.md",
    "IDENTITY.md",
    "USER.md",
    "HEARTBEAT.md",
    "MEMORY.md",
];

const SAFETY_PREAMBLE: &str = "## Safety\n\n\
- Do not exfiltrate private data.\n\
- Do not run destructive commands without asking.\n\
- Prefer recoverable operations over destructive ones.\n\
- When in doubt, ask before acting externally.\n\n";

const TOOLS_PREAMBLE: &str = "## Tools\n\n\
You have access to the following tools:\n\n\
- **shell**: Execute terminal commands\n\
- **file_read**: Read file contents\n\
- **file_write**: Write file contents\n\n";

/// Read a workspace identity file, returning `None` if missing or over the
/// per-file size cap (treated the same as absent).
fn read_identity_file(workspace: &Path, filename: &str) -> Option<String> {
    let path = workspace.join(filename);
    let metadata = std::fs::metadata(&path).ok()?;
    if metadata.len() > MAX_FILE_BYTES {
        return None;
    }
    std::fs::read_to_string(&path).ok()
}

fn inject_file(out: &mut String, workspace: &Path, filename: &str) {
    out.push_str("### ");
    out.push_str(filename);
    out.push_str("\n\n");
    match read_identity_file(workspace, filename) {
        Some(content) => {
            out.push_str(&content);
            out.push_str("\n\n");
        }
        None => {
            out.push_str(&format!("[File not found: {filename}]\n\n"));
        }
    }
}

/// Assemble the full system prompt: safety + tools preambles, workspace
/// path, each identity file in order, a UTC timestamp section, and a
/// runtime-facts section.
pub fn build_system_prompt(workspace: &Path, model: &str) -> String {
    let mut out = String::new();

    out.push_str(SAFETY_PREAMBLE);
    out.push_str(TOOLS_PREAMBLE);

    out.push_str(&format!(
        "## Workspace\n\nWorking directory: `{}`\n\n",
        workspace.display()
    ));

    for filename in IDENTITY_FILES {
        inject_file(&mut out, workspace, filename);
    }

    let now = chrono::Utc::now();
    out.push_str(&format!(
        "## Current Date & Time\n\nTimezone: UTC\nDate: {}\n\n",
        now.format("%Y-%m-%d %H:%M:%S")
    ));

    let host = hostname::get()
        .ok()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    out.push_str(&format!(
        "## Runtime\n\nHost: {} | OS: {} {} | Model: {}\n\n",
        host,
        std::env::consts::OS,
        std::env::consts::ARCH,
        model
    ));

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_identity_files_get_placeholder_sections() {
        let dir = tempfile::tempdir().unwrap();
        let prompt = build_system_prompt(dir.path(), "test-model");
        assert!(prompt.contains("[File not found: SOUL.md]"));
        assert!(prompt.contains("### AGENTS.md"));
    }

    #[test]
    fn present_identity_file_is_included_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("SOUL.md"), "be helpful").unwrap();
        let prompt = build_system_prompt(dir.path(), "test-model");
        assert!(prompt.contains("be helpful"));
        assert!(!prompt.contains("[File not found: SOUL.md]"));
    }

    #[test]
    fn oversized_identity_file_is_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let huge = "x".repeat(MAX_FILE_BYTES as usize + 1);
        std::fs::write(dir.path().join("TOOLS.md"), huge).unwrap();
        let prompt = build_system_prompt(dir.path(), "test-model");
        assert!(prompt.contains("[File not found: TOOLS.md]"));
    }

    #[test]
    fn runtime_section_names_the_model() {
        let dir = tempfile::tempdir().unwrap();
        let prompt = build_system_prompt(dir.path(), "claude-sonnet-4-20250514");
        assert!(prompt.contains("Model: claude-sonnet-4-20250514"));
    }
}
