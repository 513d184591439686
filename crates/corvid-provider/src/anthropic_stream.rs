use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::Value;

use crate::provider::{ChatResponse, DeltaCallback, ProviderError, Result, ToolCall};
use crate::stream::{parse_sse_line, SseParsed};

#[derive(Debug, Deserialize)]
struct MessageStart {
    message: MessageStartInner,
}

#[derive(Debug, Deserialize)]
struct MessageStartInner {
    usage: InputUsage,
}

#[derive(Debug, Deserialize)]
struct InputUsage {
    input_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ContentBlockStart {
    content_block: ContentBlockMeta,
}

#[derive(Debug, Deserialize)]
struct ContentBlockMeta {
    #[serde(rename = "type")]
    block_type: String,
    id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlockDelta {
    delta: DeltaContent,
}

#[derive(Debug, Deserialize)]
struct DeltaContent {
    #[serde(rename = "type")]
    delta_type: String,
    text: Option<String>,
    partial_json: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageDelta {
    delta: MessageDeltaInner,
    usage: OutputUsage,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaInner {
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OutputUsage {
    output_tokens: u32,
}

/// Per-stream scratch state. Dialect A only ever has one open content block
/// at a time, so a flat set of fields is enough — no slot table needed.
struct State {
    resp: ChatResponse,
    current_block_type: Option<String>,
    tool_use_id: Option<String>,
    tool_use_name: Option<String>,
    tool_use_json: String,
    cancelled: bool,
}

pub async fn process_stream(resp: reqwest::Response, on_delta: DeltaCallback<'_>) -> Result<ChatResponse> {
    let mut state = State {
        resp: ChatResponse::default(),
        current_block_type: None,
        tool_use_id: None,
        tool_use_name: None,
        tool_use_json: String::new(),
        cancelled: false,
    };

    let mut current_event = String::new();
    let mut line_buf = String::new();
    let mut byte_stream = resp.bytes_stream();

    while let Some(chunk) = byte_stream.next().await {
        let chunk = chunk.map_err(ProviderError::Http)?;
        line_buf.push_str(&String::from_utf8_lossy(&chunk));

        let lines: Vec<&str> = line_buf.split('\n').collect();
        let (complete, rest) = lines.split_at(lines.len().saturating_sub(1));
        let complete: Vec<String> = complete.iter().map(|s| s.to_string()).collect();
        let remainder = rest.first().map(|s| s.to_string()).unwrap_or_default();

        for line in complete {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_sse_line(line) {
                Some(SseParsed::Event(ev)) => current_event = ev,
                Some(SseParsed::Data(data)) => {
                    handle_data(&current_event, &data, &mut state, on_delta);
                }
                None => {}
            }
            if state.cancelled {
                return Ok(state.resp);
            }
        }

        line_buf = remainder;
    }

    Ok(state.resp)
}

fn handle_data(event: &str, data: &str, state: &mut State, on_delta: DeltaCallback<'_>) {
    match event {
        "message_start" => {
            if let Ok(parsed) = serde_json::from_str::<MessageStart>(data) {
                state.resp.input_tokens = parsed.message.usage.input_tokens;
            }
        }
        "content_block_start" => {
            if let Ok(parsed) = serde_json::from_str::<ContentBlockStart>(data) {
                state.current_block_type = Some(parsed.content_block.block_type.clone());
                if parsed.content_block.block_type == "tool_use" {
                    state.tool_use_id = parsed.content_block.id;
                    state.tool_use_name = parsed.content_block.name;
                    state.tool_use_json.clear();
                }
            }
        }
        "content_block_delta" => {
            if let Ok(parsed) = serde_json::from_str::<ContentBlockDelta>(data) {
                match parsed.delta.delta_type.as_str() {
                    "text_delta" => {
                        if let Some(text) = parsed.delta.text {
                            state.resp.text.push_str(&text);
                            if !on_delta(&text) {
                                state.cancelled = true;
                            }
                        }
                    }
                    "input_json_delta" => {
                        if let Some(partial) = parsed.delta.partial_json {
                            state.tool_use_json.push_str(&partial);
                        }
                    }
                    _ => {}
                }
            }
        }
        "content_block_stop" => {
            if state.current_block_type.as_deref() == Some("tool_use") {
                if let (Some(id), Some(name)) = (state.tool_use_id.take(), state.tool_use_name.take()) {
                    let input_json = if state.tool_use_json.is_empty() {
                        "{}".to_string()
                    } else {
                        state.tool_use_json.clone()
                    };
                    // Normalize through Value so malformed partial JSON never
                    // gets handed to a caller expecting valid JSON text.
                    let input_json = serde_json::from_str::<Value>(&input_json)
                        .map(|v| v.to_string())
                        .unwrap_or(input_json);
                    state.resp.tool_calls.push(ToolCall { id, name, input_json });
                }
            }
            state.current_block_type = None;
        }
        "message_delta" => {
            if let Ok(parsed) = serde_json::from_str::<MessageDelta>(data) {
                state.resp.stop_reason = parsed.delta.stop_reason;
                state.resp.output_tokens = parsed.usage.output_tokens;
            }
        }
        "error" => {
            tracing::warn!(data = %data, "anthropic stream error event");
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_accumulates_even_when_delta_returns_false_midway() {
        let mut state = State {
            resp: ChatResponse::default(),
            current_block_type: None,
            tool_use_id: None,
            tool_use_name: None,
            tool_use_json: String::new(),
            cancelled: false,
        };

        let mut seen = Vec::new();
        let mut on_delta = |t: &str| {
            seen.push(t.to_string());
            seen.len() < 2
        };

        handle_data(
            "content_block_delta",
            r#"{"delta":{"type":"text_delta","text":"hel"}}"#,
            &mut state,
            &mut on_delta,
        );
        handle_data(
            "content_block_delta",
            r#"{"delta":{"type":"text_delta","text":"lo"}}"#,
            &mut state,
            &mut on_delta,
        );
        handle_data(
            "content_block_delta",
            r#"{"delta":{"type":"text_delta","text":"!"}}"#,
            &mut state,
            &mut on_delta,
        );

        assert_eq!(state.resp.text, "hello!");
        assert!(state.cancelled);
    }

    #[test]
    fn tool_use_json_delta_accumulates_into_complete_tool_call() {
        let mut state = State {
            resp: ChatResponse::default(),
            current_block_type: None,
            tool_use_id: None,
            tool_use_name: None,
            tool_use_json: String::new(),
            cancelled: false,
        };
        let mut on_delta = |_: &str| true;

        handle_data(
            "content_block_start",
            r#"{"content_block":{"type":"tool_use","id":"t1","name":"shell"}}"#,
            &mut state,
            &mut on_delta,
        );
        handle_data(
            "content_block_delta",
            r#"{"delta":{"type":"input_json_delta","partial_json":"{\"cmd\":"}}"#,
            &mut state,
            &mut on_delta,
        );
        handle_data(
            "content_block_delta",
            r#"{"delta":{"type":"input_json_delta","partial_json":"\"ls\"}"}}"#,
            &mut state,
            &mut on_delta,
        );
        handle_data("content_block_stop", "{}", &mut state, &mut on_delta);

        assert_eq!(state.resp.tool_calls.len(), 1);
        assert_eq!(state.resp.tool_calls[0].id, "t1");
        assert_eq!(state.resp.tool_calls[0].name, "shell");
        let parsed: Value = serde_json::from_str(&state.resp.tool_calls[0].input_json).unwrap();
        assert_eq!(parsed["cmd"], "ls");
    }
}
