use std::collections::BTreeMap;

use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::provider::{
    ChatRequest, ChatResponse, ContentBlock, DeltaCallback, LlmProvider, Message, MessageContent,
    ProviderError, Result, Role, ToolCall,
};
use crate::stream::{parse_sse_line, SseParsed};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    fn build_request_body(&self, req: &ChatRequest, stream: bool) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = &req.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.extend(to_openai_messages(&req.messages));

        let mut body = json!({
            "model": req.model,
            "messages": messages,
            "temperature": req.temperature,
            "max_tokens": req.max_tokens,
            "stream": stream,
        });

        if !req.tools.is_empty() {
            body["tools"] = json!(req
                .tools
                .iter()
                .map(|t| json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                    }
                }))
                .collect::<Vec<_>>());
        }

        body
    }

    async fn send(&self, body: Value) -> Result<reqwest::Response> {
        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited { retry_after_ms: 1000 });
        }

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, message });
        }

        Ok(resp)
    }
}

/// Rewrite canonical Anthropic-shaped messages into OpenAI's flatter wire
/// format: tool results become standalone `role: "tool"` messages, and
/// assistant tool-use blocks become a `tool_calls` array alongside any text.
fn to_openai_messages(messages: &[Message]) -> Vec<Value> {
    let mut out = Vec::new();

    for m in messages {
        let role = match m.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };

        match &m.content {
            MessageContent::Text(text) => {
                out.push(json!({ "role": role, "content": text }));
            }
            MessageContent::Blocks(blocks) => {
                let mut text_parts = Vec::new();
                let mut tool_calls = Vec::new();
                let mut tool_results = Vec::new();

                for block in blocks {
                    match block {
                        ContentBlock::Text { text } => text_parts.push(text.clone()),
                        ContentBlock::ToolUse { id, name, input } => tool_calls.push(json!({
                            "id": id,
                            "type": "function",
                            "function": { "name": name, "arguments": input.to_string() }
                        })),
                        ContentBlock::ToolResult { tool_use_id, content } => {
                            tool_results.push((tool_use_id.clone(), content.clone()))
                        }
                    }
                }

                if !tool_results.is_empty() {
                    for (tool_use_id, content) in tool_results {
                        out.push(json!({
                            "role": "tool",
                            "tool_call_id": tool_use_id,
                            "content": content,
                        }));
                    }
                } else {
                    let mut msg = json!({
                        "role": role,
                        "content": if text_parts.is_empty() { Value::Null } else { Value::String(text_parts.join("")) },
                    });
                    if !tool_calls.is_empty() {
                        msg["tool_calls"] = json!(tool_calls);
                    }
                    out.push(msg);
                }
            }
        }
    }

    out
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ApiToolCall>,
}

#[derive(Debug, Deserialize)]
struct ApiToolCall {
    id: String,
    function: ApiFunctionCall,
}

#[derive(Debug, Deserialize)]
struct ApiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// Maps OpenAI's `finish_reason` strings onto the canonical stop-reason
/// vocabulary both dialects share (`end_turn`/`tool_use`), passing anything
/// else through unchanged.
fn map_finish_reason(reason: Option<String>) -> Option<String> {
    reason.map(|r| match r.as_str() {
        "stop" => "end_turn".to_string(),
        "tool_calls" => "tool_use".to_string(),
        other => other.to_string(),
    })
}

fn parse_response(api: ApiResponse) -> ChatResponse {
    let choice = api.choices.into_iter().next();
    let (text, tool_calls, stop_reason) = match choice {
        Some(c) => {
            let calls = c
                .message
                .tool_calls
                .into_iter()
                .map(|tc| ToolCall {
                    id: tc.id,
                    name: tc.function.name,
                    input_json: tc.function.arguments,
                })
                .collect();
            (
                c.message.content.unwrap_or_default(),
                calls,
                map_finish_reason(c.finish_reason),
            )
        }
        None => (String::new(), Vec::new(), None),
    };

    let (input_tokens, output_tokens) = api
        .usage
        .map(|u| (u.prompt_tokens, u.completion_tokens))
        .unwrap_or((0, 0));

    ChatResponse {
        text,
        tool_calls,
        stop_reason,
        input_tokens,
        output_tokens,
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let body = self.build_request_body(req, false);
        let resp = self.send(body).await?;
        let api: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(parse_response(api))
    }

    async fn chat_stream(&self, req: &ChatRequest, on_delta: DeltaCallback<'_>) -> Result<ChatResponse> {
        let body = self.build_request_body(req, true);
        let resp = self.send(body).await?;
        process_stream(resp, on_delta).await
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<StreamToolCallDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    index: u32,
    id: Option<String>,
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Default)]
struct PendingToolCallSlot {
    id: String,
    name: String,
    arguments: String,
}

/// Dialect B streams tool-call fragments keyed by a numeric slot index; an
/// index the server never touches must never appear as an empty placeholder
/// in the final list, so pending calls live in a sparse map rather than a
/// dense pre-sized array.
async fn process_stream(resp: reqwest::Response, on_delta: DeltaCallback<'_>) -> Result<ChatResponse> {
    let mut text = String::new();
    let mut pending: BTreeMap<u32, PendingToolCallSlot> = BTreeMap::new();
    let mut stop_reason = None;
    let mut output_tokens = 0u32;
    let mut input_tokens = 0u32;

    let mut line_buf = String::new();
    let mut byte_stream = resp.bytes_stream();

    'outer: while let Some(chunk) = byte_stream.next().await {
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
            let Some(SseParsed::Data(data)) = parse_sse_line(line) else {
                continue;
            };
            if data == "[DONE]" {
                break 'outer;
            }

            let Ok(parsed) = serde_json::from_str::<StreamChunk>(&data) else {
                continue;
            };

            if let Some(usage) = parsed.usage {
                input_tokens = usage.prompt_tokens;
                output_tokens = usage.completion_tokens;
            }

            if let Some(choice) = parsed.choices.into_iter().next() {
                if choice.finish_reason.is_some() {
                    stop_reason = map_finish_reason(choice.finish_reason);
                }
                if let Some(delta_text) = choice.delta.content {
                    text.push_str(&delta_text);
                    if !on_delta(&delta_text) {
                        break 'outer;
                    }
                }
                for tc in choice.delta.tool_calls {
                    let slot = pending.entry(tc.index).or_default();
                    if let Some(id) = tc.id {
                        slot.id = id;
                    }
                    if let Some(f) = tc.function {
                        if let Some(name) = f.name {
                            slot.name = name;
                        }
                        if let Some(args) = f.arguments {
                            slot.arguments.push_str(&args);
                        }
                    }
                }
            }
        }

        line_buf = remainder;
    }

    let tool_calls = pending
        .into_iter()
        .map(|(_, slot)| ToolCall {
            id: slot.id,
            name: slot.name,
            input_json: if slot.arguments.is_empty() {
                "{}".to_string()
            } else {
                slot.arguments
            },
        })
        .collect();

    Ok(ChatResponse {
        text,
        tool_calls,
        stop_reason,
        input_tokens,
        output_tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_result_blocks_become_standalone_tool_messages() {
        let messages = vec![Message {
            role: Role::User,
            content: MessageContent::Blocks(vec![ContentBlock::ToolResult {
                tool_use_id: "abc".to_string(),
                content: "[exit 0]\nhello".to_string(),
            }]),
        }];
        let out = to_openai_messages(&messages);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["role"], "tool");
        assert_eq!(out[0]["tool_call_id"], "abc");
    }

    #[test]
    fn assistant_tool_use_blocks_become_tool_calls_array() {
        let messages = vec![Message {
            role: Role::Assistant,
            content: MessageContent::Blocks(vec![
                ContentBlock::Text { text: "checking".to_string() },
                ContentBlock::ToolUse {
                    id: "t1".to_string(),
                    name: "shell".to_string(),
                    input: json!({"cmd": "ls"}),
                },
            ]),
        }];
        let out = to_openai_messages(&messages);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["content"], "checking");
        assert_eq!(out[0]["tool_calls"][0]["function"]["name"], "shell");
    }

    #[test]
    fn sparse_indices_skip_gaps_with_no_placeholder_entries() {
        let mut pending: BTreeMap<u32, PendingToolCallSlot> = BTreeMap::new();
        pending.insert(0, PendingToolCallSlot { id: "a".into(), name: "one".into(), arguments: "{}".into() });
        pending.insert(3, PendingToolCallSlot { id: "b".into(), name: "two".into(), arguments: "{}".into() });

        let calls: Vec<ToolCall> = pending
            .into_iter()
            .map(|(_, s)| ToolCall { id: s.id, name: s.name, input_json: s.arguments })
            .collect();

        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "one");
        assert_eq!(calls[1].name, "two");
    }
}
