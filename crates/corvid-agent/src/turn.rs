//! Agent turn loop (C4): `turn(ctx, session, user_msg, streaming?) -> final_text`.

use corvid_provider::{ChatRequest, LlmProvider, ToolDefinition};
use corvid_sessions::Session;
use tracing::{info, warn};

use crate::tools::{self, Tool};

/// Hard backstop on tool-call iterations. If the model keeps requesting
/// tools past this many turns, the last text it produced (if any) is
/// returned instead of looping forever.
pub const MAX_TURNS: usize = 10;

pub struct TurnContext<'a> {
    pub provider: &'a dyn LlmProvider,
    pub model: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub tools: &'a [Box<dyn Tool>],
}

impl<'a> TurnContext<'a> {
    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        tools::to_definitions(self.tools)
    }
}

/// Run one full user turn against `session`, mutating it in place and
/// persisting it to disk when done. Returns the final assistant text, which
/// may be empty if the turn was cut off by `MAX_TURNS` before the model
/// produced any text.
pub async fn turn(
    ctx: &TurnContext<'_>,
    session: &mut Session,
    user_msg: &str,
    streaming: bool,
    mut on_delta: impl FnMut(&str) -> bool,
) -> corvid_provider::Result<String> {
    session.add_user(user_msg);

    let mut fallback_final = String::new();
    let mut final_text = String::new();

    for iteration in 0..MAX_TURNS {
        let req = ChatRequest {
            model: ctx.model.clone(),
            system: Some(ctx.system_prompt.clone()),
            messages: session.messages.clone(),
            tools: ctx.tool_definitions(),
            temperature: ctx.temperature,
            max_tokens: ctx.max_tokens,
        };

        let response = if streaming {
            ctx.provider.chat_stream(&req, &mut on_delta).await?
        } else {
            ctx.provider.chat(&req).await?
        };

        if response.tool_calls.is_empty() {
            info!(iteration, "turn complete, no tool calls");
            session.add_assistant(&response.text);
            final_text = response.text;
            break;
        }

        if !response.text.is_empty() {
            fallback_final = response.text.clone();
        }

        for call in &response.tool_calls {
            session.add_tool_use(call.id.clone(), call.name.clone(), &call.input_json);
            let result = tools::dispatch(ctx.tools, &call.name, &call.input_json).await;
            session.add_tool_result(call.id.clone(), result.content);
        }

        if iteration == MAX_TURNS - 1 {
            warn!(max_turns = MAX_TURNS, "turn loop hit maximum iterations");
            final_text = fallback_final.clone();
        }
    }

    session
        .save()
        .map_err(|e| corvid_provider::ProviderError::Unavailable(e.to_string()))?;

    Ok(final_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use corvid_provider::{ChatResponse, DeltaCallback, ProviderError, Result, ToolCall};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Always requests the same tool, forever — used to exercise the
    /// MAX_TURNS backstop.
    struct AlwaysToolCallProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for AlwaysToolCallProvider {
        async fn chat(&self, _req: &ChatRequest) -> Result<ChatResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ChatResponse {
                text: format!("thinking {n}"),
                tool_calls: vec![ToolCall {
                    id: format!("t{n}"),
                    name: "shell".to_string(),
                    input_json: r#"{"command":"true"}"#.to_string(),
                }],
                stop_reason: Some("tool_use".to_string()),
                input_tokens: 1,
                output_tokens: 1,
            })
        }

        async fn chat_stream(&self, req: &ChatRequest, _on_delta: DeltaCallback<'_>) -> Result<ChatResponse> {
            self.chat(req).await
        }
    }

    struct OneShotProvider;

    #[async_trait]
    impl LlmProvider for OneShotProvider {
        async fn chat(&self, _req: &ChatRequest) -> Result<ChatResponse> {
            Ok(ChatResponse {
                text: "done".to_string(),
                tool_calls: vec![],
                stop_reason: Some("end_turn".to_string()),
                input_tokens: 1,
                output_tokens: 1,
            })
        }

        async fn chat_stream(&self, req: &ChatRequest, _on_delta: DeltaCallback<'_>) -> Result<ChatResponse> {
            self.chat(req).await
        }
    }

    #[tokio::test]
    async fn no_tool_calls_ends_turn_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path(), None).unwrap();
        let provider = OneShotProvider;
        let tools_vec: Vec<Box<dyn Tool>> = tools::default_tools(dir.path().to_path_buf());
        let ctx = TurnContext {
            provider: &provider,
            model: "test-model".to_string(),
            system_prompt: "be helpful".to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            tools: &tools_vec,
        };

        let text = turn(&ctx, &mut session, "hi", false, |_| true).await.unwrap();
        assert_eq!(text, "done");
        assert_eq!(session.messages.len(), 2);
    }

    #[tokio::test]
    async fn max_turns_backstop_returns_last_fallback_text() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path(), None).unwrap();
        let provider = AlwaysToolCallProvider { calls: AtomicUsize::new(0) };
        let tools_vec: Vec<Box<dyn Tool>> = tools::default_tools(dir.path().to_path_buf());
        let ctx = TurnContext {
            provider: &provider,
            model: "test-model".to_string(),
            system_prompt: "be helpful".to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            tools: &tools_vec,
        };

        let text = turn(&ctx, &mut session, "hi", false, |_| true).await.unwrap();
        assert_eq!(text, format!("thinking {}", MAX_TURNS - 1));
    }

    #[tokio::test]
    async fn streaming_cancellation_aborts_without_erroring() {
        let _ = Mutex::new(0);
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path(), None).unwrap();
        let provider = OneShotProvider;
        let tools_vec: Vec<Box<dyn Tool>> = tools::default_tools(dir.path().to_path_buf());
        let ctx = TurnContext {
            provider: &provider,
            model: "test-model".to_string(),
            system_prompt: "be helpful".to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            tools: &tools_vec,
        };

        let text = turn(&ctx, &mut session, "hi", true, |_| false).await.unwrap();
        assert_eq!(text, "done");
    }
}
