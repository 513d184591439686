pub mod anthropic;
pub mod anthropic_stream;
pub mod openai;
pub mod provider;
pub mod stream;

pub use provider::{
    ChatRequest, ChatResponse, ContentBlock, DeltaCallback, LlmProvider, Message, MessageContent,
    ProviderError, Result, Role, ToolCall, ToolDefinition,
};

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;
