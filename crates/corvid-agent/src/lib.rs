pub mod prompt;
pub mod tools;
pub mod turn;

pub use prompt::build_system_prompt;
pub use tools::{default_tools, Tool, ToolResult};
pub use turn::{turn, TurnContext, MAX_TURNS};
