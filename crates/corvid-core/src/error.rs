use thiserror::Error;

/// Error taxonomy shared across the workspace. Every fallible boundary
/// returns one of these variants; the core never panics on malformed input
/// or transport errors.
#[derive(Debug, Error)]
pub enum CorvidError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("protocol parse failure: {0}")]
    ProtocolParse(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("tool failure: {0}")]
    Tool(String),

    #[error("WebSocket handshake failed: {0}")]
    Handshake(String),

    #[error("WebSocket auth failed")]
    Auth,

    #[error("scheduler overflow: more than {max} jobs registered")]
    SchedulerOverflow { max: usize },

    #[error("session error: {0}")]
    Session(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CorvidError>;
