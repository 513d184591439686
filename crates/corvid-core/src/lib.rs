pub mod config;
pub mod error;
pub mod logging;

pub use config::CorvidConfig;
pub use error::{CorvidError, Result};

/// Canonical on-disk session directory name under a workspace root.
pub const SESSION_DIR: &str = ".cclaw/sessions";
