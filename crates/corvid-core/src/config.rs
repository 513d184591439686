use figment::{
    providers::{Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Default upstream model when nothing in the config layers sets one.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Top-level config (`~/.cclaw/config.toml` + `CCLAW_*` env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorvidConfig {
    /// Workspace root. Defaults to the process's current directory if unset.
    pub workspace: Option<String>,
    pub provider: ProviderConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub messenger: MessengerConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Anthropic,
    Openai,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_dialect")]
    pub dialect: Dialect,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    pub base_url: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            dialect: default_dialect(),
            api_key: String::new(),
            model: default_model(),
            temperature: default_temperature(),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub port: Option<u16>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessengerConfig {
    pub token: Option<String>,
    #[serde(default)]
    pub allow_users: Vec<String>,
}

fn default_dialect() -> Dialect {
    Dialect::Anthropic
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for CorvidConfig {
    fn default() -> Self {
        Self {
            workspace: None,
            provider: ProviderConfig::default(),
            gateway: GatewayConfig::default(),
            messenger: MessengerConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl CorvidConfig {
    /// Load config from an optional TOML file, then apply `CCLAW_*` / provider
    /// environment-variable overrides on top.
    ///
    /// Precedence, lowest to highest: compiled-in defaults, config file,
    /// environment variables.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let mut config: CorvidConfig = if let Some(path) = config_path {
            Figment::from(figment::providers::Serialized::defaults(CorvidConfig::default()))
                .merge(Toml::file(path))
                .extract()
                .map_err(|e| crate::error::CorvidError::Config(e.to_string()))?
        } else if let Some(path) = default_config_path() {
            if std::path::Path::new(&path).exists() {
                Figment::from(figment::providers::Serialized::defaults(CorvidConfig::default()))
                    .merge(Toml::file(&path))
                    .extract()
                    .map_err(|e| crate::error::CorvidError::Config(e.to_string()))?
            } else {
                CorvidConfig::default()
            }
        } else {
            CorvidConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply the flat `CCLAW_*` environment variables named in the external
    /// interfaces, plus the provider-specific API key fallback chain.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CCLAW_WORKSPACE") {
            self.workspace = Some(v);
        }
        if let Ok(v) = std::env::var("CCLAW_API_KEY") {
            self.provider.api_key = v;
        }
        if self.provider.api_key.is_empty() {
            if let Ok(v) = std::env::var("ANTHROPIC_API_KEY") {
                self.provider.api_key = v;
            }
        }
        if self.provider.api_key.is_empty() {
            if let Ok(v) = std::env::var("OPENAI_API_KEY") {
                self.provider.api_key = v;
            }
        }
        if let Ok(v) = std::env::var("CCLAW_MODEL") {
            self.provider.model = v;
        }
        if let Ok(v) = std::env::var("CCLAW_TELEGRAM_TOKEN") {
            self.messenger.token = Some(v);
        }
        if let Ok(v) = std::env::var("CCLAW_GATEWAY_PORT") {
            if let Ok(port) = v.parse() {
                self.gateway.port = Some(port);
            }
        }
        if let Ok(v) = std::env::var("CCLAW_GATEWAY_TOKEN") {
            self.gateway.token = Some(v);
        }
        if let Ok(v) = std::env::var("CCLAW_LOG_LEVEL") {
            self.log_level = v;
        }
    }

    /// Resolve the effective workspace directory, falling back to the
    /// process's current directory.
    pub fn workspace_dir(&self) -> std::path::PathBuf {
        match &self.workspace {
            Some(w) => std::path::PathBuf::from(w),
            None => std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from(".")),
        }
    }
}

fn default_config_path() -> Option<String> {
    let home = std::env::var("HOME").ok()?;
    Some(format!("{home}/.cclaw/config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = CorvidConfig::default();
        assert_eq!(cfg.provider.dialect, Dialect::Anthropic);
        assert_eq!(cfg.provider.model, DEFAULT_MODEL);
        assert!(cfg.gateway.port.is_none());
        assert!(cfg.messenger.allow_users.is_empty());
    }

    #[test]
    fn env_model_overrides_default() {
        std::env::set_var("CCLAW_MODEL", "test-model-x");
        let mut cfg = CorvidConfig::default();
        cfg.apply_env_overrides();
        assert_eq!(cfg.provider.model, "test-model-x");
        std::env::remove_var("CCLAW_MODEL");
    }

    #[test]
    fn api_key_fallback_chain() {
        std::env::remove_var("CCLAW_API_KEY");
        std::env::remove_var("ANTHROPIC_API_KEY");
        std::env::set_var("OPENAI_API_KEY", "sk-from-openai-env");
        let mut cfg = CorvidConfig::default();
        cfg.apply_env_overrides();
        assert_eq!(cfg.provider.api_key, "sk-from-openai-env");
        std::env::remove_var("OPENAI_API_KEY");
    }

    #[test]
    fn explicit_api_key_wins_over_fallback() {
        std::env::set_var("CCLAW_API_KEY", "explicit-key");
        std::env::set_var("ANTHROPIC_API_KEY", "fallback-key");
        let mut cfg = CorvidConfig::default();
        cfg.apply_env_overrides();
        assert_eq!(cfg.provider.api_key, "explicit-key");
        std::env::remove_var("CCLAW_API_KEY");
        std::env::remove_var("ANTHROPIC_API_KEY");
    }
}
