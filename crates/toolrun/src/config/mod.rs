use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::{Result, ToolrunError};
use crate::registry::ToolDefinition;

/// Main configuration structure for Toolrun
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream generation provider configuration
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Extra tool definitions, merged over the built-in catalog
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
}

impl Config {
    /// Parse a config file from disk
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ToolrunError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| ToolrunError::Config(format!("Failed to parse config: {e}")))?;
        config.check_tools()?;
        Ok(config)
    }

    /// Reject `[[tools]]` entries the gateway could not serve correctly
    pub fn check_tools(&self) -> Result<()> {
        for tool in &self.tools {
            tool.check()
                .map_err(|e| ToolrunError::Config(format!("Invalid [[tools]] entry: {e}")))?;
        }
        Ok(())
    }

    /// Load the config from an explicit path, or from the first default
    /// location that exists, falling back to built-in defaults.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            tracing::info!("Loading config from: {}", path.display());
            return Self::from_file(path);
        }

        for path in default_config_paths() {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(&path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }
}

fn default_config_paths() -> Vec<PathBuf> {
    [
        dirs::home_dir().map(|h| h.join(".toolrun").join("config.toml")),
        dirs::config_dir().map(|c| c.join("toolrun").join("config.toml")),
        Some(PathBuf::from("config.toml")),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:8787")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Largest accepted request body in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:8787".to_string()
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

/// Upstream generation provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Model identifier
    #[serde(default)]
    pub model: Option<String>,
    /// Environment variable that overrides `model` when set
    #[serde(default = "default_model_env")]
    pub model_env: String,
    /// TCP connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Longest wait for the next upstream unit; unset waits forever
    #[serde(default)]
    pub idle_timeout_secs: Option<u64>,
    /// Output token cap forwarded to the upstream
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            model: None,
            model_env: default_model_env(),
            connect_timeout_secs: default_connect_timeout_secs(),
            idle_timeout_secs: None,
            max_output_tokens: None,
        }
    }
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_api_key_env() -> String {
    "TOOLRUN_API_KEY".to_string()
}

fn default_model_env() -> String {
    "TOOLRUN_MODEL".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// Upstream settings resolved once at process start.
///
/// A missing API key or model is not an error here; the gateway reports it
/// per request so the server still comes up and serves tool metadata.
#[derive(Clone)]
pub struct GatewaySettings {
    pub api_key: Option<String>,
    pub base_url: Url,
    pub model_id: Option<String>,
    pub idle_timeout: Option<Duration>,
    pub max_output_tokens: Option<u32>,
}

impl GatewaySettings {
    /// Resolve settings from the process environment
    pub fn from_env(config: &UpstreamConfig) -> Result<Self> {
        Self::resolve(config, |name| std::env::var(name).ok())
    }

    /// Resolve settings using `lookup` for environment variables
    pub fn resolve(config: &UpstreamConfig, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ToolrunError::Config(format!("Invalid upstream base_url '{}': {e}", config.base_url))
        })?;
        if base_url.scheme() != "http" && base_url.scheme() != "https" {
            return Err(ToolrunError::Config(format!(
                "Unsupported upstream scheme '{}': only http and https are allowed",
                base_url.scheme()
            )));
        }

        let api_key = lookup(&config.api_key_env).filter(|k| !k.trim().is_empty());
        let model_id = lookup(&config.model_env)
            .or_else(|| config.model.clone())
            .filter(|m| !m.trim().is_empty());

        Ok(Self {
            api_key,
            base_url,
            model_id,
            idle_timeout: config.idle_timeout_secs.map(Duration::from_secs),
            max_output_tokens: config.max_output_tokens,
        })
    }
}

impl fmt::Debug for GatewaySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewaySettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url.as_str())
            .field("model_id", &self.model_id)
            .field("idle_timeout", &self.idle_timeout)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}
