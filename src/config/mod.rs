pub mod validation;

use serde::{Deserialize, Serialize};

use self::validation::validate_config;

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    /// Backend request deadline in seconds. Covers the whole streamed body.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_http_pool_max_idle_per_host")]
    pub http_pool_max_idle_per_host: usize,
    #[serde(default = "default_http_pool_idle_timeout_secs")]
    pub http_pool_idle_timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_worker_threads: Option<usize>,
    #[serde(default)]
    pub base_path: String,
    #[serde(default)]
    pub http_use_env_proxy: bool,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_timeout() -> u64 {
    180
}
fn default_http_pool_max_idle_per_host() -> usize {
    16
}
fn default_http_pool_idle_timeout_secs() -> u64 {
    15
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            timeout: default_timeout(),
            http_pool_max_idle_per_host: default_http_pool_max_idle_per_host(),
            http_pool_idle_timeout_secs: default_http_pool_idle_timeout_secs(),
            runtime_worker_threads: None,
            base_path: String::new(),
            http_use_env_proxy: false,
        }
    }
}

/// Backend inference API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub proxy: Option<String>,
}

fn default_base_url() -> String {
    "https://integrate.api.nvidia.com/v1".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            proxy: None,
        }
    }
}

/// Model routing table and fallback policy.
///
/// `models` entries use the `alias:backend_model` form. The alias is the
/// client-facing name, everything after the first colon is sent downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    #[serde(default = "default_large_markers")]
    pub large_markers: Vec<String>,
    #[serde(default = "default_fallback_large")]
    pub fallback_large: String,
    #[serde(default = "default_fallback_small")]
    pub fallback_small: String,
    #[serde(default = "default_owned_by")]
    pub owned_by: String,
}

fn default_models() -> Vec<String> {
    [
        "gpt-3.5-turbo:nvidia/llama-3.1-nemotron-ultra-253b-v1",
        "gpt-4:qwen/qwen3-coder-480b-a35b-instruct",
        "gpt-4-turbo:moonshotai/kimi-k2-instruct-0905",
        "gpt-4o:deepseek-ai/deepseek-v3.1",
        "claude-3-opus:openai/gpt-oss-120b",
        "claude-3-sonnet:openai/gpt-oss-20b",
        "gemini-pro:qwen/qwen3-next-80b-a3b-thinking",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}
fn default_large_markers() -> Vec<String> {
    vec!["gpt-4".to_string(), "opus".to_string(), "405b".to_string()]
}
fn default_fallback_large() -> String {
    "meta/llama-3.1-405b-instruct".to_string()
}
fn default_fallback_small() -> String {
    "meta/llama-3.1-8b-instruct".to_string()
}
fn default_owned_by() -> String {
    "thinkbridge".to_string()
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            models: default_models(),
            large_markers: default_large_markers(),
            fallback_large: default_fallback_large(),
            fallback_small: default_fallback_small(),
            owned_by: default_owned_by(),
        }
    }
}

/// Feature flags and settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    /// Splice `reasoning_content` into `content` between the reasoning tags.
    #[serde(default)]
    pub show_reasoning: bool,
    /// Ask the backend for extended reasoning via `chat_template_kwargs`.
    #[serde(default)]
    pub enable_thinking_mode: bool,
    #[serde(default = "default_reasoning_open_tag")]
    pub reasoning_open_tag: String,
    #[serde(default = "default_reasoning_close_tag")]
    pub reasoning_close_tag: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single-line records.
    #[default]
    Text,
    /// One JSON object per record.
    Json,
}

fn default_reasoning_open_tag() -> String {
    "<think>\n".to_string()
}
fn default_reasoning_close_tag() -> String {
    "</think>\n\n".to_string()
}
fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            show_reasoning: false,
            enable_thinking_mode: false,
            reasoning_open_tag: default_reasoning_open_tag(),
            reasoning_close_tag: default_reasoning_close_tag(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
}

pub const ENV_API_KEY: &str = "THINKBRIDGE_API_KEY";
pub const ENV_BASE_URL: &str = "THINKBRIDGE_BASE_URL";
pub const ENV_SHOW_REASONING: &str = "THINKBRIDGE_SHOW_REASONING";
pub const ENV_THINKING_MODE: &str = "THINKBRIDGE_THINKING_MODE";
pub const ENV_PORT: &str = "THINKBRIDGE_PORT";

impl AppConfig {
    /// Overlay environment values on top of the parsed file.
    ///
    /// `lookup` is usually `|key| std::env::var(key).ok()`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when a variable is set to a value
    /// that cannot be parsed.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(api_key) = lookup(ENV_API_KEY) {
            self.backend.api_key = api_key;
        }
        if let Some(base_url) = lookup(ENV_BASE_URL) {
            self.backend.base_url = base_url;
        }
        if let Some(raw) = lookup(ENV_SHOW_REASONING) {
            self.features.show_reasoning = parse_env_bool(ENV_SHOW_REASONING, &raw)?;
        }
        if let Some(raw) = lookup(ENV_THINKING_MODE) {
            self.features.enable_thinking_mode = parse_env_bool(ENV_THINKING_MODE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_PORT) {
            self.server.port = raw.trim().parse().map_err(|_| {
                ConfigError::Validation(format!("{ENV_PORT} must be a port number, got '{raw}'"))
            })?;
        }
        Ok(())
    }
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Validation(format!(
            "{name} must be a boolean, got '{raw}'"
        ))),
    }
}

/// Load configuration from a YAML file, apply environment overrides and
/// validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] when an override or a
/// semantic check fails.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let mut config: AppConfig = serde_yaml::from_str(&contents)?;
    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    validate_config(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_load_example_config() {
        let contents = std::fs::read_to_string("config.example.yaml").unwrap();
        let config: AppConfig = serde_yaml::from_str(&contents).unwrap();
        assert!(
            validate_config(&config).is_ok(),
            "example config should validate"
        );
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.routing.fallback_small, "meta/llama-3.1-8b-instruct");
        assert!(config
            .routing
            .models
            .iter()
            .any(|entry| entry.starts_with("gpt-4o:")));
        assert!(!config.features.show_reasoning);
        assert_eq!(config.features.log_format, LogFormat::Text);
    }

    #[test]
    fn test_minimal_yaml_fills_defaults() {
        let config: AppConfig =
            serde_yaml::from_str("backend:\n  api_key: secret\n").unwrap();
        assert_eq!(config.backend.base_url, "https://integrate.api.nvidia.com/v1");
        assert_eq!(config.routing.models.len(), 7);
        assert_eq!(config.features.reasoning_open_tag, "<think>\n");
        assert_eq!(config.features.reasoning_close_tag, "</think>\n\n");
        assert_eq!(config.server.timeout, 180);
        assert_eq!(config.features.log_format, LogFormat::Text);
    }

    #[test]
    fn test_log_format_parses_and_rejects_unknown() {
        let config: AppConfig =
            serde_yaml::from_str("features:\n  log_format: json\n").unwrap();
        assert_eq!(config.features.log_format, LogFormat::Json);
        assert!(serde_yaml::from_str::<AppConfig>("features:\n  log_format: xml\n").is_err());
    }

    #[test]
    fn test_env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_API_KEY, "from-env"),
            (ENV_SHOW_REASONING, "yes"),
            (ENV_THINKING_MODE, "1"),
            (ENV_PORT, "9100"),
        ]);
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(|key| env.get(key).map(|v| (*v).to_string()))
            .unwrap();
        assert_eq!(config.backend.api_key, "from-env");
        assert!(config.features.show_reasoning);
        assert!(config.features.enable_thinking_mode);
        assert_eq!(config.server.port, 9100);
    }

    #[test]
    fn test_env_override_rejects_bad_bool() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env_overrides(|key| (key == ENV_SHOW_REASONING).then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
