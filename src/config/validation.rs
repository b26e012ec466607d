use std::collections::HashSet;

use super::{AppConfig, ConfigError};

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_server_config(config)?;
    validate_backend(config)?;
    validate_routing(config)?;
    validate_features(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_server_config(config: &AppConfig) -> Result<(), ConfigError> {
    let server = &config.server;
    if server.http_pool_max_idle_per_host == 0 {
        return Err(validation_err(
            "server.http_pool_max_idle_per_host must be greater than 0",
        ));
    }
    if server.timeout == 0 {
        return Err(validation_err("server.timeout must be greater than 0"));
    }
    if server.runtime_worker_threads == Some(0) {
        return Err(validation_err(
            "server.runtime_worker_threads must be greater than 0 when set",
        ));
    }
    Ok(())
}

fn validate_backend(config: &AppConfig) -> Result<(), ConfigError> {
    let backend = &config.backend;
    if !backend.base_url.starts_with("http://") && !backend.base_url.starts_with("https://") {
        return Err(validation_err(
            "backend.base_url must start with http:// or https://",
        ));
    }
    if let Err(err) = url::Url::parse(&backend.base_url) {
        return Err(validation_err(format!(
            "backend.base_url is not a valid URL: {err}"
        )));
    }
    if backend.api_key.trim().is_empty() {
        return Err(validation_err(
            "backend.api_key cannot be empty (set it in the file or via THINKBRIDGE_API_KEY)",
        ));
    }
    if let Some(proxy) = backend.proxy.as_deref() {
        let valid_scheme = ["http://", "https://", "socks5://", "socks5h://"]
            .iter()
            .any(|scheme| proxy.starts_with(scheme));
        if !valid_scheme || url::Url::parse(proxy).is_err() {
            return Err(validation_err(format!(
                "backend.proxy '{proxy}' must be an http(s) or socks5 URL"
            )));
        }
    }
    Ok(())
}

fn validate_routing(config: &AppConfig) -> Result<(), ConfigError> {
    let routing = &config.routing;
    let mut aliases = HashSet::new();
    for entry in &routing.models {
        let Some((alias, backend_model)) = entry.split_once(':') else {
            return Err(validation_err(format!(
                "routing.models entry '{entry}' must use the 'alias:backend_model' form"
            )));
        };
        if alias.trim().is_empty() || backend_model.trim().is_empty() {
            return Err(validation_err(format!(
                "routing.models entry '{entry}' has an empty alias or backend model"
            )));
        }
        if !aliases.insert(alias) {
            return Err(validation_err(format!(
                "routing.models has a duplicate alias '{alias}'"
            )));
        }
    }
    if routing.fallback_large.trim().is_empty() || routing.fallback_small.trim().is_empty() {
        return Err(validation_err(
            "routing.fallback_large and routing.fallback_small cannot be empty",
        ));
    }
    if routing.large_markers.iter().any(|m| m.trim().is_empty()) {
        return Err(validation_err("routing.large_markers contains an empty marker"));
    }
    Ok(())
}

fn validate_features(config: &AppConfig) -> Result<(), ConfigError> {
    let features = &config.features;
    if features.reasoning_open_tag.is_empty() || features.reasoning_close_tag.is_empty() {
        return Err(validation_err(
            "features.reasoning_open_tag and features.reasoning_close_tag cannot be empty",
        ));
    }
    Ok(())
}

const VALID_LOG_LEVELS: &[&str] = &[
    "TRACE", "DEBUG", "INFO", "WARNING", "WARN", "ERROR", "CRITICAL", "DISABLED",
];

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let level = config.features.log_level.to_uppercase();
    if !VALID_LOG_LEVELS.contains(&level.as_str()) {
        return Err(validation_err(format!(
            "features.log_level '{}' is invalid. Must be one of: {}",
            config.features.log_level,
            VALID_LOG_LEVELS.join(", ")
        )));
    }
    Ok(())
}
