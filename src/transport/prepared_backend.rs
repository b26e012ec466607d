use axum::http::{HeaderMap, HeaderValue};

use crate::config::BackendConfig;
use crate::error::GatewayError;

const CHAT_COMPLETIONS_PATH: &str = "chat/completions";

/// Backend endpoint and auth headers, computed once at startup.
#[derive(Debug, Clone)]
pub struct PreparedBackend {
    chat_url: url::Url,
    headers: HeaderMap,
}

impl PreparedBackend {
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] when the base URL cannot be joined or the
    /// API key is not a valid header value.
    pub fn new(config: &BackendConfig) -> Result<Self, GatewayError> {
        let chat_url = build_chat_url(&config.base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key.trim()))
            .map_err(|_| GatewayError::Config("backend.api_key is not a valid header value".into()))?;
        auth.set_sensitive(true);
        headers.insert(http::header::AUTHORIZATION, auth);

        Ok(Self { chat_url, headers })
    }

    #[must_use]
    pub fn chat_url(&self) -> &url::Url {
        &self.chat_url
    }

    /// Headers for a request; streaming asks for an event stream explicitly.
    #[must_use]
    pub fn headers(&self, stream: bool) -> HeaderMap {
        let mut headers = self.headers.clone();
        let accept = if stream {
            HeaderValue::from_static("text/event-stream")
        } else {
            HeaderValue::from_static("application/json")
        };
        headers.insert(http::header::ACCEPT, accept);
        headers
    }
}

fn build_chat_url(base_url: &str) -> Result<url::Url, GatewayError> {
    let mut base = base_url.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    url::Url::parse(&base)
        .and_then(|base| base.join(CHAT_COMPLETIONS_PATH))
        .map_err(|e| GatewayError::Config(format!("Invalid backend base_url '{base_url}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base_url: &str) -> BackendConfig {
        BackendConfig {
            base_url: base_url.to_string(),
            api_key: "nvapi-secret".to_string(),
            proxy: None,
        }
    }

    #[test]
    fn test_chat_url_join() {
        for base in [
            "https://integrate.api.nvidia.com/v1",
            "https://integrate.api.nvidia.com/v1/",
        ] {
            let prepared = PreparedBackend::new(&backend(base)).unwrap();
            assert_eq!(
                prepared.chat_url().as_str(),
                "https://integrate.api.nvidia.com/v1/chat/completions"
            );
        }
    }

    #[test]
    fn test_headers_carry_bearer_and_accept() {
        let prepared = PreparedBackend::new(&backend("http://127.0.0.1:9/v1")).unwrap();
        let headers = prepared.headers(true);
        assert_eq!(headers["authorization"], "Bearer nvapi-secret");
        assert_eq!(headers["accept"], "text/event-stream");
        assert_eq!(prepared.headers(false)["accept"], "application/json");
    }

    #[test]
    fn test_bad_api_key_header_rejected() {
        let mut config = backend("http://127.0.0.1:9/v1");
        config.api_key = "bad\nkey".to_string();
        assert!(PreparedBackend::new(&config).is_err());
    }
}
