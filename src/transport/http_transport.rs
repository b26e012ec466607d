use std::time::Duration;

use crate::config::ServerConfig;
use crate::error::GatewayError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

fn build_reqwest_client(
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Option<Duration>,
    timeout: Duration,
    use_env_proxy: bool,
    proxy_url: Option<&str>,
) -> Result<reqwest::Client, GatewayError> {
    let mut builder = reqwest::Client::builder()
        .pool_max_idle_per_host(pool_max_idle_per_host)
        .pool_idle_timeout(pool_idle_timeout)
        .tcp_nodelay(true)
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout);

    if let Some(proxy_url) = proxy_url {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|err| GatewayError::Config(format!("Invalid proxy URL: {err}")))?;
        builder = builder.no_proxy().proxy(proxy);
    } else if !use_env_proxy {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|err| GatewayError::Config(format!("Failed to build HTTP client: {err}")))
}

/// Outbound HTTP client for the backend. One attempt per call; no retries.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport with pooling and timeouts from the server config.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] when the proxy URL is invalid or the
    /// TLS backend cannot be initialized.
    pub fn new(config: &ServerConfig, proxy_url: Option<&str>) -> Result<Self, GatewayError> {
        let pool_idle_timeout = if config.http_pool_idle_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(config.http_pool_idle_timeout_secs))
        };
        let timeout = Duration::from_secs(config.timeout);
        let client = build_reqwest_client(
            config.http_pool_max_idle_per_host.max(1),
            pool_idle_timeout,
            timeout,
            config.http_use_env_proxy,
            proxy_url,
        )?;
        Ok(Self { client, timeout })
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POST a JSON body and return the response once headers arrive.
    ///
    /// Non-2xx statuses are returned as `Ok`; the caller decides how to read
    /// the body.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Timeout`] when the deadline passes and
    /// [`GatewayError::Transport`] for any other send failure.
    pub async fn post_json(
        &self,
        url: &url::Url,
        headers: &http::HeaderMap,
        body: bytes::Bytes,
    ) -> Result<reqwest::Response, GatewayError> {
        let mut request = reqwest::Request::new(http::Method::POST, url.clone());
        *request.headers_mut() = headers.clone();
        *request.body_mut() = Some(reqwest::Body::from(body));

        self.client.execute(request).await.map_err(|err| {
            let err = GatewayError::from_reqwest(&err);
            tracing::debug!(error = %err, "backend request failed before response headers");
            err
        })
    }
}

/// Read a full response body, mapping read failures the same way as sends.
///
/// # Errors
///
/// Returns [`GatewayError::Timeout`] or [`GatewayError::Transport`].
pub async fn read_body(response: reqwest::Response) -> Result<bytes::Bytes, GatewayError> {
    response
        .bytes()
        .await
        .map_err(|err| GatewayError::from_reqwest(&err))
}
