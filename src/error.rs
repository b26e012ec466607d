use serde::Serialize;

use crate::protocol::error_shapes::openai_error_payload;

const GENERIC_PROXY_MESSAGE: &str = "Proxy error while contacting the backend";
const MAX_BACKEND_MESSAGE_LEN: usize = 500;

/// Crate-wide error type for everything that can go wrong around a backend call.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),
    #[error("Request body too large: {0}")]
    PayloadTooLarge(String),
    /// The backend answered with a non-2xx status.
    #[error("Backend error: status={status}, message={message}")]
    Backend { status: u16, message: String },
    /// The backend answered 2xx but the payload has no usable `choices`.
    #[error("Invalid backend response: {0}")]
    InvalidBackendResponse(String),
    #[error("Backend timeout: {0}")]
    Timeout(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Malformed backend payload: {0}")]
    MalformedPayload(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Build a [`GatewayError::Backend`] from a non-2xx backend reply, pulling the
    /// backend's own message out of the body when one is present.
    #[must_use]
    pub fn from_backend_status(status: u16, body: &[u8]) -> Self {
        let message = backend_error_message(body)
            .unwrap_or_else(|| format!("Backend request failed with status {status}"));
        GatewayError::Backend { status, message }
    }

    /// Map a `reqwest` failure onto the timeout / transport split.
    #[must_use]
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            GatewayError::Backend {
                status: status.as_u16(),
                message: format!("Backend request failed with status {}", status.as_u16()),
            }
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

/// Client-visible error category, serialized as the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ApiError,
    TimeoutError,
    ProxyError,
    InvalidRequestError,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ApiError => "api_error",
            ErrorKind::TimeoutError => "timeout_error",
            ErrorKind::ProxyError => "proxy_error",
            ErrorKind::InvalidRequestError => "invalid_request_error",
        }
    }
}

/// A fully classified error: what the client sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedError {
    pub status: http::StatusCode,
    pub message: String,
    pub kind: ErrorKind,
}

impl NormalizedError {
    fn new(status: http::StatusCode, message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            status,
            message: message.into(),
            kind,
        }
    }

    #[must_use]
    pub fn payload(&self) -> serde_json::Value {
        openai_error_payload(self.kind, self.status, &self.message)
    }
}

/// Classify a failure into the client-facing error taxonomy.
///
/// Order: timeouts first, then backend-reported statuses, then request-side
/// problems; anything left over is a `proxy_error`.
#[must_use]
pub fn classify(err: &GatewayError) -> NormalizedError {
    use http::StatusCode;

    match err {
        GatewayError::Timeout(_) => NormalizedError::new(
            StatusCode::GATEWAY_TIMEOUT,
            "Backend request timed out",
            ErrorKind::TimeoutError,
        ),
        GatewayError::Backend { status, message } => {
            match StatusCode::from_u16(*status) {
                Ok(status) if !status.is_success() => {
                    NormalizedError::new(status, message.as_str(), ErrorKind::ApiError)
                }
                // A "failure" carrying a success or out-of-range status is not
                // something we can echo.
                _ => NormalizedError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    GENERIC_PROXY_MESSAGE,
                    ErrorKind::ProxyError,
                ),
            }
        }
        GatewayError::InvalidBackendResponse(message) => {
            NormalizedError::new(StatusCode::BAD_GATEWAY, message.as_str(), ErrorKind::ApiError)
        }
        GatewayError::InvalidRequest(message) => NormalizedError::new(
            StatusCode::BAD_REQUEST,
            message.as_str(),
            ErrorKind::InvalidRequestError,
        ),
        GatewayError::NotFound(message) => NormalizedError::new(
            StatusCode::NOT_FOUND,
            message.as_str(),
            ErrorKind::InvalidRequestError,
        ),
        GatewayError::MethodNotAllowed(message) => NormalizedError::new(
            StatusCode::METHOD_NOT_ALLOWED,
            message.as_str(),
            ErrorKind::InvalidRequestError,
        ),
        GatewayError::PayloadTooLarge(message) => NormalizedError::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            message.as_str(),
            ErrorKind::InvalidRequestError,
        ),
        GatewayError::Transport(message)
        | GatewayError::MalformedPayload(message)
        | GatewayError::Config(message)
        | GatewayError::Internal(message) => {
            let message = if message.is_empty() {
                GENERIC_PROXY_MESSAGE
            } else {
                message.as_str()
            };
            NormalizedError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                message,
                ErrorKind::ProxyError,
            )
        }
    }
}

/// Extract a human-readable message from a backend error body.
///
/// Looks at `error.message`, a bare `error` string, then top-level
/// `message` / `detail`. Raw non-JSON text is used as-is when short enough
/// to be a message rather than a page.
fn backend_error_message(body: &[u8]) -> Option<String> {
    if let Ok(json) = serde_json::from_slice::<serde_json::Value>(body) {
        let candidate = json
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(serde_json::Value::as_str)
            .or_else(|| json.get("error").and_then(serde_json::Value::as_str))
            .or_else(|| json.get("message").and_then(serde_json::Value::as_str))
            .or_else(|| json.get("detail").and_then(serde_json::Value::as_str));
        return candidate
            .filter(|msg| !msg.trim().is_empty())
            .map(truncate_message);
    }

    let raw = String::from_utf8_lossy(body);
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('<') {
        return None;
    }
    Some(truncate_message(raw))
}

fn truncate_message(msg: &str) -> String {
    if msg.len() <= MAX_BACKEND_MESSAGE_LEN {
        return msg.to_string();
    }
    let mut end = MAX_BACKEND_MESSAGE_LEN;
    while !msg.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &msg[..end])
}

// ---------------------------------------------------------------------------
// Axum integration
// ---------------------------------------------------------------------------

impl axum::response::IntoResponse for NormalizedError {
    fn into_response(self) -> axum::response::Response {
        (self.status, axum::Json(self.payload())).into_response()
    }
}

impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        classify(&self).into_response()
    }
}
