use crate::error::ErrorKind;

/// OpenAI-style error envelope. `code` mirrors the HTTP status.
#[must_use]
pub(crate) fn openai_error_payload(
    kind: ErrorKind,
    status: http::StatusCode,
    message: &str,
) -> serde_json::Value {
    serde_json::json!({
        "error": {
            "message": message,
            "type": kind.as_str(),
            "code": status.as_u16(),
        }
    })
}
