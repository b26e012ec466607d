use crate::error::GatewayError;
use crate::protocol::openai_chat::{ChatChoice, ChatMessage, ChatResponse, Usage};
use crate::stream::splice::{splice_complete, TranslationOptions};
use crate::util::unix_now_secs;

use super::BackendResponse;

const DEFAULT_ROLE: &str = "assistant";
const DEFAULT_FINISH_REASON: &str = "stop";
const INVALID_FORMAT_MESSAGE: &str = "Invalid response format from backend";

/// Turns a complete backend JSON body into a client-facing chat completion.
#[derive(Debug, Clone, Default)]
pub struct ResponseNormalizer {
    options: TranslationOptions,
}

impl ResponseNormalizer {
    #[must_use]
    pub fn new(options: TranslationOptions) -> Self {
        Self { options }
    }

    /// Normalize a raw backend body.
    ///
    /// The envelope is synthesized here: `response_id` and the current time, with
    /// `model` set to the client-facing name rather than the backend id.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MalformedPayload`] when the body is not JSON and
    /// [`GatewayError::InvalidBackendResponse`] when `choices` is missing, not a
    /// list, or empty.
    pub fn normalize(
        &self,
        body: &[u8],
        client_model: &str,
        response_id: &str,
    ) -> Result<ChatResponse, GatewayError> {
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| GatewayError::MalformedPayload(format!("backend body is not JSON: {e}")))?;
        self.normalize_value(value, client_model, response_id)
    }

    /// Normalize an already-parsed backend body.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidBackendResponse`] when `choices` is unusable.
    pub fn normalize_value(
        &self,
        value: serde_json::Value,
        client_model: &str,
        response_id: &str,
    ) -> Result<ChatResponse, GatewayError> {
        if !value
            .get("choices")
            .and_then(serde_json::Value::as_array)
            .is_some_and(|choices| !choices.is_empty())
        {
            return Err(GatewayError::InvalidBackendResponse(
                INVALID_FORMAT_MESSAGE.to_string(),
            ));
        }
        let backend: BackendResponse = serde_json::from_value(value).map_err(|e| {
            GatewayError::InvalidBackendResponse(format!("{INVALID_FORMAT_MESSAGE}: {e}"))
        })?;

        let choices = backend
            .choices
            .into_iter()
            .enumerate()
            .map(|(position, choice)| {
                let message = choice.message.unwrap_or_default();
                let content = splice_complete(
                    &self.options,
                    message.reasoning_content.as_deref(),
                    message.content.as_deref().unwrap_or_default(),
                );
                ChatChoice {
                    index: choice
                        .index
                        .unwrap_or_else(|| u32::try_from(position).unwrap_or(u32::MAX)),
                    message: ChatMessage {
                        role: message.role.unwrap_or_else(|| DEFAULT_ROLE.to_string()),
                        content,
                    },
                    finish_reason: choice
                        .finish_reason
                        .unwrap_or_else(|| DEFAULT_FINISH_REASON.to_string()),
                }
            })
            .collect();

        Ok(ChatResponse {
            id: response_id.to_string(),
            object: "chat.completion".to_string(),
            created: unix_now_secs(),
            model: client_model.to_string(),
            choices,
            usage: backend
                .usage
                .unwrap_or_else(|| Usage::default().to_value()),
        })
    }
}
