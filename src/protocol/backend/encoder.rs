use crate::config::FeaturesConfig;
use crate::protocol::openai_chat::ChatRequest;

use super::{BackendRequest, ThinkingExtension};

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const MAX_TOKENS_CEILING: u32 = 2048;
const FIXED_TOP_P: f64 = 1.0;

/// Builds backend request bodies from client requests.
///
/// Holds only the thinking-mode toggle, fixed at construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestTransformer {
    thinking_mode: bool,
}

impl RequestTransformer {
    #[must_use]
    pub fn new(thinking_mode: bool) -> Self {
        Self { thinking_mode }
    }

    #[must_use]
    pub fn from_features(features: &FeaturesConfig) -> Self {
        Self::new(features.enable_thinking_mode)
    }

    #[must_use]
    pub fn thinking_mode(&self) -> bool {
        self.thinking_mode
    }

    /// Encode `req` for the backend, targeting `backend_model`.
    #[must_use]
    pub fn build(&self, req: &ChatRequest, backend_model: &str) -> BackendRequest {
        BackendRequest {
            model: backend_model.to_string(),
            messages: req.messages.clone(),
            temperature: effective_temperature(req.temperature),
            top_p: FIXED_TOP_P,
            max_tokens: clamp_max_tokens(req.max_tokens),
            stream: req.is_stream(),
            chat_template_kwargs: self
                .thinking_mode
                .then_some(ThinkingExtension { thinking: true }),
        }
    }
}

/// Clamp into `(0, 2048]`. Absent or zero means "use the default".
#[must_use]
pub fn clamp_max_tokens(requested: Option<i64>) -> u32 {
    match requested {
        None | Some(0) => DEFAULT_MAX_TOKENS,
        Some(n) if n < 0 => 1,
        Some(n) => u32::try_from(n).map_or(MAX_TOKENS_CEILING, |n| n.min(MAX_TOKENS_CEILING)),
    }
}

/// Zero and non-finite values count as "not set".
#[must_use]
pub fn effective_temperature(requested: Option<f64>) -> f64 {
    match requested {
        Some(t) if t.is_finite() && t != 0.0 => t,
        _ => DEFAULT_TEMPERATURE,
    }
}
