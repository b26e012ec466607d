mod request_id;

use crate::config::AppConfig;
use crate::error::GatewayError;
use crate::protocol::backend::encoder::RequestTransformer;
use crate::protocol::backend::response_decoder::ResponseNormalizer;
use crate::routing::ModelRouter;
use crate::stream::{StreamTranslator, TranslationOptions};
use crate::transport::{HttpTransport, PreparedBackend};

use request_id::RequestIdGenerator;

/// Shared application state accessible to all handlers.
///
/// Everything here is fixed at startup; only the request-id counter moves.
pub struct AppState {
    pub config: AppConfig,
    pub transport: HttpTransport,
    pub model_router: ModelRouter,
    pub backend: PreparedBackend,
    pub request_transformer: RequestTransformer,
    translation_options: TranslationOptions,
    request_ids: RequestIdGenerator,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: AppConfig,
        transport: HttpTransport,
        model_router: ModelRouter,
        backend: PreparedBackend,
    ) -> Self {
        let request_transformer = RequestTransformer::from_features(&config.features);
        let translation_options = TranslationOptions::from_features(&config.features);
        Self {
            config,
            transport,
            model_router,
            backend,
            request_transformer,
            translation_options,
            request_ids: RequestIdGenerator::new(),
        }
    }

    /// Build the full state from a validated config.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] when the HTTP client or backend headers
    /// cannot be built.
    pub fn from_config(config: AppConfig) -> Result<Self, GatewayError> {
        let transport = HttpTransport::new(&config.server, config.backend.proxy.as_deref())?;
        let backend = PreparedBackend::new(&config.backend)?;
        let model_router = ModelRouter::new(&config.routing);
        Ok(Self::new(config, transport, model_router, backend))
    }

    #[must_use]
    pub fn translation_options(&self) -> &TranslationOptions {
        &self.translation_options
    }

    /// Fresh per-request stream translator.
    #[must_use]
    pub fn stream_translator(&self) -> StreamTranslator {
        StreamTranslator::new(self.translation_options.clone())
    }

    #[must_use]
    pub fn response_normalizer(&self) -> ResponseNormalizer {
        ResponseNormalizer::new(self.translation_options.clone())
    }

    pub fn next_request_seq(&self) -> u64 {
        self.request_ids.next_seq()
    }

    #[must_use]
    pub fn request_uuid(&self, request_seq: u64) -> uuid::Uuid {
        self.request_ids.request_uuid(request_seq)
    }

    /// `chatcmpl-` id for a new completion.
    #[must_use]
    pub fn completion_id(&self, request_seq: u64) -> String {
        format!("chatcmpl-{}", self.request_uuid(request_seq).simple())
    }
}
