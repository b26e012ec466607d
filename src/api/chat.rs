use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use futures_util::TryStreamExt;

use crate::error::{classify, GatewayError};
use crate::observability::log_request_complete;
use crate::protocol::openai_chat::{ChatRequest, Usage};
use crate::state::AppState;
use crate::stream::translate_stream;
use crate::transport::read_body;

use super::response::{ok_json_response, sse_ok_response};

/// `POST /v1/chat/completions`.
pub async fn handler(State(state): State<Arc<AppState>>, body: bytes::Bytes) -> Response {
    match handle(&state, body).await {
        Ok(response) => response,
        Err(err) => {
            let normalized = classify(&err);
            tracing::warn!(
                status = normalized.status.as_u16(),
                kind = normalized.kind.as_str(),
                error = %err,
                "chat completion failed"
            );
            normalized.into_response()
        }
    }
}

async fn handle(state: &Arc<AppState>, body: bytes::Bytes) -> Result<Response, GatewayError> {
    let started = Instant::now();
    let request: ChatRequest = serde_json::from_slice(&body)
        .map_err(|e| GatewayError::InvalidRequest(format!("Invalid request body: {e}")))?;

    let request_seq = state.next_request_seq();
    let route = state.model_router.route(&request.model);
    let backend_request = state.request_transformer.build(&request, route.backend_model);
    tracing::info!(
        request_seq,
        client_model = %request.model,
        backend_model = route.backend_model,
        route = ?route.kind,
        stream = backend_request.stream,
        thinking = backend_request.chat_template_kwargs.is_some(),
        "routing chat completion"
    );

    let payload = serde_json::to_vec(&backend_request)
        .map_err(|e| GatewayError::Internal(format!("Failed to encode backend request: {e}")))?;
    let stream = backend_request.stream;
    let headers = state.backend.headers(stream);
    let response = state
        .transport
        .post_json(state.backend.chat_url(), &headers, payload.into())
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = read_body(response).await.unwrap_or_default();
        return Err(GatewayError::from_backend_status(status.as_u16(), &body));
    }

    if stream {
        let upstream = response
            .bytes_stream()
            .map_err(|e| GatewayError::from_reqwest(&e));
        let frames = translate_stream(upstream, state.stream_translator(), request.model);
        return Ok(sse_ok_response(Body::from_stream(frames)));
    }

    let body = read_body(response).await?;
    let completion_id = state.completion_id(request_seq);
    let completion =
        state
            .response_normalizer()
            .normalize(&body, &request.model, &completion_id)?;
    log_request_complete(
        &request.model,
        &Usage::from_value(&completion.usage),
        started,
    );

    let encoded = serde_json::to_vec(&completion)
        .map_err(|e| GatewayError::Internal(format!("Failed to encode completion: {e}")))?;
    Ok(ok_json_response(encoded.into()))
}
