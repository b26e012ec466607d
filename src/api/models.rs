use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};

use crate::error::GatewayError;
use crate::protocol::openai_chat::{ModelCard, ModelList};
use crate::state::AppState;

use super::response::ok_json_response;

const MODEL_CREATED_AT: u64 = 1_677_610_602;

/// List the client-facing model names from the routing table.
#[must_use]
pub fn handler(State(state): State<Arc<AppState>>) -> Response {
    let list = model_list(&state);
    match serde_json::to_vec(&list) {
        Ok(body) => ok_json_response(body.into()),
        Err(e) => GatewayError::Internal(format!("Failed to encode model list: {e}")).into_response(),
    }
}

fn model_list(state: &AppState) -> ModelList {
    let owned_by = &state.config.routing.owned_by;
    ModelList {
        object: "list".to_string(),
        data: state
            .model_router
            .client_models()
            .iter()
            .map(|id| ModelCard {
                id: id.to_string(),
                object: "model".to_string(),
                created: MODEL_CREATED_AT,
                owned_by: owned_by.clone(),
            })
            .collect(),
    }
}
