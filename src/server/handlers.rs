//! Endpoint handlers. Thin glue: validate, delegate to the forwarder,
//! wrap the result in the caller's dialect.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde_json::{json, Value};

use super::error::{ApiError, Dialect};
use super::{sse, AppState};
use crate::config;
use crate::parser;
use crate::upstream::ChatRequest;

/// `GET /health`
pub async fn health() -> &'static str {
    "OK"
}

/// `GET /`
pub async fn root() -> Json<Value> {
    Json(json!({
        "name": config::NAME,
        "version": config::VERSION,
        "description": config::DESCRIPTION,
    }))
}

/// `POST /v1/chat/completions`, the OpenAI dialect.
pub async fn chat_completions(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let value: Value = serde_json::from_slice(&body)
        .map_err(|err| ApiError::invalid(Dialect::OpenAi, format!("invalid JSON body: {err}")))?;

    if value
        .get("model")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .is_none()
    {
        return Err(ApiError::invalid(
            Dialect::OpenAi,
            "missing required field: model",
        ));
    }
    if value.get("messages").and_then(Value::as_array).is_none() {
        return Err(ApiError::invalid(
            Dialect::OpenAi,
            "missing required field: messages",
        ));
    }

    // Re-parse from the raw bytes so tool parameter schemas stay verbatim.
    let request: ChatRequest = serde_json::from_slice(&body)
        .map_err(|err| ApiError::invalid(Dialect::OpenAi, format!("malformed request: {err}")))?;

    if request.stream {
        let stream = state
            .forwarder
            .chat_completion_openai_stream(request)
            .await
            .map_err(|err| ApiError::internal(Dialect::OpenAi, err.to_string()))?;
        Ok(sse::relay(stream))
    } else {
        let response = state
            .forwarder
            .chat_completion_openai(request)
            .await
            .map_err(|err| ApiError::internal(Dialect::OpenAi, err.to_string()))?;
        Ok(Json(response).into_response())
    }
}

/// `POST /v1/messages`, the Anthropic dialect.
pub async fn messages(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request = parser::parse_anthropic_request(&body)
        .map_err(|err| ApiError::invalid(Dialect::Anthropic, err.to_string()))?;

    if request.stream {
        let stream = state
            .forwarder
            .messages_anthropic_stream(request)
            .await
            .map_err(|err| ApiError::internal(Dialect::Anthropic, err.to_string()))?;
        Ok(sse::relay(stream))
    } else {
        let response = state
            .forwarder
            .messages_anthropic(request)
            .await
            .map_err(|err| ApiError::internal(Dialect::Anthropic, err.to_string()))?;
        Ok(Json(response).into_response())
    }
}

/// `GET /v1/models`: the upstream listing in OpenAI list shape.
pub async fn list_models(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let token = state
        .credentials
        .valid_api_token()
        .await
        .map_err(|err| ApiError::internal(Dialect::OpenAi, err.to_string()))?;
    let models = state
        .upstream
        .list_models(&token)
        .await
        .map_err(|err| ApiError::internal(Dialect::OpenAi, err.to_string()))?;

    let data: Vec<Value> = models
        .iter()
        .map(|model| {
            json!({
                "id": model.id,
                "object": "model",
                "owned_by": "copilot",
            })
        })
        .collect();

    Ok(Json(json!({ "object": "list", "data": data })))
}

/// `POST /v1/messages/count_tokens`, answered locally with an estimate;
/// the upstream has no counterpart and Anthropic clients call this
/// aggressively at startup.
pub async fn count_tokens(body: Bytes) -> Result<Json<Value>, ApiError> {
    let value: Value = serde_json::from_slice(&body)
        .map_err(|err| ApiError::invalid(Dialect::Anthropic, format!("invalid JSON body: {err}")))?;

    let mut chars = 0usize;
    if let Some(system) = value.get("system") {
        chars += rendered_len(system);
    }
    for message in value
        .get("messages")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        if let Some(content) = message.get("content") {
            chars += rendered_len(content);
        }
    }

    // Rough chars-per-token heuristic (rounded up); good enough for
    // client-side budgeting.
    let input_tokens = ((chars + 3) / 4).max(1);
    Ok(Json(json!({ "input_tokens": input_tokens })))
}

fn rendered_len(content: &Value) -> usize {
    match content {
        Value::String(text) => text.len(),
        other => other.to_string().len(),
    }
}
