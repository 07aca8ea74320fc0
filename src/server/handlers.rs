//! Request handlers for the backend API
//!
//! Every error response is `{"message": text}` with a fixed message; the
//! underlying cause is logged, never returned.

use crate::chat::ChatMessage;
use crate::comparison::ComparisonResult;
use crate::prompts::{comparison_schema, generate_chat_instruction, generate_comparison_prompt};
use crate::providers::{to_provider_history, ChatPrompt};
use crate::server::ServerState;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use futures::StreamExt;
use serde::Deserialize;

pub const METHOD_NOT_ALLOWED_MESSAGE: &str = "Only POST requests are allowed";
pub const MISSING_DEVICES_MESSAGE: &str = "Please provide both device names.";
pub const MISSING_PARAMETERS_MESSAGE: &str = "Missing required parameters.";
pub const COMPARE_FAILED_MESSAGE: &str = "Failed to get comparison data from AI.";
pub const CHAT_FAILED_MESSAGE: &str = "Failed to get chat response from AI.";

/// `/api/compare` request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareBody {
    #[serde(default)]
    pub device_one: Option<String>,
    #[serde(default)]
    pub device_two: Option<String>,
}

/// `/api/chat` request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    #[serde(default)]
    pub history: Option<Vec<ChatMessage>>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub device_one_name: Option<String>,
    #[serde(default)]
    pub device_two_name: Option<String>,
}

/// JSON error response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
}

impl ApiError {
    fn new(status: StatusCode, message: &'static str) -> Self {
        Self { status, message }
    }

    fn bad_request(message: &'static str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn internal(message: &'static str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "message": self.message })),
        )
            .into_response()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// POST `/api/compare`
pub async fn compare(
    State(state): State<ServerState>,
    payload: Result<Json<CompareBody>, JsonRejection>,
) -> Result<Json<ComparisonResult>, ApiError> {
    let Json(body) = payload.map_err(|rejection| {
        tracing::debug!("Rejected compare body: {}", rejection);
        ApiError::bad_request(MISSING_DEVICES_MESSAGE)
    })?;

    let (Some(device_one), Some(device_two)) =
        (non_blank(body.device_one), non_blank(body.device_two))
    else {
        return Err(ApiError::bad_request(MISSING_DEVICES_MESSAGE));
    };

    tracing::info!(
        provider = state.provider.name(),
        "Comparing {} and {}",
        device_one,
        device_two
    );

    let prompt = generate_comparison_prompt(&device_one, &device_two);
    let raw = state
        .provider
        .generate_structured(&prompt, &comparison_schema())
        .await
        .map_err(|e| {
            tracing::error!("Error in /api/compare: {:#}", e);
            ApiError::internal(COMPARE_FAILED_MESSAGE)
        })?;

    let result = ComparisonResult::from_json(&raw).map_err(|e| {
        tracing::error!("Provider returned an unusable comparison: {:#}", e);
        ApiError::internal(COMPARE_FAILED_MESSAGE)
    })?;

    Ok(Json(result))
}

/// POST `/api/chat`
///
/// The reply streams as raw `text/plain` fragments. A provider failure
/// before the first fragment is a 500; a later failure aborts the body.
pub async fn chat(
    State(state): State<ServerState>,
    payload: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = payload.map_err(|rejection| {
        tracing::debug!("Rejected chat body: {}", rejection);
        ApiError::bad_request(MISSING_PARAMETERS_MESSAGE)
    })?;

    let (Some(history), Some(message), Some(device_one), Some(device_two)) = (
        body.history,
        non_blank(body.message),
        non_blank(body.device_one_name),
        non_blank(body.device_two_name),
    ) else {
        return Err(ApiError::bad_request(MISSING_PARAMETERS_MESSAGE));
    };

    let prompt = ChatPrompt {
        system_instruction: generate_chat_instruction(&device_one, &device_two),
        history: to_provider_history(&history),
        message,
    };

    tracing::debug!(
        provider = state.provider.name(),
        "Chat turn with {} context turns",
        prompt.history.len()
    );

    let mut stream = state.provider.stream_chat(prompt).await.map_err(|e| {
        tracing::error!("Error in /api/chat: {:#}", e);
        ApiError::internal(CHAT_FAILED_MESSAGE)
    })?;

    // Pull the first fragment so an early failure still gets a status code.
    let first = match stream.next().await {
        Some(Ok(text)) => Some(text),
        Some(Err(e)) => {
            tracing::error!("Error in /api/chat: {:#}", e);
            return Err(ApiError::internal(CHAT_FAILED_MESSAGE));
        }
        None => None,
    };

    let body = futures::stream::iter(first.map(Ok::<String, anyhow::Error>))
        .chain(stream)
        .map(|item| {
            item.map(Bytes::from).map_err(|e| {
                tracing::warn!("Chat stream aborted: {:#}", e);
                std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
            })
        });

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(body),
    )
        .into_response())
}

/// Any non-POST method on an API route
pub async fn method_not_allowed() -> ApiError {
    ApiError::new(StatusCode::METHOD_NOT_ALLOWED, METHOD_NOT_ALLOWED_MESSAGE)
}

/// GET `/healthz`
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
