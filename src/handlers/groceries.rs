//! Transcript parsing endpoint: the text fallback when the real-time
//! session is unavailable.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::core::groceries::item::MutationRecord;
use crate::core::groceries::prompts::extraction_prompt;
use crate::core::groceries::reconcile::reconcile_mutations;
use crate::diag::DiagLevel;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(rename = "usualGroceries", default)]
    pub usual_groceries: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ParseResponse {
    pub success: bool,
    pub groceries: Vec<MutationRecord>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    response_format: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

type HandlerError = (StatusCode, Json<serde_json::Value>);

fn internal_error(details: impl Into<String>) -> HandlerError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "Failed to extract groceries",
            "details": details.into(),
        })),
    )
}

/// POST /v1/groceries/parse
///
/// Runs the extraction prompt against the chat model and returns the
/// validated mutations. An upstream rate limit is relayed as 429 so clients
/// can back off rather than treat it as a hard failure.
pub async fn parse_transcript(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ParseRequest>,
) -> Result<Json<ParseResponse>, HandlerError> {
    let transcript = match request.transcript.as_deref() {
        Some(t) if !t.trim().is_empty() => t,
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Invalid transcript provided"})),
            ));
        }
    };

    let Some(api_key) = state.config.openai_api_key.as_deref() else {
        return Err(internal_error("Missing OpenAI API key"));
    };

    info!("Extracting groceries from transcript ({} chars)", transcript.len());
    let prompt = extraction_prompt(request.usual_groceries.as_deref());

    let chat_request = ChatRequest {
        model: &state.config.chat_model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: &prompt,
            },
            ChatMessage {
                role: "user",
                content: transcript,
            },
        ],
        temperature: 0.0,
        max_tokens: 2048,
        response_format: json!({"type": "json_object"}),
    };

    let response = state
        .http
        .post(format!("{}/chat/completions", state.config.openai_base_url))
        .bearer_auth(api_key)
        .json(&chat_request)
        .send()
        .await
        .map_err(|e| {
            error!("Chat completion request failed: {}", e);
            internal_error(e.to_string())
        })?;

    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        warn!("Upstream rate limit hit during extraction");
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"error": "Rate limit exceeded. Please try again later."})),
        ));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!("Chat completion error: {} {}", status, body);
        return Err(internal_error(format!("Upstream returned {status}")));
    }

    let chat: ChatResponse = response
        .json()
        .await
        .map_err(|e| internal_error(e.to_string()))?;
    let content = chat
        .choices
        .first()
        .map(|c| c.message.content.as_str())
        .ok_or_else(|| internal_error("Upstream returned no choices"))?;

    // The model occasionally returns prose instead of JSON; that is an
    // empty extraction, not a server error.
    let parsed: serde_json::Value = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(e) => {
            warn!("Extraction response was not valid JSON: {}", e);
            state.diag.log(
                DiagLevel::Json,
                "Discarded non-JSON extraction response",
                Some(json!({"content": content})),
            );
            return Ok(Json(ParseResponse {
                success: true,
                groceries: Vec::new(),
            }));
        }
    };

    let groceries = match parsed.get("items").and_then(|i| i.as_array()) {
        Some(items) => reconcile_mutations(items),
        None => {
            warn!("Extraction response carried no items array");
            Vec::new()
        }
    };

    state.diag.log(
        DiagLevel::Items,
        format!("Fallback extraction produced {} mutations", groceries.len()),
        None,
    );

    Ok(Json(ParseResponse {
        success: true,
        groceries,
    }))
}
