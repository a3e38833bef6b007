//! Negotiation relay: forwards a local SDP offer to the upstream real-time
//! endpoint and returns the remote answer.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::diag::DiagLevel;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OfferRequest {
    pub offer: String,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub answer: String,
}

/// POST /v1/realtime/offer
///
/// The upstream expects the raw SDP with a bearer key; failures are relayed
/// to the caller with the upstream's status so the client can distinguish
/// auth problems from capacity problems.
pub async fn relay_offer(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OfferRequest>,
) -> Result<Json<AnswerResponse>, (StatusCode, Json<serde_json::Value>)> {
    let Some(api_key) = state.config.openai_api_key.as_deref() else {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Missing OpenAI API key"})),
        ));
    };

    let url = format!(
        "{}/realtime?model={}",
        state.config.openai_base_url, state.config.realtime_model
    );
    info!("Relaying SDP offer ({} bytes)", request.offer.len());

    let response = state
        .http
        .post(&url)
        .bearer_auth(api_key)
        .header("Content-Type", "application/sdp")
        .body(request.offer)
        .send()
        .await
        .map_err(|e| {
            error!("Negotiation relay request failed: {}", e);
            state
                .diag
                .log(DiagLevel::Error, format!("Negotiation relay failed: {e}"), None);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": format!("Fetch error: {e}")})),
            )
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!("Upstream negotiation error: {} {}", status, body);
        state.diag.log(
            DiagLevel::Error,
            format!("Upstream negotiation error: {status}"),
            None,
        );
        let relayed =
            StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return Err((
            relayed,
            Json(json!({"error": format!("OpenAI API error: {} {}", status.as_u16(), body)})),
        ));
    }

    let answer = response.text().await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": format!("Fetch error: {e}")})),
        )
    })?;

    state
        .diag
        .log(DiagLevel::Audio, "SDP answer relayed", None);
    Ok(Json(AnswerResponse { answer }))
}

#[cfg(test)]
mod tests {
    use crate::config::ServerConfig;
    use crate::routes::create_api_router;
    use crate::state::AppState;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app(config: ServerConfig) -> axum::Router {
        create_api_router().with_state(AppState::new(config))
    }

    fn offer_request() -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/realtime/offer")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"offer": "v=0 test-offer"}"#))
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_api_key_is_server_error() {
        let config = ServerConfig {
            openai_api_key: None,
            ..Default::default()
        };
        let response = app(config).oneshot(offer_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "Missing OpenAI API key");
    }

    #[tokio::test]
    async fn test_offer_relayed_with_sdp_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/realtime"))
            .and(header("content-type", "application/sdp"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_string("v=0 test-answer"))
            .mount(&server)
            .await;

        let config = ServerConfig {
            openai_api_key: Some("sk-test".to_string()),
            openai_base_url: server.uri(),
            ..Default::default()
        };
        let response = app(config).oneshot(offer_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["answer"], "v=0 test-answer");
    }

    #[tokio::test]
    async fn test_upstream_error_status_relayed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/realtime"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let config = ServerConfig {
            openai_api_key: Some("sk-bad".to_string()),
            openai_base_url: server.uri(),
            ..Default::default()
        };
        let response = app(config).oneshot(offer_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
