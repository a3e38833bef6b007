//! Text-based extraction fallback.
//!
//! When the real-time session is unavailable the captured transcript is sent
//! to the parse endpoint, which runs the extraction prompt against a chat
//! model and returns validated mutations.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::item::MutationRecord;

/// Errors from the extraction fallback.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Extraction request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Extraction endpoint returned {status}: {message}")]
    Endpoint { status: u16, message: String },

    #[error("Extraction endpoint returned an invalid response")]
    InvalidResponse,
}

#[derive(Debug, Serialize)]
struct ParseRequest<'a> {
    transcript: &'a str,
    #[serde(rename = "usualGroceries", skip_serializing_if = "Option::is_none")]
    usual_groceries: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ParseResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    groceries: Vec<MutationRecord>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the transcript parse endpoint.
#[derive(Debug, Clone)]
pub struct GroceryExtractor {
    client: reqwest::Client,
    endpoint: String,
}

impl GroceryExtractor {
    /// `base_url` is the server root, e.g. `http://localhost:8080`.
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/v1/groceries/parse", base_url.trim_end_matches('/')),
        }
    }

    /// Extract grocery mutations from a transcript.
    pub async fn extract(
        &self,
        transcript: &str,
        usual_groceries: Option<&str>,
    ) -> Result<Vec<MutationRecord>, ExtractionError> {
        debug!("Extracting groceries from transcript ({} chars)", transcript.len());

        let response = self
            .client
            .post(&self.endpoint)
            .json(&ParseRequest {
                transcript,
                usual_groceries,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            let message = body
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("Unknown error")
                .to_string();
            warn!("Extraction endpoint failed with {}: {}", status, message);
            return Err(ExtractionError::Endpoint {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ParseResponse = response
            .json()
            .await
            .map_err(|_| ExtractionError::InvalidResponse)?;

        if !parsed.success {
            return Err(ExtractionError::Endpoint {
                status: status.as_u16(),
                message: parsed.error.unwrap_or_else(|| "Extraction failed".to_string()),
            });
        }

        Ok(parsed.groceries)
    }
}
