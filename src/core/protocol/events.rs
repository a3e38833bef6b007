//! Wire-format event types for the real-time data channel.
//!
//! All events are JSON-encoded, one per channel message, discriminated by a
//! `type` string.
//!
//! # Protocol Overview
//!
//! Client events (sent to server):
//! - session.update - Configure voice, instructions, audio format, turn
//!   detection, and the tool schema; sent once when the channel opens
//!
//! Server events (received from server):
//! - session.error - Fatal session error
//! - conversation.item.input_audio_transcription.delta - User transcript chunk
//! - conversation.item.input_audio_transcription.completed - User transcript
//! - response.audio_transcript.delta - Assistant transcript chunk
//! - response.output_item.added - Output item added (function call start)
//! - response.output_item.done - Output item done (function call complete)
//! - response.function_call_arguments.delta - Streamed argument fragment
//! - response.function_call_arguments.done - Arguments complete
//! - response.created - Response generation started
//! - response.done - Response finished (completed/failed/cancelled)
//!
//! Payloads with any other `type` must be ignored, never rejected.

use serde::{Deserialize, Serialize};

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration carried by the outbound `session.update` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Voice for audio output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// System instructions for the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Input audio format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<String>,

    /// Turn detection configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<TurnDetection>,

    /// Tool definitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDef>>,

    /// Tool choice strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
}

/// Turn detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        /// Activation threshold
        #[serde(skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        /// Audio prefix padding in ms
        #[serde(skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        /// Silence duration in ms
        #[serde(skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
    },
    /// No automatic turn detection
    #[serde(rename = "none")]
    None {},
}

/// Tool definition advertised in the session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    /// Tool type (always "function")
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function name
    pub name: String,
    /// Function description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Function parameters JSON schema
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

// =============================================================================
// Client Events (sent to server)
// =============================================================================

/// Client events sent over the data channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Update session configuration
    #[serde(rename = "session.update")]
    SessionUpdate {
        /// Session configuration
        session: SessionConfig,
    },
}

// =============================================================================
// Server Events (received from server)
// =============================================================================

/// Server events received over the data channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Fatal session error
    #[serde(rename = "session.error")]
    SessionError {
        /// Error details
        error: ApiError,
    },

    /// User input transcription chunk
    #[serde(rename = "conversation.item.input_audio_transcription.delta")]
    InputTranscriptionDelta {
        /// Transcript delta
        delta: String,
    },

    /// User input transcription completed
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputTranscriptionCompleted {
        /// Full transcript
        transcript: String,
    },

    /// Assistant audio transcript chunk
    #[serde(rename = "response.audio_transcript.delta")]
    AudioTranscriptDelta {
        /// Transcript delta
        delta: String,
    },

    /// Output item added to response
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded {
        /// Item
        item: OutputItem,
    },

    /// Output item done
    #[serde(rename = "response.output_item.done")]
    OutputItemDone {
        /// Item
        item: OutputItem,
    },

    /// Function call arguments delta
    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta {
        /// Arguments delta (not independently valid JSON)
        delta: String,
    },

    /// Function call arguments done
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        /// Full arguments
        #[serde(default)]
        arguments: String,
    },

    /// Response created
    #[serde(rename = "response.created")]
    ResponseCreated {
        /// Response information
        response: ResponseSummary,
    },

    /// Response done
    #[serde(rename = "response.done")]
    ResponseDone {
        /// Response information
        response: ResponseSummary,
    },
}

// =============================================================================
// Supporting Types
// =============================================================================

/// API error information.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    /// Error message
    #[serde(default)]
    pub message: String,
}

/// Output item within a response.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputItem {
    /// Item type ("function_call", "message", ...)
    #[serde(rename = "type")]
    pub item_type: String,
    /// Function name for function_call items
    #[serde(default)]
    pub name: Option<String>,
    /// Accumulated function arguments for function_call items
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Terminal response information.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseSummary {
    /// Response status (completed, failed, cancelled, in_progress, ...)
    #[serde(default)]
    pub status: String,
    /// Status details for failed/cancelled responses
    #[serde(default)]
    pub status_details: Option<StatusDetails>,
}

/// Status details attached to a terminal response.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusDetails {
    /// Cancellation reason (e.g. "turn_detected")
    #[serde(default)]
    pub reason: Option<String>,
    /// Error attached to a failed response
    #[serde(default)]
    pub error: Option<StatusError>,
}

/// Error details inside `status_details`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusError {
    /// Error message
    #[serde(default)]
    pub message: Option<String>,
}

impl ResponseSummary {
    /// Error message from status details, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.status_details
            .as_ref()
            .and_then(|d| d.error.as_ref())
            .and_then(|e| e.message.as_deref())
    }

    /// Cancellation reason from status details, if any.
    pub fn cancel_reason(&self) -> Option<&str> {
        self.status_details.as_ref().and_then(|d| d.reason.as_deref())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_update_serialization() {
        let event = ClientEvent::SessionUpdate {
            session: SessionConfig {
                voice: Some("alloy".to_string()),
                instructions: Some("You are a grocery assistant.".to_string()),
                input_audio_format: Some("pcm16".to_string()),
                turn_detection: Some(TurnDetection::ServerVad {
                    threshold: None,
                    prefix_padding_ms: None,
                    silence_duration_ms: None,
                }),
                tools: None,
                tool_choice: Some("auto".to_string()),
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("session.update"));
        assert!(json.contains("server_vad"));
        assert!(json.contains("alloy"));
    }

    #[test]
    fn test_function_call_delta_deserialization() {
        let json = r#"{"type":"response.function_call_arguments.delta","delta":"{\"items\""}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::FunctionCallArgumentsDelta { delta } => {
                assert_eq!(delta, "{\"items\"");
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_response_done_status_details() {
        let json = r#"{
            "type": "response.done",
            "response": {
                "status": "cancelled",
                "status_details": {"reason": "turn_detected"}
            }
        }"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::ResponseDone { response } => {
                assert_eq!(response.status, "cancelled");
                assert_eq!(response.cancel_reason(), Some("turn_detected"));
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_unknown_event_type_rejected_by_serde() {
        // The parser treats this as an ignorable payload, not an error.
        let json = r#"{"type":"rate_limits.updated","rate_limits":[]}"#;
        assert!(serde_json::from_str::<ServerEvent>(json).is_err());
    }

    #[test]
    fn test_output_item_function_call() {
        let json = r#"{
            "type": "response.output_item.done",
            "item": {"type": "function_call", "name": "extract_groceries", "arguments": "{\"items\": []}"}
        }"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::OutputItemDone { item } => {
                assert_eq!(item.item_type, "function_call");
                assert_eq!(item.name.as_deref(), Some("extract_groceries"));
            }
            _ => panic!("Wrong event type"),
        }
    }
}
