//! Streaming protocol event parser.
//!
//! Decodes each inbound channel payload into a typed [`ServerEvent`] and
//! reduces it to a [`ProtocolSignal`] for the session engine. Function-call
//! arguments arrive as a stream of fragments that are not independently
//! valid JSON; they are accumulated in a [`FunctionCallBuffer`] and decoded
//! only when the terminal event arrives and the buffer is brace-complete.
//!
//! Malformed payloads never crash the session: non-JSON messages, unknown
//! event types, and undecodable argument buffers are logged and dropped.

use tracing::{debug, warn};

use super::events::{ServerEvent, SessionConfig};

/// Name of the single tool the session advertises.
pub const EXTRACT_GROCERIES_TOOL: &str = "extract_groceries";

/// Semantic output of the parser, consumed by the session engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolSignal {
    /// Partial user transcript
    TranscriptDelta(String),
    /// Final user transcript for one utterance
    TranscriptCompleted(String),
    /// Partial assistant transcript
    AssistantDelta(String),
    /// Model started generating a response
    ResponseStarted,
    /// Response finished successfully
    ResponseCompleted,
    /// Response failed; carries the upstream error message
    ResponseFailed(String),
    /// Response was cancelled; carries the reason when present
    ResponseCancelled(Option<String>),
    /// Fatal session error
    SessionError(String),
    /// A completed extract_groceries call produced an items array
    ExtractedItems(Vec<serde_json::Value>),
}

/// Per-call accumulator for streamed function-call arguments.
///
/// At most one call is assumed in flight: the buffer is reset whenever a new
/// function_call output item is announced. If the upstream ever pipelines
/// two calls their fragments would interleave here; known limitation.
#[derive(Debug, Default)]
pub struct FunctionCallBuffer {
    name: String,
    args_text: String,
}

impl FunctionCallBuffer {
    /// Start accumulating a new call, discarding any prior state.
    pub fn reset(&mut self, name: &str) {
        self.name.clear();
        self.name.push_str(name);
        self.args_text.clear();
    }

    /// Append a streamed argument fragment.
    pub fn push_delta(&mut self, delta: &str) {
        self.args_text.push_str(delta);
    }

    /// Name of the call being accumulated, empty when idle.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when the trimmed buffer is brace-delimited.
    ///
    /// Only a complete `{...}` object is ever handed to the JSON decoder;
    /// anything else is incomplete and must be dropped, not partially parsed.
    pub fn is_complete(&self) -> bool {
        let trimmed = self.args_text.trim();
        trimmed.starts_with('{') && trimmed.ends_with('}')
    }

    /// Take the accumulated text if brace-complete, clearing the buffer
    /// either way. Returns `None` for incomplete buffers.
    pub fn take_complete(&mut self) -> Option<String> {
        let complete = self.is_complete();
        let text = std::mem::take(&mut self.args_text);
        self.name.clear();
        if complete { Some(text.trim().to_string()) } else { None }
    }
}

/// Stateful decoder for the inbound side of the data channel.
#[derive(Debug, Default)]
pub struct EventParser {
    buffer: FunctionCallBuffer,
}

impl EventParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one raw channel payload into zero or one [`ProtocolSignal`].
    ///
    /// Returns `None` for payloads that carry no signal: heartbeats,
    /// unknown event types, argument deltas, and malformed messages.
    pub fn handle_payload(&mut self, raw: &str) -> Option<ProtocolSignal> {
        // Non-JSON payloads are tolerated (heartbeats, unknown framing).
        let value: serde_json::Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(_) => {
                debug!("Discarding non-JSON channel payload ({} bytes)", raw.len());
                return None;
            }
        };

        let event: ServerEvent = match serde_json::from_value(value) {
            Ok(e) => e,
            Err(_) => {
                // Valid JSON with an unrecognized or unexpected shape.
                debug!("Ignoring unrecognized protocol event");
                return None;
            }
        };

        self.handle_event(event)
    }

    /// Reduce a typed event to its semantic signal.
    pub fn handle_event(&mut self, event: ServerEvent) -> Option<ProtocolSignal> {
        match event {
            ServerEvent::SessionError { error } => {
                Some(ProtocolSignal::SessionError(if error.message.is_empty() {
                    "Session error".to_string()
                } else {
                    error.message
                }))
            }

            ServerEvent::InputTranscriptionDelta { delta } => {
                Some(ProtocolSignal::TranscriptDelta(delta))
            }

            ServerEvent::InputTranscriptionCompleted { transcript } => {
                Some(ProtocolSignal::TranscriptCompleted(transcript))
            }

            ServerEvent::AudioTranscriptDelta { delta } => {
                Some(ProtocolSignal::AssistantDelta(delta))
            }

            ServerEvent::OutputItemAdded { item } => {
                if item.item_type == "function_call"
                    && item.name.as_deref() == Some(EXTRACT_GROCERIES_TOOL)
                {
                    debug!("Function call started: {}", EXTRACT_GROCERIES_TOOL);
                    self.buffer.reset(EXTRACT_GROCERIES_TOOL);
                }
                None
            }

            ServerEvent::FunctionCallArgumentsDelta { delta } => {
                // Deltas are never independently valid JSON; no parse attempt.
                self.buffer.push_delta(&delta);
                None
            }

            ServerEvent::FunctionCallArgumentsDone { arguments } => {
                // Some upstream versions only carry the full arguments here.
                if self.buffer.args_text.is_empty() && !arguments.is_empty() {
                    self.buffer.push_delta(&arguments);
                }
                self.finish_call()
            }

            ServerEvent::OutputItemDone { item } => {
                if item.item_type != "function_call" {
                    return None;
                }
                if let Some(name) = item.name.as_deref() {
                    if name != EXTRACT_GROCERIES_TOOL {
                        return None;
                    }
                }
                if self.buffer.args_text.is_empty() {
                    if let Some(args) = &item.arguments {
                        self.buffer.push_delta(args);
                    }
                }
                self.finish_call()
            }

            ServerEvent::ResponseCreated { .. } => Some(ProtocolSignal::ResponseStarted),

            ServerEvent::ResponseDone { response } => match response.status.as_str() {
                "failed" => Some(ProtocolSignal::ResponseFailed(
                    response
                        .error_message()
                        .unwrap_or("Response failed")
                        .to_string(),
                )),
                "cancelled" => Some(ProtocolSignal::ResponseCancelled(
                    response.cancel_reason().map(str::to_string),
                )),
                _ => Some(ProtocolSignal::ResponseCompleted),
            },
        }
    }

    /// Decode the accumulated argument buffer at call completion.
    ///
    /// An incomplete or undecodable buffer abandons the call: the buffer is
    /// cleared, nothing is surfaced, and the next utterance triggers a fresh
    /// call.
    fn finish_call(&mut self) -> Option<ProtocolSignal> {
        let text = match self.buffer.take_complete() {
            Some(t) => t,
            None => {
                warn!("Dropping incomplete function-call argument buffer");
                return None;
            }
        };

        let decoded: serde_json::Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to decode function-call arguments: {}", e);
                return None;
            }
        };

        match decoded.get("items").and_then(|i| i.as_array()) {
            Some(items) => Some(ProtocolSignal::ExtractedItems(items.clone())),
            None => {
                debug!("Function-call arguments carried no items array");
                None
            }
        }
    }
}

/// Build the session configuration announced once the channel opens.
///
/// `usual_groceries` is injected into the instructions so the model prefers
/// item names the user already buys.
pub fn session_config(voice: &str, instructions: &str, usual_groceries: Option<&str>) -> SessionConfig {
    use super::events::{ToolDef, TurnDetection};

    let instructions = match usual_groceries {
        Some(usual) if !usual.trim().is_empty() => {
            format!("{instructions}\n\nUSER'S USUAL GROCERIES:\n{usual}")
        }
        _ => instructions.to_string(),
    };

    SessionConfig {
        voice: Some(voice.to_string()),
        instructions: Some(instructions),
        input_audio_format: Some("pcm16".to_string()),
        turn_detection: Some(TurnDetection::ServerVad {
            threshold: None,
            prefix_padding_ms: None,
            silence_duration_ms: None,
        }),
        tools: Some(vec![ToolDef {
            tool_type: "function".to_string(),
            name: EXTRACT_GROCERIES_TOOL.to_string(),
            description: Some(
                "Extract grocery items with quantities, measurements, and an \
                 add/remove/modify action from the user's speech."
                    .to_string(),
            ),
            parameters: Some(serde_json::json!({
                "type": "object",
                "properties": {
                    "items": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "item": {"type": "string"},
                                "quantity": {"type": "number"},
                                "action": {"type": "string", "enum": ["add", "remove", "modify"]},
                                "measurement": {
                                    "type": "object",
                                    "properties": {
                                        "value": {"type": "number"},
                                        "unit": {"type": "string"}
                                    },
                                    "required": ["value", "unit"]
                                }
                            },
                            "required": ["item", "quantity"]
                        }
                    }
                },
                "required": ["items"]
            })),
        }]),
        tool_choice: Some("auto".to_string()),
    }
}

// =============================================================================
// Tests
// =============================================================================
