//! Voice session engine.
//!
//! Orchestrates the transport, protocol parser, and retry controller: opens
//! the session, announces the session configuration when the data channel
//! opens, turns inbound payloads into transcript/item callbacks, and
//! transparently reconnects after a rate-limit failure.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::core::groceries::item::MutationRecord;
use crate::core::groceries::reconcile::reconcile_mutations;
use crate::core::protocol::{ClientEvent, EventParser, ProtocolSignal};
use crate::core::protocol::parser::session_config;
use crate::core::session::retry::{
    self, RECONNECT_SETTLE_DELAY, RetryDirective,
};
use crate::core::session::transport::{
    ConnectionState, PeerEvent, SessionTransport, TransportError,
};
use crate::diag::{DiagLevel, DiagLogger};

/// Session-level configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Assistant voice
    pub voice: String,
    /// Base instructions
    pub instructions: String,
    /// The user's usual groceries, injected into the instructions
    pub usual_groceries: Option<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            voice: "alloy".to_string(),
            instructions: crate::core::groceries::prompts::REALTIME_SESSION_INSTRUCTIONS
                .to_string(),
            usual_groceries: None,
        }
    }
}

/// User-visible session status changes.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    /// Transport connection state changed
    Connection(ConnectionState),
    /// The assistant started or stopped working on a response
    Processing(bool),
    /// Rate limited; reconnecting after the given wait
    Reconnecting(Duration),
    /// A user-visible error
    Error(String),
}

/// Transcript updates from either side of the conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptUpdate {
    /// Partial user speech
    UserDelta(String),
    /// Final user utterance
    UserCompleted(String),
    /// Partial assistant speech
    AssistantDelta(String),
}

type StatusCallback = Arc<dyn Fn(SessionStatus) + Send + Sync>;
type TranscriptCallback = Arc<dyn Fn(TranscriptUpdate) + Send + Sync>;
type ItemsCallback = Arc<dyn Fn(Vec<MutationRecord>) + Send + Sync>;

/// Registered observer callbacks.
#[derive(Default)]
pub struct SessionCallbacks {
    status: Mutex<Option<StatusCallback>>,
    transcript: Mutex<Option<TranscriptCallback>>,
    items: Mutex<Option<ItemsCallback>>,
}

/// One voice-driven grocery session.
pub struct VoiceSession {
    transport: Arc<SessionTransport>,
    options: SessionOptions,
    diag: Arc<DiagLogger>,
    parser: Mutex<EventParser>,
    callbacks: SessionCallbacks,
    running: AtomicBool,
    processing: AtomicBool,
}

impl VoiceSession {
    pub fn new(
        transport: Arc<SessionTransport>,
        options: SessionOptions,
        diag: Arc<DiagLogger>,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport,
            options,
            diag,
            parser: Mutex::new(EventParser::new()),
            callbacks: SessionCallbacks::default(),
            running: AtomicBool::new(false),
            processing: AtomicBool::new(false),
        })
    }

    /// Register the status observer.
    pub fn on_status(&self, callback: impl Fn(SessionStatus) + Send + Sync + 'static) {
        *self.callbacks.status.lock() = Some(Arc::new(callback));
    }

    /// Register the transcript observer.
    pub fn on_transcript(&self, callback: impl Fn(TranscriptUpdate) + Send + Sync + 'static) {
        *self.callbacks.transcript.lock() = Some(Arc::new(callback));
    }

    /// Register the extracted-items observer.
    pub fn on_items(&self, callback: impl Fn(Vec<MutationRecord>) + Send + Sync + 'static) {
        *self.callbacks.items.lock() = Some(Arc::new(callback));
    }

    /// True while the assistant is generating a response.
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Run the session until stopped or terminally failed.
    ///
    /// Rate-limit failures restart the transport after the advertised wait
    /// plus a settle delay; events arriving during that window belong to the
    /// discarded connection and are never processed.
    pub async fn run(self: Arc<Self>) {
        self.running.store(true, Ordering::SeqCst);

        while self.running.load(Ordering::SeqCst) {
            let mut events = match self.transport.start().await {
                Ok(events) => events,
                Err(TransportError::Stopped) => break,
                Err(e) => {
                    error!("Session start failed: {}", e);
                    self.diag
                        .log(DiagLevel::Error, format!("Session start failed: {e}"), None);
                    self.emit_status(SessionStatus::Error(e.to_string()));
                    break;
                }
            };

            let mut backoff = None;
            while let Some(event) = events.recv().await {
                match event {
                    PeerEvent::ChannelOpen => self.announce_session(),
                    PeerEvent::StateChanged(state) => {
                        self.emit_status(SessionStatus::Connection(state));
                    }
                    PeerEvent::ChannelError(message) => {
                        self.diag.log(DiagLevel::Error, &message, None);
                        self.emit_status(SessionStatus::Error(message));
                    }
                    PeerEvent::Message(raw) => {
                        if let Some(wait) = self.handle_payload(&raw) {
                            backoff = Some(wait);
                            break;
                        }
                    }
                }
            }

            let Some(wait) = backoff else {
                // Channel ended without a retryable failure.
                break;
            };

            info!("Rate limited; reconnecting in {:.1}s", wait.as_secs_f64());
            self.emit_status(SessionStatus::Reconnecting(wait));
            tokio::time::sleep(wait).await;
            self.transport.stop();
            tokio::time::sleep(RECONNECT_SETTLE_DELAY).await;
        }

        self.transport.stop();
        self.running.store(false, Ordering::SeqCst);
    }

    /// Stop the session. Safe to call repeatedly.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.transport.stop();
    }

    /// Send the session configuration; called when the data channel opens.
    fn announce_session(&self) {
        let config = session_config(
            &self.options.voice,
            &self.options.instructions,
            self.options.usual_groceries.as_deref(),
        );
        self.transport.send(&ClientEvent::SessionUpdate { session: config });
        self.diag
            .log(DiagLevel::Audio, "Session configuration announced", None);
    }

    /// Process one inbound payload. Returns a wait duration when the session
    /// must back off and reconnect.
    pub(crate) fn handle_payload(&self, raw: &str) -> Option<Duration> {
        let signal = self.parser.lock().handle_payload(raw)?;

        match signal {
            ProtocolSignal::TranscriptDelta(delta) => {
                self.emit_transcript(TranscriptUpdate::UserDelta(delta));
            }
            ProtocolSignal::TranscriptCompleted(transcript) => {
                self.emit_transcript(TranscriptUpdate::UserCompleted(transcript));
            }
            ProtocolSignal::AssistantDelta(delta) => {
                self.emit_transcript(TranscriptUpdate::AssistantDelta(delta));
            }
            ProtocolSignal::ResponseStarted => {
                self.processing.store(true, Ordering::SeqCst);
                self.emit_status(SessionStatus::Processing(true));
            }
            ProtocolSignal::ResponseCompleted => {
                self.processing.store(false, Ordering::SeqCst);
                self.emit_status(SessionStatus::Processing(false));
            }
            ProtocolSignal::ResponseFailed(message) => {
                self.processing.store(false, Ordering::SeqCst);
                match retry::classify_failure(&message) {
                    RetryDirective::Backoff(wait) => {
                        self.diag.log(
                            DiagLevel::Error,
                            format!("Rate limited: {message}"),
                            None,
                        );
                        return Some(wait);
                    }
                    RetryDirective::SurfaceError(message) => {
                        self.diag.log(DiagLevel::Error, &message, None);
                        self.emit_status(SessionStatus::Error(message));
                    }
                    RetryDirective::ClearProcessing => {}
                }
            }
            ProtocolSignal::ResponseCancelled(reason) => {
                // Interruptions are normal flow control, never an error.
                let _ = retry::classify_cancellation(reason.as_deref());
                self.processing.store(false, Ordering::SeqCst);
                self.emit_status(SessionStatus::Processing(false));
            }
            ProtocolSignal::SessionError(message) => {
                self.diag.log(DiagLevel::Error, &message, None);
                self.emit_status(SessionStatus::Error(message));
            }
            ProtocolSignal::ExtractedItems(raw_items) => {
                self.diag.log(
                    DiagLevel::Function,
                    format!("Function call produced {} entries", raw_items.len()),
                    Some(serde_json::Value::Array(raw_items.clone())),
                );
                let mutations = reconcile_mutations(&raw_items);
                if mutations.is_empty() {
                    warn!("Function call produced no valid mutations");
                } else {
                    self.diag.log(
                        DiagLevel::Items,
                        format!("Applying {} mutations", mutations.len()),
                        None,
                    );
                    self.emit_items(mutations);
                }
            }
        }
        None
    }

    fn emit_status(&self, status: SessionStatus) {
        if let Some(callback) = self.callbacks.status.lock().clone() {
            callback(status);
        }
    }

    fn emit_transcript(&self, update: TranscriptUpdate) {
        if let Some(callback) = self.callbacks.transcript.lock().clone() {
            callback(update);
        }
    }

    fn emit_items(&self, mutations: Vec<MutationRecord>) {
        if let Some(callback) = self.callbacks.items.lock().clone() {
            callback(mutations);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::transport::{
        AudioSource, AudioTrack, Negotiator, PeerConnection, PeerFactory,
    };
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc;

    struct NullTrack;

    impl AudioTrack for NullTrack {
        fn stop(&self) {}
    }

    struct NullAudio;

    #[async_trait]
    impl AudioSource for NullAudio {
        async fn acquire(&self) -> Result<Box<dyn AudioTrack>, TransportError> {
            Ok(Box::new(NullTrack))
        }
    }

    struct NullPeer {
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl PeerConnection for NullPeer {
        fn attach_track(&mut self, _track: &dyn AudioTrack) -> Result<(), TransportError> {
            Ok(())
        }
        async fn create_offer(&mut self) -> Result<String, TransportError> {
            Ok("v=0".to_string())
        }
        async fn apply_answer(&mut self, _answer: &str) -> Result<(), TransportError> {
            Ok(())
        }
        fn channel_is_open(&self) -> bool {
            true
        }
        fn send_text(&mut self, payload: &str) -> Result<(), TransportError> {
            self.sent.lock().push(payload.to_string());
            Ok(())
        }
        fn close(&mut self) {}
    }

    struct NullNegotiator;

    #[async_trait]
    impl Negotiator for NullNegotiator {
        async fn exchange(&self, _offer: &str) -> Result<String, TransportError> {
            Ok("v=0".to_string())
        }
    }

    /// Factory that scripts the events each successive connection emits and
    /// counts how many connections were created.
    struct ScriptedFactory {
        scripts: Mutex<Vec<Vec<PeerEvent>>>,
        creates: AtomicUsize,
        sent: Arc<Mutex<Vec<String>>>,
        // Keeps late connections alive so their event channel stays open.
        live: Mutex<Vec<mpsc::UnboundedSender<PeerEvent>>>,
    }

    impl ScriptedFactory {
        fn new(scripts: Vec<Vec<PeerEvent>>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts),
                creates: AtomicUsize::new(0),
                sent: Arc::new(Mutex::new(Vec::new())),
                live: Mutex::new(Vec::new()),
            })
        }
    }

    impl PeerFactory for ScriptedFactory {
        fn create(
            &self,
        ) -> Result<(Box<dyn PeerConnection>, mpsc::UnboundedReceiver<PeerEvent>), TransportError>
        {
            self.creates.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = mpsc::unbounded_channel();
            let mut scripts = self.scripts.lock();
            if !scripts.is_empty() {
                for event in scripts.remove(0) {
                    let _ = tx.send(event);
                }
            }
            self.live.lock().push(tx);
            Ok((
                Box::new(NullPeer {
                    sent: self.sent.clone(),
                }),
                rx,
            ))
        }
    }

    fn rate_limited_done() -> PeerEvent {
        PeerEvent::Message(
            serde_json::json!({
                "type": "response.done",
                "response": {
                    "status": "failed",
                    "status_details": {
                        "error": {"message": "Rate limit reached for requests. Please try again in 1.5s."}
                    }
                }
            })
            .to_string(),
        )
    }

    fn session_with_factory(factory: Arc<ScriptedFactory>) -> Arc<VoiceSession> {
        let transport = Arc::new(SessionTransport::new(
            Arc::new(NullAudio),
            factory,
            Arc::new(NullNegotiator),
        ));
        VoiceSession::new(transport, SessionOptions::default(), DiagLogger::new(64))
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_triggers_reconnect() {
        let factory = ScriptedFactory::new(vec![
            vec![PeerEvent::ChannelOpen, rate_limited_done()],
            vec![PeerEvent::ChannelOpen],
        ]);
        let session = session_with_factory(factory.clone());

        let statuses: Arc<Mutex<Vec<SessionStatus>>> = Arc::new(Mutex::new(Vec::new()));
        let statuses_clone = statuses.clone();
        session.on_status(move |status| statuses_clone.lock().push(status));

        let runner = session.clone();
        let handle = tokio::spawn(runner.run());

        // The paused clock auto-advances through the 1.5s wait and the
        // settle delay; the second connection proves the restart happened.
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if factory.creates.load(Ordering::SeqCst) >= 2 {
                break;
            }
        }
        assert_eq!(factory.creates.load(Ordering::SeqCst), 2);

        assert!(statuses
            .lock()
            .iter()
            .any(|s| *s == SessionStatus::Reconnecting(Duration::from_millis(1500))));

        session.stop();
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_update_sent_on_channel_open() {
        let factory = ScriptedFactory::new(vec![vec![PeerEvent::ChannelOpen]]);
        let session = session_with_factory(factory.clone());

        let runner = session.clone();
        let handle = tokio::spawn(runner.run());

        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if !factory.sent.lock().is_empty() {
                break;
            }
        }

        let sent = factory.sent.lock();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("session.update"));
        assert!(sent[0].contains("extract_groceries"));
        assert!(sent[0].contains("pcm16"));
        drop(sent);

        session.stop();
        handle.abort();
    }

    #[tokio::test]
    async fn test_turn_detected_cancellation_is_silent() {
        let factory = ScriptedFactory::new(vec![]);
        let session = session_with_factory(factory);

        let statuses: Arc<Mutex<Vec<SessionStatus>>> = Arc::new(Mutex::new(Vec::new()));
        let statuses_clone = statuses.clone();
        session.on_status(move |status| statuses_clone.lock().push(status));

        session.handle_payload(
            r#"{"type":"response.created","response":{"status":"in_progress"}}"#,
        );
        assert!(session.is_processing());

        let backoff = session.handle_payload(
            r#"{"type":"response.done","response":{"status":"cancelled","status_details":{"reason":"turn_detected"}}}"#,
        );
        assert_eq!(backoff, None);
        assert!(!session.is_processing());
        assert!(!statuses
            .lock()
            .iter()
            .any(|s| matches!(s, SessionStatus::Error(_))));
    }

    #[tokio::test]
    async fn test_non_rate_limit_failure_surfaces_error() {
        let factory = ScriptedFactory::new(vec![]);
        let session = session_with_factory(factory);

        let statuses: Arc<Mutex<Vec<SessionStatus>>> = Arc::new(Mutex::new(Vec::new()));
        let statuses_clone = statuses.clone();
        session.on_status(move |status| statuses_clone.lock().push(status));

        let backoff = session.handle_payload(
            r#"{"type":"response.done","response":{"status":"failed","status_details":{"error":{"message":"The server had an error"}}}}"#,
        );
        assert_eq!(backoff, None);
        assert!(statuses
            .lock()
            .iter()
            .any(|s| *s == SessionStatus::Error("The server had an error".to_string())));
    }

    #[tokio::test]
    async fn test_extracted_items_reach_observer() {
        let factory = ScriptedFactory::new(vec![]);
        let session = session_with_factory(factory);

        let received: Arc<Mutex<Vec<MutationRecord>>> = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        session.on_items(move |mutations| received_clone.lock().extend(mutations));

        session.handle_payload(
            r#"{"type":"response.output_item.added","item":{"type":"function_call","name":"extract_groceries"}}"#,
        );
        session.handle_payload(
            r#"{"type":"response.function_call_arguments.done","arguments":"{\"items\": [{\"item\": \"milk\", \"quantity\": 1, \"measurement\": {\"value\": 2, \"unit\": \"L\"}}, {\"item\": \"bread\", \"quantity\": 0, \"action\": \"remove\"}]}"}"#,
        );

        let received = received.lock();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].name, "milk");
        assert_eq!(received[0].measurement.as_ref().unwrap().value, 2.0);
        assert_eq!(received[0].measurement.as_ref().unwrap().unit, "L");
        assert_eq!(
            received[1].action,
            crate::core::groceries::item::MutationAction::Remove
        );
    }
}
