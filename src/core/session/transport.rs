//! Session transport: peer connection and data-channel lifecycle.
//!
//! The platform pieces (audio capture, peer connection, offer/answer relay)
//! are injected as trait objects so the transport logic is testable without
//! real devices or network. The transport owns the acquired audio track and
//! the live peer connection; `stop()` is idempotent and a `start()` that is
//! overtaken by a concurrent `stop()` nets out to a fully torn-down
//! transport, even when the negotiation answer arrives late.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::protocol::ClientEvent;

// =============================================================================
// Errors and State
// =============================================================================

/// Errors from the session transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Microphone access denied or unavailable
    #[error("Audio capture unavailable: {0}")]
    PermissionDenied(String),

    /// Offer/answer negotiation failed
    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    /// Peer connection or data channel failure
    #[error("Channel error: {0}")]
    Channel(String),

    /// The transport was stopped while starting
    #[error("Transport stopped during start")]
    Stopped,
}

/// Connection state as reported by the underlying peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::New => "new",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

// =============================================================================
// Injected Collaborators
// =============================================================================

/// A live local audio track.
pub trait AudioTrack: Send + Sync {
    /// Stop capture and release the device.
    fn stop(&self);
}

/// Source of local audio tracks (microphone).
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Acquire the capture device. Denied permission is terminal for the
    /// attempt and must not be retried here.
    async fn acquire(&self) -> Result<Box<dyn AudioTrack>, TransportError>;
}

/// Events emitted by a live peer connection.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    /// Underlying connection state changed
    StateChanged(ConnectionState),
    /// The data channel became open
    ChannelOpen,
    /// An inbound data-channel message
    Message(String),
    /// The data channel reported an error
    ChannelError(String),
}

/// A peer connection with one data channel.
#[async_trait]
pub trait PeerConnection: Send {
    /// Attach the local audio track.
    fn attach_track(&mut self, track: &dyn AudioTrack) -> Result<(), TransportError>;

    /// Create the local session offer.
    async fn create_offer(&mut self) -> Result<String, TransportError>;

    /// Apply the remote answer.
    async fn apply_answer(&mut self, answer: &str) -> Result<(), TransportError>;

    /// True when the data channel reports an open state.
    fn channel_is_open(&self) -> bool;

    /// Send a payload over the data channel.
    fn send_text(&mut self, payload: &str) -> Result<(), TransportError>;

    /// Close the connection and data channel.
    fn close(&mut self);
}

/// Factory for peer connections.
pub trait PeerFactory: Send + Sync {
    /// Create a fresh peer connection and its event stream.
    fn create(
        &self,
    ) -> Result<(Box<dyn PeerConnection>, mpsc::UnboundedReceiver<PeerEvent>), TransportError>;
}

/// Offer/answer exchange with the negotiation relay.
#[async_trait]
pub trait Negotiator: Send + Sync {
    /// Exchange a local offer for a remote answer.
    async fn exchange(&self, offer: &str) -> Result<String, TransportError>;
}

// =============================================================================
// HTTP Negotiator
// =============================================================================

#[derive(serde::Serialize)]
struct OfferRequest<'a> {
    offer: &'a str,
}

#[derive(serde::Deserialize)]
struct AnswerResponse {
    answer: String,
}

/// Negotiator that relays the offer through an HTTP endpoint.
///
/// The request has no timeout unless one is configured; an unresponsive
/// relay otherwise leaves the transport in `connecting` until it is stopped.
#[derive(Debug, Clone)]
pub struct HttpNegotiator {
    client: reqwest::Client,
    endpoint: String,
    timeout: Option<Duration>,
}

impl HttpNegotiator {
    pub fn new(client: reqwest::Client, endpoint: String, timeout: Option<Duration>) -> Self {
        Self {
            client,
            endpoint,
            timeout,
        }
    }
}

#[async_trait]
impl Negotiator for HttpNegotiator {
    async fn exchange(&self, offer: &str) -> Result<String, TransportError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&OfferRequest { offer });
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Negotiation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Negotiation(format!(
                "Relay returned {status}: {body}"
            )));
        }

        let answer: AnswerResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Negotiation(e.to_string()))?;
        Ok(answer.answer)
    }
}

// =============================================================================
// Session Transport
// =============================================================================

struct TransportInner {
    peer: Option<Box<dyn PeerConnection>>,
    track: Option<Box<dyn AudioTrack>>,
    state: ConnectionState,
}

/// Owns the peer connection, data channel, and audio track for one session.
pub struct SessionTransport {
    audio: Arc<dyn AudioSource>,
    peers: Arc<dyn PeerFactory>,
    negotiator: Arc<dyn Negotiator>,
    inner: Arc<Mutex<TransportInner>>,
    // Bumped by every start() and stop(); a start that observes a bump after
    // an await point has been overtaken and must tear itself down.
    generation: Arc<AtomicU64>,
}

impl SessionTransport {
    pub fn new(
        audio: Arc<dyn AudioSource>,
        peers: Arc<dyn PeerFactory>,
        negotiator: Arc<dyn Negotiator>,
    ) -> Self {
        Self {
            audio,
            peers,
            negotiator,
            inner: Arc::new(Mutex::new(TransportInner {
                peer: None,
                track: None,
                state: ConnectionState::New,
            })),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Establish the session: acquire audio, negotiate, and wire the data
    /// channel. Returns the stream of peer events for this connection.
    ///
    /// Any failure tears down everything acquired so far; a microphone is
    /// never left open by a partial start.
    pub async fn start(&self) -> Result<mpsc::UnboundedReceiver<PeerEvent>, TransportError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.lock().state = ConnectionState::Connecting;
        info!("Starting session transport");

        let track = match self.audio.acquire().await {
            Ok(track) => track,
            Err(e) => {
                self.inner.lock().state = ConnectionState::Failed;
                return Err(e);
            }
        };

        // A stop() may have landed while we waited on the microphone.
        if self.generation.load(Ordering::SeqCst) != generation {
            track.stop();
            return Err(TransportError::Stopped);
        }

        let (mut peer, events) = match self.negotiate(&*track).await {
            Ok(pair) => pair,
            Err(e) => {
                track.stop();
                self.inner.lock().state = ConnectionState::Failed;
                return Err(e);
            }
        };

        // A late-arriving answer must not resurrect a stopped transport.
        if self.generation.load(Ordering::SeqCst) != generation {
            peer.close();
            track.stop();
            debug!("Discarding connection overtaken by stop()");
            return Err(TransportError::Stopped);
        }

        {
            let mut inner = self.inner.lock();
            inner.peer = Some(peer);
            inner.track = Some(track);
        }

        Ok(self.forward_events(generation, events))
    }

    async fn negotiate(
        &self,
        track: &dyn AudioTrack,
    ) -> Result<(Box<dyn PeerConnection>, mpsc::UnboundedReceiver<PeerEvent>), TransportError>
    {
        let (mut peer, events) = self.peers.create()?;

        let result: Result<(), TransportError> = async {
            peer.attach_track(track)?;
            let offer = peer.create_offer().await?;
            debug!("Local offer created ({} bytes)", offer.len());
            let answer = self.negotiator.exchange(&offer).await?;
            debug!("Remote answer received ({} bytes)", answer.len());
            peer.apply_answer(&answer).await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => Ok((peer, events)),
            Err(e) => {
                peer.close();
                Err(e)
            }
        }
    }

    /// Forward peer events to the caller, mirroring state changes into the
    /// transport. The forwarder stops once the connection is replaced.
    fn forward_events(
        &self,
        generation: u64,
        mut events: mpsc::UnboundedReceiver<PeerEvent>,
    ) -> mpsc::UnboundedReceiver<PeerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Arc::clone(&self.inner);
        let current_generation = Arc::clone(&self.generation);

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let stale = current_generation.load(Ordering::SeqCst) != generation;
                if stale {
                    break;
                }
                if let PeerEvent::StateChanged(state) = &event {
                    inner.lock().state = *state;
                }
                if tx.send(event).is_err() {
                    break;
                }
            }
        });

        rx
    }

    /// Tear down the connection and release the audio device.
    ///
    /// Idempotent; safe to call when never started or already stopped.
    pub fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock();
        if let Some(mut peer) = inner.peer.take() {
            peer.close();
        }
        if let Some(track) = inner.track.take() {
            track.stop();
        }
        if inner.state != ConnectionState::Disconnected {
            info!("Session transport stopped");
        }
        inner.state = ConnectionState::Disconnected;
    }

    /// Send a client event over the data channel.
    ///
    /// A closed channel makes this a logged no-op, not an error; the
    /// protocol tolerates events dropped during brief closed windows.
    pub fn send(&self, event: &ClientEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(p) => p,
            Err(e) => {
                warn!("Failed to serialize client event: {}", e);
                return;
            }
        };

        let mut inner = self.inner.lock();
        match inner.peer.as_mut() {
            Some(peer) if peer.channel_is_open() => {
                if let Err(e) = peer.send_text(&payload) {
                    warn!("Data channel send failed: {}", e);
                }
            }
            _ => {
                warn!("Dropping client event: data channel not open");
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
