//! Real-time session layer: transport lifecycle, rate-limit retry, and the
//! orchestrating engine.

pub mod engine;
pub mod retry;
pub mod transport;

pub use engine::{SessionCallbacks, SessionOptions, VoiceSession};
pub use retry::{RetryDirective, parse_rate_limit_wait};
pub use transport::{
    AudioSource, AudioTrack, ConnectionState, HttpNegotiator, Negotiator, PeerConnection,
    PeerEvent, PeerFactory, SessionTransport, TransportError,
};
