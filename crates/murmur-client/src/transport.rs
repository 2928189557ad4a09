//! Peer transport capability traits.
//!
//! The real-time media stack (capture, session descriptions, connectivity
//! candidates, data channel) is an external collaborator. These traits
//! define the capability set the session state machine consumes, allowing
//! the core to be tested against a scripted implementation and shipped
//! against whatever native stack the host application provides.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Local audio capture could not be acquired.
    #[error("Local capture unavailable: {0}")]
    CaptureUnavailable(String),

    /// Producing or applying a description/candidate failed.
    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    /// The data channel is not open.
    #[error("Data channel closed")]
    ChannelClosed,

    /// Other transport error.
    #[error("{0}")]
    Other(String),
}

/// Opaque handle to acquired local audio capture.
///
/// Held across repeated "next" cycles; dropping it releases the capture
/// device.
pub trait LocalCapture: Send + Sync + fmt::Debug {}

/// Opaque handle to an inbound remote media stream.
///
/// Handed to the presentation layer for playback; its internals are out of
/// scope here.
pub trait RemoteMedia: Send + fmt::Debug {}

/// Happenings originated by an active peer session.
///
/// Delivered on the channel returned from [`PeerTransport::create_session`];
/// the driver tags each with the generation that created the session before
/// feeding the state machine.
#[derive(Debug)]
pub enum PeerEvent {
    /// A local connectivity candidate is ready to be signaled to the peer.
    CandidateGathered(Vec<u8>),
    /// A chat message arrived on the data channel.
    ChatMessage(String),
    /// The remote media stream became available.
    RemoteMedia(Box<dyn RemoteMedia>),
    /// Underlying connectivity was lost or closed.
    ConnectivityLost,
}

/// A factory for capture handles and per-peer sessions.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Acquire local audio capture.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::CaptureUnavailable`] if the device cannot
    /// be opened.
    async fn acquire_capture(&self) -> Result<Arc<dyn LocalCapture>, TransportError>;

    /// Bind a new session carrying the given capture.
    ///
    /// Returns the session plus the channel its events arrive on.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be created.
    async fn create_session(
        &self,
        capture: Arc<dyn LocalCapture>,
    ) -> Result<(Box<dyn PeerSession>, mpsc::UnboundedReceiver<PeerEvent>), TransportError>;
}

/// One negotiation-capable session with a single peer.
///
/// All methods may suspend for arbitrarily long; the caller must not assume
/// bounded completion times.
#[async_trait]
pub trait PeerSession: Send {
    /// Open the ordered reliable data channel (initiator side).
    async fn open_data_channel(&mut self) -> Result<(), TransportError>;

    /// Produce the local offer description.
    async fn create_offer(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Apply a remote offer and produce the answering description.
    async fn accept_offer(&mut self, offer: &[u8]) -> Result<Vec<u8>, TransportError>;

    /// Apply the remote answer, finalizing the description exchange.
    async fn accept_answer(&mut self, answer: &[u8]) -> Result<(), TransportError>;

    /// Apply a remote connectivity candidate.
    async fn apply_candidate(&mut self, candidate: &[u8]) -> Result<(), TransportError>;

    /// Send a chat message over the data channel.
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError>;

    /// Close the session and release its resources.
    async fn close(&mut self);
}
